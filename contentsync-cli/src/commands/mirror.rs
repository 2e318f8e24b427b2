//! `contentsync mirror`: the mirror step on its own.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use contentsync_core::{Redactor, SystemRunner};
use contentsync_sync::{Mirror, MirrorSpec, NativeMirror, RsyncMirror};

/// Arguments for `contentsync mirror`.
#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Source directory. A trailing `/` mirrors its contents into DESTINATION;
    /// without one the directory itself lands next to DESTINATION.
    pub source: String,

    pub destination: PathBuf,

    /// Copy in-process instead of running rsync.
    #[arg(long)]
    pub native: bool,
}

impl MirrorArgs {
    pub fn run(self) -> Result<()> {
        let spec = MirrorSpec {
            contents_only: self.source.ends_with('/'),
            source: PathBuf::from(self.source.trim_end_matches('/')),
            destination: self.destination,
        };
        let target = spec.target().context("invalid mirror paths")?;

        if self.native {
            let stats = NativeMirror.run(&spec).context("mirror failed")?;
            println!(
                "{} mirrored into {} ({} copied, {} unchanged, {} removed)",
                "✓".green(),
                target.display(),
                stats.copied,
                stats.unchanged,
                stats.removed
            );
        } else {
            let runner = SystemRunner::new(Redactor::new());
            RsyncMirror::new(&runner)
                .mirror(&spec)
                .context("rsync mirror failed")?;
            println!("{} mirrored into {}", "✓".green(), target.display());
        }
        Ok(())
    }
}

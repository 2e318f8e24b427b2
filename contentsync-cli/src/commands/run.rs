//! `contentsync run`: the full sync workflow.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use contentsync_core::{MirrorBackend, Settings};
use contentsync_sync::{
    pipeline, Collaborators, MergeOutcome, Mirror, NativeMirror, RsyncMirror, RunOptions,
    SyncOutcome, SyncReport,
};

use super::{github_forge, load_settings, runner_for};

/// Arguments for `contentsync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Stop after change detection; nothing is committed or pushed.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the run report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Parent directory for the per-run checkouts.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub workdir: PathBuf,

    /// Delete the run directory after a successful run.
    #[arg(long)]
    pub cleanup: bool,

    /// Request auto-merge when every commit is trusted.
    #[arg(long)]
    pub auto_merge: bool,

    /// Unsigned commits, no trust verification.
    #[arg(long)]
    pub local_mode: bool,

    /// Mirror backend.
    #[arg(long, value_name = "rsync|native")]
    pub mirror: Option<MirrorBackend>,
}

impl RunArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let flags = Settings {
            auto_merge: self.auto_merge.then_some(true),
            local_mode: self.local_mode.then_some(true),
            mirror: self.mirror,
            ..Settings::default()
        };
        let request = load_settings(config)?
            .merge(flags)
            .resolve()
            .context("invalid configuration")?;

        let runner = runner_for(&request.credential);
        let forge = github_forge(
            &runner,
            &request.destination.repo,
            &request.api_url,
            &request.credential,
        );
        let rsync = RsyncMirror::new(&runner);
        let mirror: &dyn Mirror = match request.mirror {
            MirrorBackend::Rsync => &rsync,
            MirrorBackend::Native => &NativeMirror,
        };

        let report = pipeline::run(
            &request,
            &Collaborators {
                runner: &runner,
                forge: &forge,
                mirror,
            },
            &RunOptions {
                workdir: self.workdir.clone(),
                started_at: Utc::now(),
                dry_run: self.dry_run,
            },
        )
        .context("content sync failed")?;

        if self.cleanup {
            std::fs::remove_dir_all(&report.run_dir).with_context(|| {
                format!("failed to remove run directory {}", report.run_dir.display())
            })?;
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    let branch = report.branch.as_str();
    match &report.outcome {
        SyncOutcome::NoChanges => {
            println!("{} nothing to sync; destination already matches", "✓".green());
        }
        SyncOutcome::WouldPublish => {
            println!(
                "[dry-run] {} changes staged on '{branch}'; a pull request would be opened",
                "~".yellow()
            );
        }
        SyncOutcome::Published {
            commit,
            pull_request,
            merge,
        } => {
            println!(
                "{} published {} from '{branch}'",
                "✓".green(),
                pull_request.url.as_deref().unwrap_or("pull request")
            );
            println!("  commit  {}", short(&commit.sha));
            match merge {
                MergeOutcome::NotRequested => println!("  merge   left for review"),
                MergeOutcome::Requested { .. } => {
                    println!("  merge   {}", "auto-merge requested".green())
                }
                MergeOutcome::Refused { verdict } => println!(
                    "  merge   {} ({:?})",
                    "auto-merge refused".red(),
                    verdict.reason
                ),
            }
        }
    }
    println!(
        "  run dir {}  ({} ms)",
        report.run_dir.display(),
        report.duration_ms
    );
}

fn short(sha: &str) -> &str {
    sha.get(..12).unwrap_or(sha)
}

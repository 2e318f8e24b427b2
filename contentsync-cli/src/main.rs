//! contentsync: mirror a source folder into a translations repository and
//! publish the change as a pull request.
//!
//! # Usage
//!
//! ```text
//! contentsync run [--dry-run] [--json] [--workdir <dir>] [--cleanup]
//! contentsync verify --branch <name> [--title <title>] [--json]
//! contentsync mirror <source>[/] <destination> [--native]
//! ```
//!
//! Settings come from `--config <file.yaml>`, then the environment (a `.env`
//! in the working directory is loaded first), then flags.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use commands::{mirror::MirrorArgs, run::RunArgs, verify::VerifyArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "contentsync",
    version,
    about = "Sync a content folder into a translations repository via pull request",
    long_about = None,
)]
struct Cli {
    /// YAML settings file, overridden by environment variables and flags.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG still wins).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone, mirror, commit and open a pull request when anything changed.
    Run(RunArgs),

    /// Evaluate whether an existing sync pull request is trusted for auto-merge.
    Verify(VerifyArgs),

    /// Mirror one directory into another and nothing else.
    Mirror(MirrorArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => args.run(config),
        Commands::Verify(args) => args.run(config),
        Commands::Mirror(args) => args.run(),
    }
}

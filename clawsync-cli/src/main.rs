//! clawsync: policy-gated workspace backup to a git remote.
//!
//! # Usage
//!
//! ```text
//! clawsync backup
//! clawsync restore [-f|--force]
//! clawsync diff [--name-only]
//! clawsync status [--json]
//! ```
//!
//! Settings come from `CLAWSYNC_*` environment variables and the optional
//! `~/.clawsync/config.yaml`.

mod commands;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{
    backup::BackupArgs, diff::DiffArgs, restore::RestoreArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "clawsync",
    version,
    about = "Back up an agent workspace to a git remote, with secret scanning",
    long_about = None,
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy allowed workspace files into the backup repository, scan, commit and push.
    Backup(BackupArgs),

    /// Merge the remote backup into the workspace without overwriting anything.
    Restore(RestoreArgs),

    /// Show what the next backup would change.
    Diff(DiffArgs),

    /// Show configuration, credentials and backup state.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Backup(args) => args.run(),
        Commands::Restore(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}

/// Logs go to stderr so stdout stays clean for `--json`.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

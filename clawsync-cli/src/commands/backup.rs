//! `clawsync backup`: materialize, scan, commit and push.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use clawsync_scanner::SecretMatch;
use clawsync_sync::{backup, AuthProvider, BackupOutcome, BackupSummary, SyncError};

use super::load_config;

/// Arguments for `clawsync backup`.
#[derive(Args, Debug)]
pub struct BackupArgs {}

impl BackupArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let auth = AuthProvider::detect(config.token.clone()).context("backup aborted")?;
        tracing::info!("remote credentials: {}", auth.mode());

        let outcome = match backup(&config, &auth) {
            Ok(outcome) => outcome,
            Err(err) => {
                if let SyncError::SecretDetected { matches, .. } = &err {
                    print_matches(matches);
                }
                return Err(err).context("backup aborted");
            }
        };

        match outcome {
            BackupOutcome::Pushed {
                commit,
                new_commit: true,
                summary,
            } => {
                println!(
                    "✓ backed up to {} at {} ({})",
                    config.repo,
                    short(&commit),
                    describe(&summary)
                );
            }
            BackupOutcome::Pushed {
                commit,
                new_commit: false,
                ..
            } => {
                println!(
                    "✓ pushed pending commit {} to {}",
                    short(&commit),
                    config.repo
                );
            }
            BackupOutcome::NoOp { summary } => {
                println!(
                    "✓ nothing to back up ({} file(s) unchanged)",
                    summary.unchanged
                );
            }
        }
        Ok(())
    }
}

fn print_matches(matches: &[SecretMatch]) {
    eprintln!(
        "{} {} potential secret(s) found; nothing was committed or pushed:",
        "✗".red().bold(),
        matches.len()
    );
    for m in matches {
        eprintln!("  {}", m.to_string().red());
    }
}

fn describe(summary: &BackupSummary) -> String {
    let mut parts = vec![
        format!("{} written", summary.written),
        format!("{} unchanged", summary.unchanged),
    ];
    if summary.removed > 0 {
        parts.push(format!("{} removed", summary.removed));
    }
    if summary.forbidden > 0 {
        parts.push(format!("{} forbidden skipped", summary.forbidden));
    }
    parts.join(", ")
}

pub(crate) fn short(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}

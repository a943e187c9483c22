//! `clawsync restore`: no-clobber merge of the remote backup.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use clawsync_sync::{prompt, restore, AuthProvider, RestoreOptions, RestoreOutcome};

use super::load_config;

/// Arguments for `clawsync restore`.
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Skip the confirmation prompt.
    #[arg(short, long)]
    pub force: bool,
}

impl RestoreArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let options = RestoreOptions { force: self.force };
        let token = config.token.clone();
        let outcome = restore(&config, || AuthProvider::detect(token), options, |question| {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut output = std::io::stdout();
            prompt::confirm(&mut input, &mut output, question)
        })
        .context("restore aborted")?;

        let summary = match outcome {
            RestoreOutcome::Cancelled => {
                println!("Restore cancelled; nothing was changed.");
                return Ok(());
            }
            RestoreOutcome::Restored(summary) => summary,
        };

        for refusal in &summary.refused {
            eprintln!(
                "{} skipped {}: {}",
                "!".yellow().bold(),
                refusal.path.display(),
                refusal.reason
            );
        }
        println!(
            "✓ restored {} file(s) into {} ({} existing kept, {} refused)",
            summary.restored.len(),
            config.workspace.display(),
            summary.kept.len(),
            summary.refused.len()
        );
        Ok(())
    }
}

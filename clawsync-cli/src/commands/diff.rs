//! `clawsync diff`: show unified diffs for what the next backup would change.

use anyhow::{Context, Result};
use clap::Args;

use clawsync_sync::{diff_backup, ChangeKind};

use super::load_config;

/// Arguments for `clawsync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Only list changed paths.
    #[arg(long)]
    pub name_only: bool,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let diffs = diff_backup(&config.workspace, &config.backup_dir, &config.policy())
            .context("diff failed")?;

        if diffs.is_empty() {
            println!("No differences; the backup is up to date.");
            return Ok(());
        }

        for diff in diffs {
            if self.name_only {
                let marker = match diff.change {
                    ChangeKind::Added => 'A',
                    ChangeKind::Modified => 'M',
                    ChangeKind::Removed => 'D',
                };
                println!("{marker} {}", diff.path.display());
                continue;
            }
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }

        Ok(())
    }
}

//! Backup engine.
//!
//! ## `backup` sequence
//!
//! 1. Check the workspace exists.
//! 2. Ensure the local repository (init on first run, point `origin`).
//! 3. Materialize the policy-approved subset into the backup tree.
//! 4. Tree scan. Any match aborts before staging.
//! 5. Stage everything.
//! 6. Staged-diff scan over the index blobs. Any match unstages and aborts.
//! 7. Nothing staged → no-op (unpushed commits from a failed run are still pushed).
//! 8. Commit as the configured author.
//! 9. Authenticate, push, drop the credentials.
//!
//! A failure at any step leaves the remote untouched and stops the run.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use clawsync_core::{Config, ConfigError};
use clawsync_scanner::{scan_bytes, scan_tree, SecretMatch};

use crate::auth::AuthProvider;
use crate::error::{io_err, ScanStage, SyncError};
use crate::git::Git;
use crate::selector::{self, SelectionReport};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Counts from the materialization step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupSummary {
    pub selected: usize,
    pub written: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// Files refused as forbidden (sensitive names, deny fragments).
    pub forbidden: usize,
    /// Paths with staged content in this run's commit.
    pub staged: Vec<PathBuf>,
}

impl BackupSummary {
    fn from_report(report: &SelectionReport) -> Self {
        Self {
            selected: report.selection.entries.len(),
            written: report.written(),
            unchanged: report.unchanged(),
            removed: report.removed(),
            forbidden: report.selection.forbidden.len(),
            staged: Vec::new(),
        }
    }
}

/// How a backup run ended. Aborted runs surface as [`SyncError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// The remote now holds `commit`.
    Pushed {
        commit: String,
        /// `false` when only a previously unpushed commit was sent.
        new_commit: bool,
        summary: BackupSummary,
    },
    /// Nothing changed since the last backup.
    NoOp { summary: BackupSummary },
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Run one backup.
pub fn backup(config: &Config, auth: &AuthProvider) -> Result<BackupOutcome, SyncError> {
    backup_with_clock(config, auth, Utc::now())
}

/// [`backup`] with an explicit timestamp for the commit message.
pub fn backup_with_clock(
    config: &Config,
    auth: &AuthProvider,
    started_at: DateTime<Utc>,
) -> Result<BackupOutcome, SyncError> {
    if !config.workspace.is_dir() {
        return Err(ConfigError::WorkspaceNotFound {
            path: config.workspace.clone(),
        }
        .into());
    }

    let git = Git::new(&config.backup_dir);
    let created = ensure_repository(&git, config)?;

    let report = selector::materialize(&config.workspace, &config.backup_dir, &config.policy())?;
    let mut summary = BackupSummary::from_report(&report);
    tracing::info!(
        "materialized {} file(s): {} written, {} unchanged, {} removed",
        summary.selected,
        summary.written,
        summary.unchanged,
        summary.removed
    );

    let found = scan_tree(&config.backup_dir)?;
    if !found.is_empty() {
        if created {
            discard_repository(&git)?;
        }
        return Err(secret_detected(ScanStage::Tree, found));
    }

    git.stage_all()?;
    summary.staged = verify_staged(&git)?;

    if !git.has_staged_changes()? {
        if git.unpushed_commits(&config.branch)? == 0 {
            tracing::info!("nothing to back up");
            return Ok(BackupOutcome::NoOp { summary });
        }
        let Some(head) = git.head_commit()? else {
            return Ok(BackupOutcome::NoOp { summary });
        };
        tracing::info!("no new changes; pushing pending commit {}", head.id);
        push(config, auth, &git)?;
        return Ok(BackupOutcome::Pushed {
            commit: head.id,
            new_commit: false,
            summary,
        });
    }

    let commit = git.commit(&commit_message(started_at), &config.author)?;
    tracing::info!("committed {commit}");
    push(config, auth, &git)?;
    Ok(BackupOutcome::Pushed {
        commit,
        new_commit: true,
        summary,
    })
}

/// Scan every staged blob. On any match the index is emptied and the run
/// aborts; returns the staged paths otherwise.
pub fn verify_staged(git: &Git) -> Result<Vec<PathBuf>, SyncError> {
    let staged = git.staged_paths()?;
    let mut found = Vec::new();
    for path in &staged {
        let blob = git.staged_blob(path)?;
        found.extend(scan_bytes(path, &blob));
    }
    if !found.is_empty() {
        git.unstage_all()?;
        return Err(secret_detected(ScanStage::Staged, found));
    }
    tracing::debug!("staged-diff scan clean over {} file(s)", staged.len());
    Ok(staged)
}

/// `clawsync backup <UTC timestamp>`
pub fn commit_message(at: DateTime<Utc>) -> String {
    format!("clawsync backup {}", at.format("%Y-%m-%dT%H:%M:%SZ"))
}

/// Returns `true` when this call created the repository.
fn ensure_repository(git: &Git, config: &Config) -> Result<bool, SyncError> {
    let created = !git.is_repo();
    if created {
        tracing::info!("initializing backup repository at {}", git.dir().display());
        git.init(&config.branch)?;
    }
    git.ensure_remote(&config.remote_url)?;
    Ok(created)
}

fn discard_repository(git: &Git) -> Result<(), SyncError> {
    let metadata = git.metadata_dir();
    std::fs::remove_dir_all(&metadata).map_err(|e| io_err(&metadata, e))
}

fn push(config: &Config, auth: &AuthProvider, git: &Git) -> Result<(), SyncError> {
    let session = auth.authenticate(&config.remote_url)?;
    let result = session.push(git, &config.branch);
    drop(session);
    if let Err(e) = &result {
        tracing::error!("push failed; the local commit is kept for the next run: {e}");
    }
    result
}

fn secret_detected(stage: ScanStage, matches: Vec<SecretMatch>) -> SyncError {
    for m in &matches {
        tracing::error!("{stage}: {m}");
    }
    SyncError::SecretDetected { stage, matches }
}

//! Preview for `clawsync diff`: what the next backup would change in the
//! backup tree. No files are written.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use clawsync_core::PolicySet;

use crate::error::{io_err, SyncError};
use crate::selector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A single pending file change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Relative to the workspace / backup root.
    pub path: PathBuf,
    pub change: ChangeKind,
    pub unified_diff: String,
}

/// Compare the policy-approved workspace subset with the backup tree.
pub fn diff_backup(
    workspace: &Path,
    backup_dir: &Path,
    policy: &PolicySet,
) -> Result<Vec<FileDiff>, SyncError> {
    let selection = selector::select(workspace, policy)?;
    let mut diffs = Vec::new();

    for entry in &selection.entries {
        let current = read_existing(&workspace.join(&entry.path))?.unwrap_or_default();
        let backed_up = read_existing(&backup_dir.join(&entry.path))?;
        let change = match &backed_up {
            None => ChangeKind::Added,
            Some(old) if *old == current => continue,
            Some(_) => ChangeKind::Modified,
        };
        let old = backed_up.unwrap_or_default();
        diffs.push(FileDiff {
            unified_diff: unified(&entry.path, &old, &current),
            path: entry.path.clone(),
            change,
        });
    }

    for relative in selector::backup_files(backup_dir)? {
        if selection.entries.iter().any(|e| e.path == relative) {
            continue;
        }
        let old = read_existing(&backup_dir.join(&relative))?.unwrap_or_default();
        diffs.push(FileDiff {
            unified_diff: unified(&relative, &old, &[]),
            path: relative,
            change: ChangeKind::Removed,
        });
    }

    diffs.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(diffs)
}

fn unified(path: &Path, old: &[u8], new: &[u8]) -> String {
    let old_header = format!("a/{}", path.display());
    let new_header = format!("b/{}", path.display());
    match (std::str::from_utf8(old), std::str::from_utf8(new)) {
        (Ok(old), Ok(new)) => TextDiff::from_lines(old, new)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string(),
        _ => format!("Binary files {old_header} and {new_header} differ\n"),
    }
}

fn read_existing(path: &Path) -> Result<Option<Vec<u8>>, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

//! Selection and materialization of the backup tree.
//!
//! ## `materialize` protocol
//!
//! 1. Walk the workspace, pruning directories the policy can never allow.
//! 2. Evaluate every regular file; keep the allowed ones.
//! 3. For each kept file, SHA-256 both sides and skip when identical.
//! 4. Otherwise copy to `<dest>.clawsync.tmp` and rename over `<dest>`.
//! 5. Remove backup files (outside `.git/`) that are no longer selected.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use clawsync_core::{Decision, PolicySet, Sensitivity, WorkspaceEntry};
use clawsync_scanner::GIT_DIR;

use crate::error::{io_err, SyncError};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of mirroring a single file into the backup tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyResult {
    /// Copied (new, content changed, or permissions changed).
    Written { path: PathBuf },
    /// Skipped: identical content and permissions.
    Unchanged { path: PathBuf },
    /// Deleted from the backup tree: no longer selected.
    Removed { path: PathBuf },
}

/// Workspace entries split by policy verdict.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Allowed files, sorted by path.
    pub entries: Vec<WorkspaceEntry>,
    /// Files refused with `Forbidden` sensitivity.
    pub forbidden: Vec<WorkspaceEntry>,
}

/// What one `materialize` run did.
#[derive(Debug, Clone, Default)]
pub struct SelectionReport {
    pub selection: Selection,
    pub changes: Vec<CopyResult>,
}

impl SelectionReport {
    pub fn written(&self) -> usize {
        self.count(|c| matches!(c, CopyResult::Written { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|c| matches!(c, CopyResult::Unchanged { .. }))
    }

    pub fn removed(&self) -> usize {
        self.count(|c| matches!(c, CopyResult::Removed { .. }))
    }

    fn count(&self, pred: impl Fn(&CopyResult) -> bool) -> usize {
        self.changes.iter().filter(|c| pred(c)).count()
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Walk `workspace` and split its files by policy verdict.
///
/// Symlinks are never followed and never selected.
pub fn select(workspace: &Path, policy: &PolicySet) -> Result<Selection, SyncError> {
    let walker = WalkDir::new(workspace)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() {
                return true;
            }
            let relative = entry.path().strip_prefix(workspace).unwrap_or(entry.path());
            let descend = policy.may_descend(relative);
            if !descend {
                tracing::debug!("pruned directory: {}", relative.display());
            }
            descend
        });

    let mut selection = Selection::default();
    for entry in walker {
        let entry = entry.map_err(|e| walk_err(workspace, e))?;
        let relative = entry.path().strip_prefix(workspace).unwrap_or(entry.path());
        if entry.file_type().is_symlink() {
            tracing::debug!("skipping symlink: {}", relative.display());
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let classified = policy.classify(relative);
        match policy.evaluate(relative) {
            Decision::Allow => selection.entries.push(classified),
            Decision::Deny(reason) => {
                tracing::debug!("excluded {}: {reason}", relative.display());
                if classified.sensitivity == Sensitivity::Forbidden {
                    selection.forbidden.push(classified);
                }
            }
        }
    }
    Ok(selection)
}

/// Relative paths of every regular file in the backup tree, `.git/` excluded.
pub fn backup_files(backup_dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }
    let walker = WalkDir::new(backup_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == GIT_DIR));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| walk_err(backup_dir, e))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(backup_dir).unwrap_or(entry.path());
        files.push(relative.to_path_buf());
    }
    Ok(files)
}

// ---------------------------------------------------------------------------
// Materialization
// ---------------------------------------------------------------------------

/// Mirror the allowed subset of `workspace` into `backup_dir`.
pub fn materialize(
    workspace: &Path,
    backup_dir: &Path,
    policy: &PolicySet,
) -> Result<SelectionReport, SyncError> {
    let selection = select(workspace, policy)?;
    std::fs::create_dir_all(backup_dir).map_err(|e| io_err(backup_dir, e))?;

    let mut changes = Vec::new();
    for entry in &selection.entries {
        let src = workspace.join(&entry.path);
        let dest = backup_dir.join(&entry.path);
        changes.push(copy_if_changed(&src, &dest, &entry.path)?);
    }

    let selected: BTreeSet<&Path> = selection.entries.iter().map(|e| e.path.as_path()).collect();
    for relative in backup_files(backup_dir)? {
        if selected.contains(relative.as_path()) {
            continue;
        }
        let stale = backup_dir.join(&relative);
        std::fs::remove_file(&stale).map_err(|e| io_err(&stale, e))?;
        tracing::info!("removed: {}", relative.display());
        changes.push(CopyResult::Removed { path: relative });
    }
    remove_empty_dirs(backup_dir)?;

    Ok(SelectionReport { selection, changes })
}

fn copy_if_changed(src: &Path, dest: &Path, relative: &Path) -> Result<CopyResult, SyncError> {
    let tmp = PathBuf::from(format!("{}.clawsync.tmp", dest.display()));
    copy_if_changed_with_tmp(src, dest, relative, &tmp)
}

fn copy_if_changed_with_tmp(
    src: &Path,
    dest: &Path,
    relative: &Path,
    tmp: &Path,
) -> Result<CopyResult, SyncError> {
    let src_meta = std::fs::metadata(src).map_err(|e| io_err(src, e))?;
    if let Ok(dest_meta) = std::fs::symlink_metadata(dest) {
        if dest_meta.is_file()
            && dest_meta.permissions() == src_meta.permissions()
            && file_digest(src)? == file_digest(dest)?
        {
            tracing::debug!("unchanged: {}", relative.display());
            return Ok(CopyResult::Unchanged {
                path: relative.to_path_buf(),
            });
        }
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    // `fs::copy` carries permission bits along with content.
    std::fs::copy(src, tmp).map_err(|e| io_err(tmp, e))?;
    if let Err(e) = std::fs::rename(tmp, dest) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(dest, e));
    }

    tracing::info!("copied: {}", relative.display());
    Ok(CopyResult::Written {
        path: relative.to_path_buf(),
    })
}

/// Hex SHA-256 of a file's content.
pub(crate) fn file_digest(path: &Path) -> Result<String, SyncError> {
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    let mut h = Sha256::new();
    h.update(&bytes);
    Ok(hex::encode(h.finalize()))
}

fn remove_empty_dirs(backup_dir: &Path) -> Result<(), SyncError> {
    // Pre-order so `filter_entry` prunes `.git` before its subtree is visited;
    // reversed, children come before their parents.
    let mut dirs = Vec::new();
    let walker = WalkDir::new(backup_dir)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == GIT_DIR));
    for entry in walker {
        let entry = entry.map_err(|e| walk_err(backup_dir, e))?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }

    for dir in dirs.iter().rev() {
        let is_empty = std::fs::read_dir(dir)
            .map_err(|e| io_err(dir, e))?
            .next()
            .is_none();
        if is_empty {
            std::fs::remove_dir(dir).map_err(|e| io_err(dir, e))?;
        }
    }
    Ok(())
}

fn walk_err(root: &Path, err: walkdir::Error) -> SyncError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
    io_err(path, source)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn paths(selection: &Selection) -> Vec<String> {
        selection
            .entries
            .iter()
            .map(|e| e.path.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn select_keeps_only_allowed_files() {
        let tmp = TempDir::new().unwrap();
        let ws = tmp.path();
        write(ws, "SOUL.md", "soul");
        write(ws, "USER.md", "user");
        write(ws, "notes.md", "notes");
        write(ws, "memory/today.md", "memory");
        write(ws, "skills/weather/SKILL.md", "skill");
        write(ws, "skills/weather/node_modules/x.js", "dep");
        write(ws, "scripts/run.sh", "#!/bin/sh");
        write(ws, "scripts/.env", "KEY=1");

        let selection = select(ws, &PolicySet::default()).unwrap();
        assert_eq!(
            paths(&selection),
            vec!["SOUL.md", "scripts/run.sh", "skills/weather/SKILL.md"]
        );
        let forbidden: Vec<_> = selection.forbidden.iter().map(|e| e.path.clone()).collect();
        assert!(forbidden.contains(&PathBuf::from("USER.md")));
        assert!(forbidden.contains(&PathBuf::from("scripts/.env")));
    }

    #[test]
    fn unchanged_copy_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.sh");
        let dest = tmp.path().join("out/a.sh");
        std::fs::write(&src, "echo hi\n").unwrap();

        let first = copy_if_changed(&src, &dest, Path::new("a.sh")).unwrap();
        assert!(matches!(first, CopyResult::Written { .. }));
        let second = copy_if_changed(&src, &dest, Path::new("a.sh")).unwrap();
        assert!(matches!(second, CopyResult::Unchanged { .. }));
        assert!(!tmp.path().join("out/a.sh.clawsync.tmp").exists());
    }

    #[test]
    fn failed_rename_cleans_up_tmp() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.sh");
        std::fs::write(&src, "echo hi\n").unwrap();
        // A directory in the destination's place makes the rename fail.
        let dest = tmp.path().join("out/a.sh");
        std::fs::create_dir_all(dest.join("occupied")).unwrap();
        let tmp_file = tmp.path().join("out/a.sh.tmp");

        let result = copy_if_changed_with_tmp(&src, &dest, Path::new("a.sh"), &tmp_file);
        assert!(result.is_err());
        assert!(!tmp_file.exists());
    }

    #[cfg(unix)]
    #[test]
    fn permission_change_forces_copy() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("run.sh");
        let dest = tmp.path().join("out/run.sh");
        std::fs::write(&src, "#!/bin/sh\n").unwrap();
        copy_if_changed(&src, &dest, Path::new("run.sh")).unwrap();

        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o755)).unwrap();
        let result = copy_if_changed(&src, &dest, Path::new("run.sh")).unwrap();
        assert!(matches!(result, CopyResult::Written { .. }));
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn materialize_prunes_stale_files_but_keeps_git_dir() {
        let tmp = TempDir::new().unwrap();
        let ws = tmp.path().join("ws");
        let backup = tmp.path().join("backup");
        write(&ws, "SOUL.md", "soul");
        write(&ws, "skills/old/SKILL.md", "old");
        write(&backup, ".git/HEAD", "ref: refs/heads/main\n");

        let policy = PolicySet::default();
        materialize(&ws, &backup, &policy).unwrap();
        std::fs::remove_dir_all(ws.join("skills/old")).unwrap();

        let report = materialize(&ws, &backup, &policy).unwrap();
        assert_eq!(report.removed(), 1);
        assert_eq!(report.unchanged(), 1);
        assert!(!backup.join("skills/old").exists());
        assert!(!backup.join("skills").exists(), "empty dirs are pruned");
        assert!(backup.join(".git/HEAD").exists());
    }

    #[test]
    fn materialize_leaves_fresh_git_repository_intact() {
        let tmp = TempDir::new().unwrap();
        let ws = tmp.path().join("ws");
        let backup = tmp.path().join("backup");
        write(&ws, "SOUL.md", "soul");
        let git = crate::git::Git::new(&backup);
        git.init("main").unwrap();

        materialize(&ws, &backup, &PolicySet::default()).unwrap();

        assert!(backup.join(".git/refs/heads").is_dir());
        assert!(backup.join(".git/objects").is_dir());
        assert!(git.is_repo());
        git.stage_all().unwrap();
        assert_eq!(git.staged_paths().unwrap(), vec![PathBuf::from("SOUL.md")]);
    }
}

//! Error types for clawsync-sync.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use clawsync_core::ConfigError;
use clawsync_scanner::{ScanError, SecretMatch};

/// Which checkpoint found a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    /// Whole backup tree, before staging.
    Tree,
    /// Files staged for commit.
    Staged,
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStage::Tree => write!(f, "tree scan"),
            ScanStage::Staged => write!(f, "staged-diff scan"),
        }
    }
}

/// All errors that can arise from backup and restore runs.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid configuration. Raised before any side effect.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A secret pattern matched. Nothing was committed or pushed.
    #[error("{stage} found {} potential secret(s); aborting", .matches.len())]
    SecretDetected {
        stage: ScanStage,
        matches: Vec<SecretMatch>,
    },

    /// No usable credentials, or the remote refused them.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A git operation (clone, pull, push, commit, …) failed.
    #[error("git {operation} failed: {detail}")]
    Operation { operation: String, detail: String },

    /// The scanner could not read the tree.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

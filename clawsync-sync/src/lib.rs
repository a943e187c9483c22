//! Backup and restore engines for clawsync.
//!
//! Policy and configuration come from `clawsync-core`; secret detection from
//! `clawsync-scanner`. Everything that touches git or the remote lives here.

pub mod auth;
pub mod backup;
pub mod diff;
pub mod error;
pub mod git;
pub mod prompt;
pub mod restore;
pub mod selector;

pub use auth::{probe_gh, AuthMode, AuthProvider, AuthSession, ToolCapability};
pub use backup::{backup, BackupOutcome, BackupSummary};
pub use diff::{diff_backup, ChangeKind, FileDiff};
pub use error::{ScanStage, SyncError};
pub use git::{CommitInfo, Git, TreeFile};
pub use restore::{restore, Refusal, RestoreOptions, RestoreOutcome, RestoreSummary};
pub use selector::{materialize, select, CopyResult, Selection, SelectionReport};

//! clawsync core library: domain types, configuration and the backup policy.
//!
//! - [`types`]: newtypes and workspace entry classification
//! - [`error`]: [`ConfigError`]
//! - [`config`]: immutable [`Config`] assembled once per run
//! - [`policy`]: [`PolicySet`] allow/deny rules

pub mod config;
pub mod error;
pub mod policy;
pub mod types;

pub use config::Config;
pub use error::ConfigError;
pub use policy::{Decision, DenyReason, PolicySet};
pub use types::{Category, CommitAuthor, RepoId, Sensitivity, Token, WorkspaceEntry};

//! Error types for clawsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while assembling the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was absent from both the environment and the config file.
    #[error("missing required setting {key}; set it in the environment or in the config file")]
    Missing { key: &'static str },

    /// The backup repository identifier is not in `owner/name` form.
    #[error("invalid backup repository '{value}': expected 'owner/name'")]
    InvalidRepo { value: String },

    /// The branch name is empty or would be read by git as an option.
    #[error("invalid branch name '{value}'")]
    InvalidBranch { value: String },

    /// Config file exists but is not valid YAML for [`crate::config::ConfigFile`].
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Underlying I/O failure while reading the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.clawsync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The configured workspace root is not an existing directory.
    #[error("workspace not found at {path}")]
    WorkspaceNotFound { path: PathBuf },
}

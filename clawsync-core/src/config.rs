//! Run configuration.
//!
//! # Sources
//!
//! ```text
//! ~/.clawsync/
//!   config.yaml      (optional; $CLAWSYNC_CONFIG overrides the location)
//!   backup/          (default local mirror of the backup repository)
//! ```
//!
//! Environment variables take precedence over the file. The token is only ever
//! read from the environment.
//!
//! # API pattern
//!
//! - `load_at(home, lookup)`: explicit home and variable lookup; used in tests
//! - `load()`: derives home from `dirs::home_dir()` and reads the process
//!   environment, delegates to `load_at`
//!
//! Tests must NEVER call `load()`; always use `load_at`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policy::PolicySet;
use crate::types::{CommitAuthor, RepoId, Token};

pub const ENV_CONFIG: &str = "CLAWSYNC_CONFIG";
pub const ENV_REPO: &str = "CLAWSYNC_REPO";
pub const ENV_WORKSPACE: &str = "CLAWSYNC_WORKSPACE";
pub const ENV_BRANCH: &str = "CLAWSYNC_BRANCH";
pub const ENV_TOKEN: &str = "CLAWSYNC_TOKEN";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_BACKUP_DIR: &str = "CLAWSYNC_BACKUP_DIR";
pub const ENV_REMOTE_URL: &str = "CLAWSYNC_REMOTE_URL";
pub const ENV_AUTHOR_NAME: &str = "CLAWSYNC_AUTHOR_NAME";
pub const ENV_AUTHOR_EMAIL: &str = "CLAWSYNC_AUTHOR_EMAIL";

pub const DEFAULT_BRANCH: &str = "main";

/// Optional on-disk settings. Every field may be overridden by the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub repo: Option<String>,
    pub workspace: Option<PathBuf>,
    pub branch: Option<String>,
    pub backup_dir: Option<PathBuf>,
    pub remote_url: Option<String>,
    pub extra_deny: Vec<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

/// Immutable settings for a single backup or restore invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub repo: RepoId,
    /// Workspace root being backed up / restored into.
    pub workspace: PathBuf,
    pub branch: String,
    /// Local working tree of the backup repository.
    pub backup_dir: PathBuf,
    pub remote_url: String,
    pub token: Option<Token>,
    /// Deny fragments appended to the built-in denylist.
    pub extra_deny: Vec<String>,
    pub author: CommitAuthor,
}

impl Config {
    /// Assemble the configuration from the process environment and
    /// `~/.clawsync/config.yaml`.
    pub fn load() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Self::load_at(&home, |key| std::env::var(key).ok())
    }

    /// Assemble the configuration with an explicit home and variable lookup.
    pub fn load_at<F>(home: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let file_path = var(ENV_CONFIG)
            .map(|p| expand_home(home, Path::new(&p)))
            .unwrap_or_else(|| default_config_path(home));
        let file = load_file(&file_path)?;

        let repo_raw = var(ENV_REPO)
            .or(file.repo)
            .ok_or(ConfigError::Missing { key: ENV_REPO })?;
        let repo: RepoId = repo_raw.parse()?;

        let workspace = var(ENV_WORKSPACE)
            .map(PathBuf::from)
            .or(file.workspace)
            .map(|p| expand_home(home, &p))
            .ok_or(ConfigError::Missing { key: ENV_WORKSPACE })?;

        let branch = var(ENV_BRANCH)
            .or(file.branch)
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        let branch = branch.trim().to_string();
        if branch.starts_with('-') || branch.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidBranch { value: branch });
        }

        let backup_dir = var(ENV_BACKUP_DIR)
            .map(PathBuf::from)
            .or(file.backup_dir)
            .map(|p| expand_home(home, &p))
            .unwrap_or_else(|| default_backup_dir(home));

        let remote_url = var(ENV_REMOTE_URL)
            .or(file.remote_url)
            .unwrap_or_else(|| repo.github_url());

        let token = var(ENV_TOKEN)
            .or_else(|| var(ENV_GITHUB_TOKEN))
            .map(|t| Token::new(t.trim()));

        let defaults = CommitAuthor::default();
        let author = CommitAuthor {
            name: var(ENV_AUTHOR_NAME)
                .or(file.author_name)
                .unwrap_or(defaults.name),
            email: var(ENV_AUTHOR_EMAIL)
                .or(file.author_email)
                .unwrap_or(defaults.email),
        };

        let extra_deny = file
            .extra_deny
            .into_iter()
            .filter(|fragment| !fragment.is_empty())
            .collect();

        Ok(Self {
            repo,
            workspace,
            branch,
            backup_dir,
            remote_url,
            token,
            extra_deny,
            author,
        })
    }

    /// Built-in policy plus this configuration's extra deny fragments.
    pub fn policy(&self) -> PolicySet {
        PolicySet::with_extra_deny(self.extra_deny.iter().cloned())
    }
}

/// `<home>/.clawsync/`
pub fn clawsync_root(home: &Path) -> PathBuf {
    home.join(".clawsync")
}

/// `<home>/.clawsync/config.yaml`: pure, no I/O.
pub fn default_config_path(home: &Path) -> PathBuf {
    clawsync_root(home).join("config.yaml")
}

/// `<home>/.clawsync/backup`: pure, no I/O.
pub fn default_backup_dir(home: &Path) -> PathBuf {
    clawsync_root(home).join("backup")
}

/// Read the optional config file; a missing file yields the defaults.
pub fn load_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn expand_home(home: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_home_only_touches_tilde_prefix() {
        let home = Path::new("/home/claw");
        assert_eq!(
            expand_home(home, Path::new("~/.openclaw/workspace")),
            PathBuf::from("/home/claw/.openclaw/workspace")
        );
        assert_eq!(
            expand_home(home, Path::new("/srv/workspace")),
            PathBuf::from("/srv/workspace")
        );
        assert_eq!(
            expand_home(home, Path::new("data/~stuff")),
            PathBuf::from("data/~stuff")
        );
    }

    #[test]
    fn default_paths_live_under_dot_clawsync() {
        let home = Path::new("/home/claw");
        assert_eq!(
            default_config_path(home),
            PathBuf::from("/home/claw/.clawsync/config.yaml")
        );
        assert_eq!(
            default_backup_dir(home),
            PathBuf::from("/home/claw/.clawsync/backup")
        );
    }
}

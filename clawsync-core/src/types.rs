//! Domain types shared by every clawsync crate.
//!
//! All path fields use `PathBuf`; workspace entries are always relative to the
//! workspace root.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Backup repository identifier in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    /// HTTPS clone URL on GitHub.
    pub fn github_url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidRepo {
            value: s.to_string(),
        };
        let (owner, name) = s.trim().split_once('/').ok_or_else(invalid)?;
        let valid_part = |part: &str| {
            !part.is_empty()
                && !part.starts_with('.')
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };
        if !valid_part(owner) || !valid_part(name) {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.trim_end_matches(".git").to_string(),
        })
    }
}

/// An access token for the backup remote.
///
/// `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret. Only the credential store should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Identity used for backup commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

impl Default for CommitAuthor {
    fn default() -> Self {
        Self {
            name: "clawsync".to_string(),
            email: "clawsync@localhost".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which part of the workspace an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    IdentityFile,
    Skill,
    Script,
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::IdentityFile => write!(f, "identity-file"),
            Category::Skill => write!(f, "skill"),
            Category::Script => write!(f, "script"),
            Category::Other => write!(f, "other"),
        }
    }
}

/// How dangerous it is for an entry to leave the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Public,
    Restricted,
    Forbidden,
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sensitivity::Public => write!(f, "public"),
            Sensitivity::Restricted => write!(f, "restricted"),
            Sensitivity::Forbidden => write!(f, "forbidden"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A path discovered under the workspace root, classified by the policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceEntry {
    /// Path relative to the workspace root.
    pub path: PathBuf,
    pub category: Category,
    pub sensitivity: Sensitivity,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Backup policy: which workspace paths may cross the trust boundary.
//!
//! Rule precedence:
//! 1. Sensitive identity names and deny fragments anywhere → `Deny` (`forbidden`)
//! 2. Root-level allow-listed identity files → `Allow` (`restricted`)
//! 3. Anything else under `skills/` or `scripts/` → `Allow` (`public`)
//! 4. Everything else → `Deny` (out of scope)
//!
//! Deny fragments are matched case-sensitively against the whole relative path
//! (components joined with `/`), so a fragment in a directory name excludes its
//! entire subtree.

use std::fmt;
use std::path::{Component, Path};

use crate::types::{Category, Sensitivity, WorkspaceEntry};

/// Root-level identity files that are backed up. Nothing else at the root is.
pub const IDENTITY_ALLOWLIST: &[&str] = &["SOUL.md", "IDENTITY.md", "HEARTBEAT.md"];

/// Identity files that may hold personal data or credentials. Never backed up,
/// wherever they appear.
pub const SENSITIVE_IDENTITY_FILES: &[&str] = &["AGENTS.md", "USER.md", "MEMORY.md", "TOOLS.md"];

/// Path fragments that exclude an entry and its whole subtree.
pub const DENY_FRAGMENTS: &[&str] = &[
    ".git",
    "node_modules",
    "credentials",
    ".env",
    "venv",
    "__pycache__",
];

pub const SKILLS_DIR: &str = "skills";
pub const SCRIPTS_DIR: &str = "scripts";

/// Why a path was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// Path contains a denylist fragment.
    Fragment(String),
    /// Path names a sensitive identity file.
    SensitiveFile(String),
    /// Root-level file that is not on the identity allow-list.
    NotAllowListed,
    /// Outside the backed-up categories.
    OutOfScope,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Fragment(fragment) => write!(f, "matches deny fragment '{fragment}'"),
            DenyReason::SensitiveFile(name) => write!(f, "sensitive identity file '{name}'"),
            DenyReason::NotAllowListed => write!(f, "not an allow-listed identity file"),
            DenyReason::OutOfScope => write!(f, "outside skills/ and scripts/"),
        }
    }
}

/// Policy verdict for a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// The static rule set for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySet {
    identity_allow: Vec<String>,
    sensitive_files: Vec<String>,
    deny_fragments: Vec<String>,
}

impl Default for PolicySet {
    fn default() -> Self {
        Self {
            identity_allow: IDENTITY_ALLOWLIST.iter().map(|s| s.to_string()).collect(),
            sensitive_files: SENSITIVE_IDENTITY_FILES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            deny_fragments: DENY_FRAGMENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PolicySet {
    /// Built-in rules plus extra deny fragments. Built-ins cannot be removed.
    pub fn with_extra_deny<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut policy = Self::default();
        for fragment in extra {
            let fragment = fragment.into();
            if !fragment.is_empty() && !policy.deny_fragments.contains(&fragment) {
                policy.deny_fragments.push(fragment);
            }
        }
        policy
    }

    pub fn deny_fragments(&self) -> &[String] {
        &self.deny_fragments
    }

    pub fn identity_allowlist(&self) -> &[String] {
        &self.identity_allow
    }

    /// Evaluate a path relative to the workspace root.
    pub fn evaluate(&self, relative: &Path) -> Decision {
        let Some(normalized) = normalize(relative) else {
            return Decision::Deny(DenyReason::OutOfScope);
        };

        if let Some(reason) = self.forbidden_reason(&normalized) {
            return Decision::Deny(reason);
        }

        match category_of(&normalized) {
            Category::IdentityFile => {
                if self.identity_allow.iter().any(|name| *name == normalized) {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::NotAllowListed)
                }
            }
            Category::Skill | Category::Script => Decision::Allow,
            Category::Other => Decision::Deny(DenyReason::OutOfScope),
        }
    }

    /// Classify a path relative to the workspace root.
    pub fn classify(&self, relative: &Path) -> WorkspaceEntry {
        let category = normalize(relative)
            .map(|n| category_of(&n))
            .unwrap_or(Category::Other);
        let sensitivity = match self.evaluate(relative) {
            Decision::Allow if category == Category::IdentityFile => Sensitivity::Restricted,
            Decision::Allow => Sensitivity::Public,
            Decision::Deny(DenyReason::Fragment(_) | DenyReason::SensitiveFile(_)) => {
                Sensitivity::Forbidden
            }
            Decision::Deny(_) => Sensitivity::Restricted,
        };
        WorkspaceEntry {
            path: relative.to_path_buf(),
            category,
            sensitivity,
        }
    }

    /// Whether a directory can hold anything the policy would allow.
    ///
    /// Used to prune walks: a directory whose path already carries a deny
    /// fragment is skipped with its whole subtree.
    pub fn may_descend(&self, relative_dir: &Path) -> bool {
        let Some(normalized) = normalize(relative_dir) else {
            return false;
        };
        if normalized.is_empty() {
            return true;
        }
        let top = normalized.split('/').next().unwrap_or_default();
        (top == SKILLS_DIR || top == SCRIPTS_DIR) && self.forbidden_reason(&normalized).is_none()
    }

    fn forbidden_reason(&self, normalized: &str) -> Option<DenyReason> {
        if let Some(name) = self
            .sensitive_files
            .iter()
            .find(|name| normalized.contains(name.as_str()))
        {
            return Some(DenyReason::SensitiveFile(name.clone()));
        }
        self.deny_fragments
            .iter()
            .find(|fragment| normalized.contains(fragment.as_str()))
            .map(|fragment| DenyReason::Fragment(fragment.clone()))
    }
}

/// Join normal components with `/`. `None` for absolute or parent-escaping paths.
fn normalize(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.join("/"))
}

fn category_of(normalized: &str) -> Category {
    let mut parts = normalized.split('/');
    let first = parts.next().unwrap_or_default();
    let nested = parts.next().is_some();
    match first {
        SKILLS_DIR if nested => Category::Skill,
        SCRIPTS_DIR if nested => Category::Script,
        SKILLS_DIR | SCRIPTS_DIR | "" => Category::Other,
        _ if !nested => Category::IdentityFile,
        _ => Category::Other,
    }
}

//! Secret scanning for `clawsync-scanner`.
//!
//! Every pattern of the credential taxonomy is compiled into one [`RegexSet`]
//! that screens each line; patterns the set reports are then run on their own
//! so every occurrence yields its own [`SecretMatch`]. Detection is binary: callers abort on any
//! match. Nothing here redacts or rewrites content.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Regex, RegexSet};
use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

/// Version-control metadata directory skipped by [`scan_tree`].
pub const GIT_DIR: &str = ".git";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Credential shapes the scanner recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternId {
    GithubToken,
    BearerSecret,
    GoogleApiKey,
    SlackToken,
    AwsAccessKey,
    HighEntropy,
    PrivateKey,
}

impl PatternId {
    /// Every pattern, in the order they are compiled into the set.
    pub const ALL: [PatternId; 7] = [
        PatternId::GithubToken,
        PatternId::BearerSecret,
        PatternId::GoogleApiKey,
        PatternId::SlackToken,
        PatternId::AwsAccessKey,
        PatternId::HighEntropy,
        PatternId::PrivateKey,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PatternId::GithubToken => "github-token",
            PatternId::BearerSecret => "bearer-secret",
            PatternId::GoogleApiKey => "google-api-key",
            PatternId::SlackToken => "slack-token",
            PatternId::AwsAccessKey => "aws-access-key",
            PatternId::HighEntropy => "high-entropy",
            PatternId::PrivateKey => "private-key",
        }
    }

    /// Regular expression for this shape.
    pub fn pattern(self) -> &'static str {
        match self {
            PatternId::GithubToken => r"ghp_[A-Za-z0-9]{36}",
            PatternId::BearerSecret => r"sk-[A-Za-z0-9]{20,}",
            PatternId::GoogleApiKey => r"AIza[0-9A-Za-z_\-]{35}",
            PatternId::SlackToken => r"xox[pborsa]-[A-Za-z0-9]{10,48}",
            PatternId::AwsAccessKey => r"AKIA[0-9A-Z]{16}",
            // Also catches long hashes; accepted cost of catching JWTs and opaque keys.
            PatternId::HighEntropy => r"[A-Za-z0-9+/=]{40,}",
            PatternId::PrivateKey => r"-----BEGIN (RSA|EC|DSA|OPENSSH) PRIVATE KEY-----",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            PatternId::PrivateKey => Severity::Critical,
            PatternId::HighEntropy => Severity::Medium,
            _ => Severity::High,
        }
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How likely a match is to be a live credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A single pattern hit. Carries location only, never the matched text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SecretMatch {
    pub pattern_id: PatternId,
    /// Path relative to the scan root.
    pub file_path: PathBuf,
    /// 1-based line number.
    pub line_number: usize,
    pub severity: Severity,
}

impl fmt::Display for SecretMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} ({})",
            self.file_path.display(),
            self.line_number,
            self.pattern_id,
            self.severity
        )
    }
}

/// Errors from scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

// ---------------------------------------------------------------------------
// Pattern set
// ---------------------------------------------------------------------------

static PATTERN_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    let patterns = PatternId::ALL.map(PatternId::pattern);
    match RegexSet::new(patterns) {
        Ok(set) => set,
        // Panic is acceptable thanks to the `pattern_set_compiles` test
        Err(err) => panic!("invalid secret pattern set: {err}"),
    }
});

/// Same order as [`PatternId::ALL`], for locating each occurrence.
static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    PatternId::ALL
        .iter()
        .map(|id| match Regex::new(id.pattern()) {
            Ok(re) => re,
            // Panic is acceptable thanks to the `pattern_set_compiles` test
            Err(err) => panic!("invalid secret pattern {id}: {err}"),
        })
        .collect()
});

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Scan in-memory text attributed to `path`.
pub fn scan_text(path: &Path, text: &str) -> Vec<SecretMatch> {
    let mut matches = Vec::new();
    for (index, line) in text.lines().enumerate() {
        for pattern in PATTERN_SET.matches(line).iter() {
            let pattern_id = PatternId::ALL[pattern];
            for _ in PATTERNS[pattern].find_iter(line) {
                matches.push(SecretMatch {
                    pattern_id,
                    file_path: path.to_path_buf(),
                    line_number: index + 1,
                    severity: pattern_id.severity(),
                });
            }
        }
    }
    matches
}

/// Scan raw bytes (e.g. a staged blob). Invalid UTF-8 is scanned lossily.
pub fn scan_bytes(path: &Path, bytes: &[u8]) -> Vec<SecretMatch> {
    scan_text(path, &String::from_utf8_lossy(bytes))
}

/// Scan one file at `root.join(relative)`.
pub fn scan_file(root: &Path, relative: &Path) -> Result<Vec<SecretMatch>, ScanError> {
    let full = root.join(relative);
    let bytes = std::fs::read(&full).map_err(|source| ScanError::Io { path: full, source })?;
    Ok(scan_bytes(relative, &bytes))
}

/// Scan an explicit list of files relative to `root`.
pub fn scan_files(root: &Path, relatives: &[PathBuf]) -> Result<Vec<SecretMatch>, ScanError> {
    let mut matches = Vec::new();
    for relative in relatives {
        matches.extend(scan_file(root, relative)?);
    }
    Ok(matches)
}

/// Recursively scan every regular file under `root`, skipping the top-level
/// `.git/` directory. Symlinks are not followed.
pub fn scan_tree(root: &Path) -> Result<Vec<SecretMatch>, ScanError> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == GIT_DIR));

    let mut matches = Vec::new();
    let mut scanned = 0usize;
    for entry in walker {
        let entry = entry.map_err(|source| ScanError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        matches.extend(scan_file(root, relative)?);
        scanned += 1;
    }
    tracing::debug!(
        "scanned {scanned} file(s) under {}: {} match(es)",
        root.display(),
        matches.len()
    );
    Ok(matches)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

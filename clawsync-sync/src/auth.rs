//! Credential resolution for remote operations.
//!
//! Two strategies, tried in order:
//!
//! 1. **Delegated**: an installed, logged-in `gh` CLI answers git's credential
//!    requests itself. No secret passes through this process.
//! 2. **Token**: an explicitly configured token is handed to git through a
//!    private, throwaway credential store. The store is approved immediately
//!    before the remote operation and rejected and deleted when the
//!    [`AuthSession`] drops, so the token never lands in the remote URL,
//!    the repository config, or the process argument list.
//!
//! When neither is available the run stops with
//! [`SyncError::Authentication`] before any network call.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;

use clawsync_core::Token;

use crate::error::{io_err, SyncError};
use crate::git::{self, Git, REMOTE_NAME};

/// Username GitHub expects alongside a token.
const TOKEN_USERNAME: &str = "x-access-token";

/// Fragments of git/remote output that mean "your credentials were refused".
const AUTH_FAILURE_MARKERS: &[&str] = &[
    "Authentication failed",
    "could not read Username",
    "could not read Password",
    "Permission denied",
    "Invalid username or password",
    "The requested URL returned error: 401",
    "The requested URL returned error: 403",
    "terminal prompts disabled",
];

// ---------------------------------------------------------------------------
// Capability probe
// ---------------------------------------------------------------------------

/// State of the `gh` CLI on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCapability {
    /// Installed and logged in.
    Available,
    /// Not installed (or not runnable).
    Unavailable,
    /// Installed but not logged in.
    Unauthenticated,
}

/// Ask `gh auth status` whether delegated credentials can be used.
pub fn probe_gh() -> ToolCapability {
    let status = Command::new("gh")
        .args(["auth", "status"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    let capability = match status {
        Ok(status) if status.success() => ToolCapability::Available,
        Ok(_) => ToolCapability::Unauthenticated,
        Err(e) if e.kind() == ErrorKind::NotFound => ToolCapability::Unavailable,
        Err(e) => {
            tracing::debug!("gh auth status could not run: {e}");
            ToolCapability::Unavailable
        }
    };
    tracing::debug!("gh capability: {capability:?}");
    capability
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Which strategy authenticates remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    CliDelegated,
    Token,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::CliDelegated => write!(f, "cli-delegated"),
            AuthMode::Token => write!(f, "token"),
        }
    }
}

/// A resolved credential source for one run.
#[derive(Debug, Clone)]
pub enum AuthProvider {
    Delegated,
    Token(Token),
}

impl AuthProvider {
    /// Pick a strategy. Delegated wins whenever `gh` is logged in.
    pub fn resolve(capability: ToolCapability, token: Option<Token>) -> Result<Self, SyncError> {
        if capability == ToolCapability::Available {
            return Ok(AuthProvider::Delegated);
        }
        if let Some(token) = token {
            return Ok(AuthProvider::Token(token));
        }
        let hint = match capability {
            ToolCapability::Unauthenticated => "gh is installed but not logged in (run `gh auth login`)",
            _ => "gh is not installed",
        };
        Err(SyncError::Authentication(format!(
            "no credentials available: {hint}, and neither CLAWSYNC_TOKEN nor GITHUB_TOKEN is set"
        )))
    }

    /// Probe the host and resolve in one step.
    pub fn detect(token: Option<Token>) -> Result<Self, SyncError> {
        Self::resolve(probe_gh(), token)
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            AuthProvider::Delegated => AuthMode::CliDelegated,
            AuthProvider::Token(_) => AuthMode::Token,
        }
    }

    /// Prepare credentials for operations against `remote_url`.
    ///
    /// Keep the returned session alive only for the duration of the remote
    /// operation; dropping it clears any installed credential.
    pub fn authenticate(&self, remote_url: &str) -> Result<AuthSession, SyncError> {
        let (helper, store) = match self {
            AuthProvider::Delegated => (Some("!gh auth git-credential".to_string()), None),
            AuthProvider::Token(token) => match https_host(remote_url) {
                Some(host) => {
                    let store = CredentialStore::install(token, host)?;
                    (Some(store.helper()), Some(store))
                }
                None => {
                    tracing::debug!("remote {remote_url} is not https; no credential installed");
                    (None, None)
                }
            },
        };

        // An empty `credential.helper` first resets any helpers from user config.
        let config = match helper {
            Some(helper) => vec![
                "-c".to_string(),
                "credential.helper=".to_string(),
                "-c".to_string(),
                format!("credential.helper={helper}"),
            ],
            None => Vec::new(),
        };
        tracing::debug!("authenticated via {}", self.mode());
        Ok(AuthSession {
            mode: self.mode(),
            config,
            _store: store,
        })
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Credentials installed for one remote operation.
#[derive(Debug)]
pub struct AuthSession {
    mode: AuthMode,
    config: Vec<String>,
    _store: Option<CredentialStore>,
}

impl AuthSession {
    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Push `HEAD` to `origin/<branch>`.
    pub fn push(&self, repo: &Git, branch: &str) -> Result<(), SyncError> {
        let refspec = format!("HEAD:refs/heads/{branch}");
        let output = repo.output_with_config(
            "push",
            &self.config,
            ["push", "-q", "-u", REMOTE_NAME, refspec.as_str()],
        )?;
        if !output.status.success() {
            return Err(remote_failure("push", &git::failure_detail(&output)));
        }
        tracing::info!("pushed to {REMOTE_NAME}/{branch}");
        Ok(())
    }

    /// Fast-forward the local branch from `origin/<branch>`.
    pub fn pull(&self, repo: &Git, branch: &str) -> Result<(), SyncError> {
        let output = repo.output_with_config(
            "pull",
            &self.config,
            ["pull", "-q", "--ff-only", REMOTE_NAME, branch],
        )?;
        if !output.status.success() {
            return Err(remote_failure("pull", &git::failure_detail(&output)));
        }
        Ok(())
    }

    /// Clone `branch` of `url` into `dest`, which must not exist yet.
    pub fn clone_into(&self, url: &str, dest: &Path, branch: &str) -> Result<(), SyncError> {
        let mut cmd = git::base_command();
        cmd.args(&self.config)
            .args(["clone", "-q", "--branch", branch, "--", url])
            .arg(dest);
        let output = git::spawn_output("clone", cmd)?;
        if !output.status.success() {
            return Err(remote_failure("clone", &git::failure_detail(&output)));
        }
        Ok(())
    }
}

/// Map a failed remote operation to an authentication or operation error.
pub fn remote_failure(operation: &str, detail: &str) -> SyncError {
    if AUTH_FAILURE_MARKERS.iter().any(|m| detail.contains(m)) {
        SyncError::Authentication(format!("{operation} rejected by remote: {detail}"))
    } else {
        SyncError::Operation {
            operation: operation.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Host part of an `https://` URL, without any userinfo.
fn https_host(url: &str) -> Option<&str> {
    let rest = url.strip_prefix("https://")?;
    let authority = rest.split('/').next()?;
    let host = authority.rsplit('@').next()?;
    (!host.is_empty()).then_some(host)
}

// ---------------------------------------------------------------------------
// Ephemeral credential store
// ---------------------------------------------------------------------------

/// A `git credential-store` file inside a private temp directory.
struct CredentialStore {
    dir: TempDir,
    file: PathBuf,
    description: String,
}

impl CredentialStore {
    fn install(token: &Token, host: &str) -> Result<Self, SyncError> {
        let dir = tempfile::Builder::new()
            .prefix("clawsync-cred-")
            .tempdir()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        let file = dir.path().join("credentials");
        let description = format!(
            "protocol=https\nhost={host}\nusername={TOKEN_USERNAME}\npassword={}\n\n",
            token.expose()
        );
        let store = Self {
            dir,
            file,
            description,
        };
        store.credential("approve")?;
        Ok(store)
    }

    fn helper(&self) -> String {
        format!("store --file='{}'", self.file.display())
    }

    fn credential(&self, action: &str) -> Result<(), SyncError> {
        let mut cmd = git::base_command();
        cmd.args(["-c", "credential.helper="])
            .arg("-c")
            .arg(format!("credential.helper={}", self.helper()))
            .args(["credential", action]);
        let output = git::output_with_stdin("credential", cmd, self.description.as_bytes())?;
        if !output.status.success() {
            return Err(git::operation_error(&format!("credential {action}"), &output));
        }
        Ok(())
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

impl Drop for CredentialStore {
    fn drop(&mut self) {
        if let Err(e) = self.credential("reject") {
            tracing::warn!("could not reject temporary credential: {e}");
        }
        tracing::debug!("removing credential store {}", self.dir.path().display());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Thin wrapper over the `git` binary for the local backup repository.
//!
//! Arguments are always passed as an argument vector; nothing is assembled
//! into a shell string. Interactive prompts are disabled so a missing
//! credential fails instead of hanging.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use clawsync_core::CommitAuthor;

use crate::error::{io_err, SyncError};

pub const REMOTE_NAME: &str = "origin";

/// Summary of the most recent commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: String,
    /// Committer date, strict ISO 8601.
    pub committed_at: String,
    pub subject: String,
}

/// A regular file recorded in the `HEAD` tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
    pub path: PathBuf,
    /// Blob id.
    pub object: String,
    /// Mode `100755`.
    pub executable: bool,
}

/// A git working tree rooted at `dir`.
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/.git`
    pub fn metadata_dir(&self) -> PathBuf {
        self.dir.join(".git")
    }

    pub fn is_repo(&self) -> bool {
        self.metadata_dir().is_dir()
    }

    /// Create the repository with `branch` as its unborn initial branch.
    pub fn init(&self, branch: &str) -> Result<(), SyncError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        self.run("init", ["init", "-q"])?;
        self.run(
            "init",
            ["symbolic-ref", "HEAD", &format!("refs/heads/{branch}")],
        )?;
        Ok(())
    }

    /// URL of `origin`, or `None` when no such remote is registered.
    pub fn remote_url(&self) -> Result<Option<String>, SyncError> {
        let output = self.output(["remote", "get-url", REMOTE_NAME])?;
        if !output.status.success() {
            return Ok(None);
        }
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!url.is_empty()).then_some(url))
    }

    /// Register `origin`, or repoint it when it differs from `url`.
    pub fn ensure_remote(&self, url: &str) -> Result<(), SyncError> {
        match self.remote_url()? {
            None => {
                self.run("remote add", ["remote", "add", REMOTE_NAME, url])?;
            }
            Some(current) if current != url => {
                tracing::info!("repointing {REMOTE_NAME}: {current} -> {url}");
                self.run("remote set-url", ["remote", "set-url", REMOTE_NAME, url])?;
            }
            Some(_) => {}
        }
        Ok(())
    }

    pub fn stage_all(&self) -> Result<(), SyncError> {
        self.run("add", ["add", "-A"])?;
        Ok(())
    }

    /// Paths staged for commit with content (added, copied, modified, renamed).
    pub fn staged_paths(&self) -> Result<Vec<PathBuf>, SyncError> {
        let stdout = self.run(
            "diff --cached",
            ["diff", "--cached", "--name-only", "-z", "--diff-filter=ACMR"],
        )?;
        Ok(stdout
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    /// Content of `path` as it sits in the index.
    pub fn staged_blob(&self, path: &Path) -> Result<Vec<u8>, SyncError> {
        let object = format!(":{}", path.to_string_lossy());
        let output = self.output(["cat-file", "blob", object.as_str()])?;
        if !output.status.success() {
            return Err(operation_error("cat-file", &output));
        }
        Ok(output.stdout)
    }

    /// Regular files committed at `HEAD`. Symlinks and submodules are left out.
    pub fn head_files(&self) -> Result<Vec<TreeFile>, SyncError> {
        if !self.has_head()? {
            return Ok(Vec::new());
        }
        let stdout = self.run("ls-tree", ["ls-tree", "-r", "-z", "--full-tree", "HEAD"])?;
        Ok(stdout.split('\0').filter_map(parse_tree_entry).collect())
    }

    /// Content of the blob `object`.
    pub fn blob(&self, object: &str) -> Result<Vec<u8>, SyncError> {
        let output = self.output(["cat-file", "blob", object])?;
        if !output.status.success() {
            return Err(operation_error("cat-file", &output));
        }
        Ok(output.stdout)
    }

    pub fn has_staged_changes(&self) -> Result<bool, SyncError> {
        let output = self.output(["diff", "--cached", "--quiet"])?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(operation_error("diff --cached", &output)),
        }
    }

    /// Empty the index back to `HEAD` (or to nothing on an unborn branch).
    pub fn unstage_all(&self) -> Result<(), SyncError> {
        if self.has_head()? {
            self.run("reset", ["reset", "-q"])?;
        } else {
            self.run(
                "rm --cached",
                ["rm", "-r", "-q", "--cached", "--ignore-unmatch", "."],
            )?;
        }
        Ok(())
    }

    pub fn has_head(&self) -> Result<bool, SyncError> {
        let output = self.output(["rev-parse", "--verify", "-q", "HEAD"])?;
        Ok(output.status.success())
    }

    /// Commit the index and return the new commit id.
    pub fn commit(&self, message: &str, author: &CommitAuthor) -> Result<String, SyncError> {
        let mut cmd = self.command();
        cmd.args(["-c", "commit.gpgsign=false", "commit", "-q", "--no-verify", "-m", message])
            .env("GIT_AUTHOR_NAME", &author.name)
            .env("GIT_AUTHOR_EMAIL", &author.email)
            .env("GIT_COMMITTER_NAME", &author.name)
            .env("GIT_COMMITTER_EMAIL", &author.email);
        let output = spawn_output("commit", cmd)?;
        if !output.status.success() {
            return Err(operation_error("commit", &output));
        }
        Ok(self.run("rev-parse", ["rev-parse", "HEAD"])?.trim().to_string())
    }

    /// Number of commits reachable from `HEAD`; `0` on an unborn branch.
    pub fn commit_count(&self) -> Result<usize, SyncError> {
        if !self.has_head()? {
            return Ok(0);
        }
        parse_count(&self.run("rev-list", ["rev-list", "--count", "HEAD"])?)
    }

    /// Local commits not yet on `origin/<branch>`.
    pub fn unpushed_commits(&self, branch: &str) -> Result<usize, SyncError> {
        if !self.has_head()? {
            return Ok(0);
        }
        let tracking = format!("refs/remotes/{REMOTE_NAME}/{branch}");
        let known = self
            .output(["rev-parse", "--verify", "-q", tracking.as_str()])?
            .status
            .success();
        if !known {
            return self.commit_count();
        }
        let range = format!("{tracking}..HEAD");
        parse_count(&self.run("rev-list", ["rev-list", "--count", range.as_str()])?)
    }

    pub fn head_commit(&self) -> Result<Option<CommitInfo>, SyncError> {
        if !self.is_repo() || !self.has_head()? {
            return Ok(None);
        }
        let stdout = self.run("log", ["log", "-1", "--format=%H%x00%cI%x00%s"])?;
        let mut parts = stdout.trim_end().splitn(3, '\0');
        let (Some(id), Some(committed_at), Some(subject)) = (parts.next(), parts.next(), parts.next())
        else {
            return Ok(None);
        };
        Ok(Some(CommitInfo {
            id: id.to_string(),
            committed_at: committed_at.to_string(),
            subject: subject.to_string(),
        }))
    }

    /// Run a remote-facing subcommand with extra `-c` settings (credential
    /// helpers) placed before the subcommand.
    pub(crate) fn output_with_config<I, S>(
        &self,
        operation: &str,
        config: &[String],
        args: I,
    ) -> Result<Output, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command();
        cmd.args(config).args(args);
        spawn_output(operation, cmd)
    }

    fn run<I, S>(&self, operation: &str, args: I) -> Result<String, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(operation_error(operation, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn output<I, S>(&self, args: I) -> Result<Output, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command();
        cmd.args(args);
        spawn_output("invocation", cmd)
    }

    fn command(&self) -> Command {
        let mut cmd = base_command();
        cmd.arg("-C").arg(&self.dir);
        cmd
    }
}

/// `git` with prompts and pagers disabled.
pub(crate) fn base_command() -> Command {
    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_PAGER", "cat")
        .stdin(Stdio::null());
    cmd
}

pub(crate) fn spawn_output(operation: &str, mut cmd: Command) -> Result<Output, SyncError> {
    cmd.output().map_err(|e| SyncError::Operation {
        operation: operation.to_string(),
        detail: format!("could not run git: {e}"),
    })
}

/// Run `cmd` feeding `input` on stdin.
pub(crate) fn output_with_stdin(
    operation: &str,
    mut cmd: Command,
    input: &[u8],
) -> Result<Output, SyncError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let spawn_failed = |e: std::io::Error| SyncError::Operation {
        operation: operation.to_string(),
        detail: format!("could not run git: {e}"),
    };
    let mut child = cmd.spawn().map_err(spawn_failed)?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input).map_err(spawn_failed)?;
    }
    child.wait_with_output().map_err(spawn_failed)
}

pub(crate) fn operation_error(operation: &str, output: &Output) -> SyncError {
    SyncError::Operation {
        operation: operation.to_string(),
        detail: failure_detail(output),
    }
}

/// stderr (or stdout when stderr is empty) of a failed command, trimmed.
pub(crate) fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        return stdout;
    }
    format!("exited with {}", output.status)
}

/// `<mode> SP <type> SP <object> TAB <path>`
fn parse_tree_entry(entry: &str) -> Option<TreeFile> {
    let (meta, path) = entry.split_once('\t')?;
    let mut fields = meta.split(' ');
    let (mode, kind, object) = (fields.next()?, fields.next()?, fields.next()?);
    if kind != "blob" || !matches!(mode, "100644" | "100755") {
        return None;
    }
    Some(TreeFile {
        path: PathBuf::from(path),
        object: object.to_string(),
        executable: mode == "100755",
    })
}

fn parse_count(stdout: &str) -> Result<usize, SyncError> {
    stdout.trim().parse().map_err(|_| SyncError::Operation {
        operation: "rev-list".to_string(),
        detail: format!("unexpected count output '{}'", stdout.trim()),
    })
}

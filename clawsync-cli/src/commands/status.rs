//! `clawsync status`: configuration, credentials and backup state.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use clawsync_core::Config;
use clawsync_sync::{diff_backup, probe_gh, AuthProvider, CommitInfo, Git, ToolCapability};

use super::backup::short;
use super::load_config;

/// Arguments for `clawsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let report = build_report(&config, probe_gh())?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    repo: String,
    remote_url: String,
    branch: String,
    workspace: String,
    backup_dir: String,
    auth: AuthStatus,
    last_backup: Option<LastBackup>,
    /// `None` when the workspace does not exist.
    pending_changes: Option<usize>,
    unpushed_commits: usize,
}

#[derive(Debug, Serialize)]
struct AuthStatus {
    gh: &'static str,
    token_configured: bool,
    mode: Option<String>,
}

#[derive(Debug, Serialize)]
struct LastBackup {
    commit: String,
    committed_at: String,
    age: String,
    subject: String,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "setting")]
    setting: String,
    #[tabled(rename = "value")]
    value: String,
}

fn build_report(config: &Config, gh: ToolCapability) -> Result<StatusReport> {
    let token_configured = config.token.is_some();
    let mode = AuthProvider::resolve(gh, config.token.clone())
        .ok()
        .map(|provider| provider.mode().to_string());

    let git = Git::new(&config.backup_dir);
    let (last_backup, unpushed_commits) = if git.is_repo() {
        let head = git.head_commit().context("failed to read backup history")?;
        let unpushed = git
            .unpushed_commits(&config.branch)
            .context("failed to compare with remote-tracking branch")?;
        (head.map(to_last_backup), unpushed)
    } else {
        (None, 0)
    };

    let pending_changes = if config.workspace.is_dir() {
        let diffs = diff_backup(&config.workspace, &config.backup_dir, &config.policy())
            .context("failed to compute pending changes")?;
        Some(diffs.len())
    } else {
        None
    };

    Ok(StatusReport {
        repo: config.repo.to_string(),
        remote_url: config.remote_url.clone(),
        branch: config.branch.clone(),
        workspace: config.workspace.display().to_string(),
        backup_dir: config.backup_dir.display().to_string(),
        auth: AuthStatus {
            gh: gh_label(gh),
            token_configured,
            mode,
        },
        last_backup,
        pending_changes,
        unpushed_commits,
    })
}

fn to_last_backup(info: CommitInfo) -> LastBackup {
    let age = DateTime::parse_from_rfc3339(&info.committed_at)
        .map(|at| format_age(at.with_timezone(&Utc)))
        .unwrap_or_else(|_| "unknown".to_string());
    LastBackup {
        commit: info.id,
        committed_at: info.committed_at,
        age,
        subject: info.subject,
    }
}

fn print_table(report: &StatusReport) {
    println!("clawsync v{} | {}", env!("CARGO_PKG_VERSION"), report.repo.bold());

    let last = match &report.last_backup {
        Some(last) => format!("{} ({} ago)", short(&last.commit), last.age),
        None => "never".to_string(),
    };
    let pending = match report.pending_changes {
        Some(0) => "none".green().to_string(),
        Some(n) => format!("{n} file(s)").yellow().to_string(),
        None => "workspace missing".red().to_string(),
    };
    let auth = match &report.auth.mode {
        Some(mode) => mode.green().to_string(),
        None => "unavailable".red().to_string(),
    };

    let rows = vec![
        row("remote", &report.remote_url),
        row("branch", &report.branch),
        row("workspace", &report.workspace),
        row("backup dir", &report.backup_dir),
        row("gh cli", report.auth.gh),
        row("token", if report.auth.token_configured { "configured" } else { "not set" }),
        row("auth mode", &auth),
        row("last backup", &last),
        row("pending changes", &pending),
        row("unpushed commits", &report.unpushed_commits.to_string()),
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if report.auth.mode.is_none() {
        println!("Run `gh auth login` or set CLAWSYNC_TOKEN before backing up.");
    } else if matches!(report.pending_changes, Some(n) if n > 0) || report.unpushed_commits > 0 {
        println!("Run 'clawsync backup' to bring the remote up to date.");
    }
}

fn row(setting: &str, value: &str) -> StatusRow {
    StatusRow {
        setting: setting.to_string(),
        value: value.to_string(),
    }
}

fn gh_label(capability: ToolCapability) -> &'static str {
    match capability {
        ToolCapability::Available => "logged in",
        ToolCapability::Unauthenticated => "not logged in",
        ToolCapability::Unavailable => "not installed",
    }
}

fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}

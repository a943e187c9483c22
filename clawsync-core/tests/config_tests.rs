//! Config assembly tests: required settings, file/env layering, defaults.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use assert_fs::prelude::*;
use clawsync_core::{config, Config, ConfigError, Token};
use predicates::prelude::predicate;

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn load(home: &assert_fs::TempDir, vars: &HashMap<String, String>) -> Result<Config, ConfigError> {
    Config::load_at(home.path(), |key| vars.get(key).cloned())
}

// ---------------------------------------------------------------------------
// 1. Required settings
// ---------------------------------------------------------------------------

#[test]
fn missing_repo_is_reported_by_name() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = load(&home, &env(&[("CLAWSYNC_WORKSPACE", "/tmp/ws")])).unwrap_err();
    assert!(matches!(err, ConfigError::Missing { key: "CLAWSYNC_REPO" }), "got: {err}");
    assert!(err.to_string().contains("CLAWSYNC_REPO"));
}

#[test]
fn missing_workspace_is_reported_by_name() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = load(&home, &env(&[("CLAWSYNC_REPO", "octo/backup")])).unwrap_err();
    assert!(
        matches!(err, ConfigError::Missing { key: "CLAWSYNC_WORKSPACE" }),
        "got: {err}"
    );
}

#[test]
fn empty_values_count_as_missing() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = load(
        &home,
        &env(&[("CLAWSYNC_REPO", "  "), ("CLAWSYNC_WORKSPACE", "/tmp/ws")]),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Missing { .. }), "got: {err}");
}

#[test]
fn malformed_repo_is_rejected() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = load(
        &home,
        &env(&[("CLAWSYNC_REPO", "just-a-name"), ("CLAWSYNC_WORKSPACE", "/tmp/ws")]),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidRepo { .. }), "got: {err}");
    assert!(err.to_string().contains("owner/name"));
}

#[test]
fn option_like_branch_is_rejected() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = load(
        &home,
        &env(&[
            ("CLAWSYNC_REPO", "octo/backup"),
            ("CLAWSYNC_WORKSPACE", "/tmp/ws"),
            ("CLAWSYNC_BRANCH", "--force"),
        ]),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBranch { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Defaults
// ---------------------------------------------------------------------------

#[test]
fn defaults_fill_optional_settings() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let cfg = load(
        &home,
        &env(&[("CLAWSYNC_REPO", "octo/backup"), ("CLAWSYNC_WORKSPACE", "~/ws")]),
    )
    .expect("load");

    assert_eq!(cfg.branch, "main");
    assert_eq!(cfg.workspace, home.path().join("ws"));
    assert_eq!(cfg.backup_dir, config::default_backup_dir(home.path()));
    assert_eq!(cfg.remote_url, "https://github.com/octo/backup.git");
    assert!(cfg.token.is_none());
    assert_eq!(cfg.author.name, "clawsync");
    assert!(cfg.extra_deny.is_empty());
}

#[test]
fn token_falls_back_to_github_token() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let cfg = load(
        &home,
        &env(&[
            ("CLAWSYNC_REPO", "octo/backup"),
            ("CLAWSYNC_WORKSPACE", "/tmp/ws"),
            ("GITHUB_TOKEN", "gh-fallback"),
        ]),
    )
    .expect("load");
    assert_eq!(cfg.token, Some(Token::new("gh-fallback")));

    let cfg = load(
        &home,
        &env(&[
            ("CLAWSYNC_REPO", "octo/backup"),
            ("CLAWSYNC_WORKSPACE", "/tmp/ws"),
            ("GITHUB_TOKEN", "gh-fallback"),
            ("CLAWSYNC_TOKEN", "explicit"),
        ]),
    )
    .expect("load");
    assert_eq!(cfg.token, Some(Token::new("explicit")));
}

#[test]
fn config_debug_never_prints_the_token() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let cfg = load(
        &home,
        &env(&[
            ("CLAWSYNC_REPO", "octo/backup"),
            ("CLAWSYNC_WORKSPACE", "/tmp/ws"),
            ("CLAWSYNC_TOKEN", "very-secret-value"),
        ]),
    )
    .expect("load");
    assert!(!format!("{cfg:?}").contains("very-secret-value"));
}

// ---------------------------------------------------------------------------
// 3. Config file layering
// ---------------------------------------------------------------------------

#[test]
fn config_file_supplies_values_and_env_overrides_them() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let file = home.child(".clawsync/config.yaml");
    file.write_str(
        "repo: octo/from-file\n\
         workspace: /srv/workspace\n\
         branch: backups\n\
         extra_deny:\n  - private\n\
         author_email: bot@example.com\n",
    )
    .expect("write config");

    let cfg = load(&home, &env(&[])).expect("load from file");
    assert_eq!(cfg.repo.to_string(), "octo/from-file");
    assert_eq!(cfg.workspace, PathBuf::from("/srv/workspace"));
    assert_eq!(cfg.branch, "backups");
    assert_eq!(cfg.extra_deny, vec!["private".to_string()]);
    assert_eq!(cfg.author.email, "bot@example.com");
    assert!(!cfg
        .policy()
        .evaluate(std::path::Path::new("skills/private/SKILL.md"))
        .is_allowed());

    let cfg = load(
        &home,
        &env(&[("CLAWSYNC_REPO", "octo/from-env"), ("CLAWSYNC_BRANCH", "main")]),
    )
    .expect("load with overrides");
    assert_eq!(cfg.repo.to_string(), "octo/from-env");
    assert_eq!(cfg.branch, "main");
    assert_eq!(cfg.workspace, PathBuf::from("/srv/workspace"));
}

#[test]
fn config_location_can_be_overridden() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let custom = home.child("elsewhere/clawsync.yaml");
    custom
        .write_str("repo: octo/custom\nworkspace: /srv/ws\nremote_url: /srv/remote.git\n")
        .expect("write");

    let cfg = load(
        &home,
        &env(&[("CLAWSYNC_CONFIG", custom.path().to_str().expect("utf8 path"))]),
    )
    .expect("load");
    assert_eq!(cfg.repo.to_string(), "octo/custom");
    assert_eq!(cfg.remote_url, "/srv/remote.git");
}

#[test]
fn token_in_config_file_is_rejected() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".clawsync/config.yaml")
        .write_str("repo: octo/backup\nworkspace: /srv/ws\ntoken: ghp_nope\n")
        .expect("write");

    let err = load(&home, &env(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn corrupt_config_file_reports_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".clawsync");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("config.yaml"), b": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = load(&home, &env(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[test]
fn loading_config_creates_nothing_on_disk() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let _ = load(
        &home,
        &env(&[("CLAWSYNC_REPO", "octo/backup"), ("CLAWSYNC_WORKSPACE", "/tmp/ws")]),
    )
    .expect("load");
    home.child(".clawsync").assert(predicate::path::missing());
}

//! Parameterised policy tests.
//!
//! Each `#[case]` is a relative workspace path and the verdict it must get.

use std::path::Path;

use clawsync_core::{Category, Decision, DenyReason, PolicySet, Sensitivity};
use rstest::rstest;

// ---------------------------------------------------------------------------
// Identity files: allow-only
// ---------------------------------------------------------------------------

#[rstest]
#[case("SOUL.md")]
#[case("IDENTITY.md")]
#[case("HEARTBEAT.md")]
fn allow_listed_identity_files_are_restricted(#[case] path: &str) {
    let policy = PolicySet::default();
    assert_eq!(policy.evaluate(Path::new(path)), Decision::Allow);
    let entry = policy.classify(Path::new(path));
    assert_eq!(entry.category, Category::IdentityFile);
    assert_eq!(entry.sensitivity, Sensitivity::Restricted);
}

#[rstest]
#[case("AGENTS.md")]
#[case("USER.md")]
#[case("MEMORY.md")]
#[case("TOOLS.md")]
fn sensitive_identity_files_are_forbidden(#[case] path: &str) {
    let policy = PolicySet::default();
    assert_eq!(
        policy.evaluate(Path::new(path)),
        Decision::Deny(DenyReason::SensitiveFile(path.to_string()))
    );
    assert_eq!(
        policy.classify(Path::new(path)).sensitivity,
        Sensitivity::Forbidden
    );
}

#[rstest]
#[case("README.md")]
#[case("notes.txt")]
#[case("soul.md")]
fn other_root_files_are_not_allow_listed(#[case] path: &str) {
    let policy = PolicySet::default();
    assert_eq!(
        policy.evaluate(Path::new(path)),
        Decision::Deny(DenyReason::NotAllowListed)
    );
    assert_eq!(
        policy.classify(Path::new(path)).sensitivity,
        Sensitivity::Restricted
    );
}

// ---------------------------------------------------------------------------
// Skills and scripts: deny fragments win
// ---------------------------------------------------------------------------

#[rstest]
#[case("skills/weather/SKILL.md", Category::Skill)]
#[case("skills/weather/src/main.py", Category::Skill)]
#[case("scripts/test.sh", Category::Script)]
#[case("scripts/cron/update.py", Category::Script)]
fn directory_content_is_public(#[case] path: &str, #[case] category: Category) {
    let policy = PolicySet::default();
    assert!(policy.evaluate(Path::new(path)).is_allowed());
    let entry = policy.classify(Path::new(path));
    assert_eq!(entry.category, category);
    assert_eq!(entry.sensitivity, Sensitivity::Public);
}

#[rstest]
#[case("skills/credentials-helper/SKILL.md", "credentials")]
#[case("skills/web/node_modules/left-pad/index.js", "node_modules")]
#[case("skills/py/venv/bin/python", "venv")]
#[case("skills/py/__pycache__/mod.cpython-312.pyc", "__pycache__")]
#[case("scripts/.env", ".env")]
#[case("scripts/deploy/.env.local", ".env")]
#[case("skills/vendored/.git/config", ".git")]
fn deny_fragment_anywhere_in_path_is_forbidden(#[case] path: &str, #[case] fragment: &str) {
    let policy = PolicySet::default();
    assert_eq!(
        policy.evaluate(Path::new(path)),
        Decision::Deny(DenyReason::Fragment(fragment.to_string()))
    );
    assert_eq!(
        policy.classify(Path::new(path)).sensitivity,
        Sensitivity::Forbidden
    );
}

#[rstest]
#[case("skills/helper/AGENTS.md")]
#[case("scripts/USER.md")]
#[case("skills/memory/MEMORY.md.bak")]
fn sensitive_names_never_leak_into_directories(#[case] path: &str) {
    let policy = PolicySet::default();
    assert!(matches!(
        policy.evaluate(Path::new(path)),
        Decision::Deny(DenyReason::SensitiveFile(_))
    ));
}

#[test]
fn deny_matching_is_case_sensitive() {
    let policy = PolicySet::default();
    assert!(policy
        .evaluate(Path::new("skills/Credentials-Guide/SKILL.md"))
        .is_allowed());
}

// ---------------------------------------------------------------------------
// Out of scope
// ---------------------------------------------------------------------------

#[rstest]
#[case("memory/2024-06-01.md")]
#[case("canvas/index.html")]
#[case("skills")]
#[case("../skills/escape.sh")]
fn everything_else_is_out_of_scope(#[case] path: &str) {
    let policy = PolicySet::default();
    assert_eq!(
        policy.evaluate(Path::new(path)),
        Decision::Deny(DenyReason::OutOfScope)
    );
}

// ---------------------------------------------------------------------------
// Extra deny fragments
// ---------------------------------------------------------------------------

#[test]
fn extra_deny_fragments_extend_builtins() {
    let policy = PolicySet::with_extra_deny(["private", ""]);
    assert!(policy.deny_fragments().iter().any(|f| f == "credentials"));
    assert!(policy.deny_fragments().iter().any(|f| f == "private"));
    assert!(!policy.deny_fragments().iter().any(String::is_empty));
    assert_eq!(
        policy.evaluate(Path::new("skills/private-notes/SKILL.md")),
        Decision::Deny(DenyReason::Fragment("private".to_string()))
    );
}

#[test]
fn extra_deny_does_not_duplicate_builtins() {
    let policy = PolicySet::with_extra_deny([".env"]);
    let count = policy
        .deny_fragments()
        .iter()
        .filter(|f| f.as_str() == ".env")
        .count();
    assert_eq!(count, 1);
}

use super::test_helpers::*;
use roster_vault::config::Credentials;
use roster_vault::errors::{ErrorKind, Remediation};
use roster_vault::sync::{
    ConflictStrategy, OperationLock, PushStage, SyncRequest, SyncStatus,
};
use std::time::Duration;

/// Saving twice with no edit in between publishes once and then reports no changes
#[test]
fn test_repeated_save_is_idempotent() {
    let (_remote_dir, remote) = create_bare_remote();
    let (_vault_dir, vault) = create_vault();
    let sync = synchronizer(&vault, settings(Some(&remote), true));

    write_file(&vault, "data/caregivers/1.json", r#"{"id": "1", "name": "Ana"}"#);
    let first = sync.synchronize(&SyncRequest::auto("Added caregiver Ana"));
    assert_eq!(first.status, SyncStatus::Pushed, "{}", first.detail);
    assert_eq!(remote_head(&remote, "main"), Some(head(&vault)));

    let commits_before = git(&vault, &["rev-list", "--count", "HEAD"]);
    let second = sync.synchronize(&SyncRequest::auto("Added caregiver Ana"));
    assert_eq!(second.status, SyncStatus::NoChanges);
    assert!(second.push_attempts.is_empty());
    assert_eq!(git(&vault, &["rev-list", "--count", "HEAD"]), commits_before);
}

/// Without auto-push a save commits locally and stops
#[test]
fn test_save_without_auto_push_only_commits() {
    let (_remote_dir, remote) = create_bare_remote();
    let (_vault_dir, vault) = create_vault();
    let sync = synchronizer(&vault, settings(Some(&remote), false));

    write_file(&vault, "data/categories/1.json", r#"{"id": "1"}"#);
    let outcome = sync.synchronize(&SyncRequest::auto("Added category 1"));

    assert_eq!(outcome.status, SyncStatus::Committed);
    assert_eq!(remote_head(&remote, "main"), None);
    assert_eq!(
        git(&vault, &["log", "-1", "--format=%s"]),
        "Added category 1"
    );
}

/// A detached HEAD is reattached to `main` before committing
#[test]
fn test_detached_head_recovers_to_main() {
    let (_vault_dir, vault) = create_vault();
    git(&vault, &["checkout", "--quiet", "--detach", "HEAD"]);
    let sync = synchronizer(&vault, settings(None, false));

    write_file(&vault, "data/templates/1.json", r#"{"id": "1"}"#);
    let outcome = sync.synchronize(&SyncRequest::auto("Added template 1"));

    assert_eq!(outcome.status, SyncStatus::Committed, "{}", outcome.detail);
    assert_eq!(git(&vault, &["rev-parse", "--abbrev-ref", "HEAD"]), "main");
    assert_eq!(git(&vault, &["log", "-1", "--format=%s", "main"]), "Added template 1");
}

/// A held lock turns a second save away without touching the repository
#[test]
fn test_held_lock_rejects_concurrent_save() {
    let (_vault_dir, vault) = create_vault();
    let sync = synchronizer(&vault, settings(None, false));
    let before = head(&vault);

    let lock = OperationLock::acquire(&vault.join(".git"), Duration::from_secs(300)).unwrap();
    write_file(&vault, "data/calendars/1.json", r#"{"id": "1"}"#);

    let outcome = sync.synchronize(&SyncRequest::auto("Added calendar 1"));
    assert_eq!(outcome.status, SyncStatus::Failed);
    assert_eq!(outcome.error_kind, Some(ErrorKind::Locked));
    assert_eq!(head(&vault), before);

    drop(lock);
    let retry = sync.synchronize(&SyncRequest::auto("Added calendar 1"));
    assert_eq!(retry.status, SyncStatus::Committed);
}

/// A marker left by a crashed process does not block saves
#[test]
fn test_abandoned_lock_marker_is_reclaimed() {
    let (_vault_dir, vault) = create_vault();
    let marker = vault.join(".git").join("roster-sync.lock");
    std::fs::write(
        &marker,
        serde_json::json!({
            "pid": 999_999,
            "started_at": "2020-01-01T00:00:00Z",
            "token": "3f0e1c2a-8b7d-4e6f-9a1b-2c3d4e5f6a7b"
        })
        .to_string(),
    )
    .unwrap();
    let sync = synchronizer(&vault, settings(None, false));

    write_file(&vault, "data/caregivers/2.json", r#"{"id": "2"}"#);
    let outcome = sync.synchronize(&SyncRequest::auto("Added caregiver 2"));

    assert_eq!(outcome.status, SyncStatus::Committed, "{}", outcome.detail);
    assert!(!marker.exists());
}

/// Pointing at a repository that does not exist is reported as a remote error
/// and keeps the local commit
#[test]
fn test_nonexistent_remote_is_remote_error() {
    let (_vault_dir, vault) = create_vault();
    let missing = vault.parent().unwrap().join("missing.git");
    let sync = synchronizer(&vault, settings(Some(&missing), true));

    write_file(&vault, "data/caregivers/3.json", r#"{"id": "3"}"#);
    let outcome = sync.synchronize(&SyncRequest::auto("Added caregiver 3"));

    assert_eq!(outcome.status, SyncStatus::Failed);
    assert_eq!(outcome.error_kind, Some(ErrorKind::RemoteError));
    assert_eq!(outcome.remediation(), Some(Remediation::RepairRemote));
    assert_eq!(outcome.commit.as_deref(), Some(head(&vault).as_str()));
    assert_eq!(git(&vault, &["remote", "get-url", "origin"]), missing.display().to_string());
}

fn diverged_remote() -> (
    tempfile::TempDir,
    std::path::PathBuf,
    tempfile::TempDir,
    std::path::PathBuf,
    tempfile::TempDir,
    std::path::PathBuf,
) {
    let (remote_dir, remote) = create_bare_remote();
    let (vault_dir, vault) = create_vault();
    let sync = synchronizer(&vault, settings(Some(&remote), true));
    assert_eq!(
        sync.synchronize(&SyncRequest::forced("Publish")).status,
        SyncStatus::Pushed
    );

    let (other_dir, other) = clone_remote(&remote);
    write_file(&other, "data/categories/remote.json", r#"{"id": "remote"}"#);
    git(&other, &["add", "--all"]);
    git(&other, &["commit", "--quiet", "-m", "Remote edit"]);
    git(&other, &["push", "--quiet", "origin", "main"]);

    write_file(&vault, "data/categories/local.json", r#"{"id": "local"}"#);
    (remote_dir, remote, vault_dir, vault, other_dir, other)
}

/// A routine save never rebases; a diverged remote is reported and left alone
#[test]
fn test_diverged_remote_in_auto_mode_is_rejected_push() {
    let (_r, remote, _v, vault, _o, other) = diverged_remote();
    let sync = synchronizer(&vault, settings(Some(&remote), true));

    let outcome = sync.synchronize(&SyncRequest::auto("Local edit"));

    assert_eq!(outcome.status, SyncStatus::Failed);
    assert_eq!(outcome.error_kind, Some(ErrorKind::RejectedPush));
    let stages: Vec<PushStage> = outcome.push_attempts.iter().map(|a| a.stage).collect();
    assert_eq!(stages, vec![PushStage::FastForward]);
    assert!(!vault.join("data/categories/remote.json").exists());
    assert_eq!(remote_head(&remote, "main"), Some(head(&other)));
    assert_eq!(git(&vault, &["log", "-1", "--format=%s"]), "Local edit");
}

/// A forced save integrates remote edits to other files by rebasing first
#[test]
fn test_diverged_remote_is_integrated_when_forced() {
    let (_r, remote, _v, vault, _o, _other) = diverged_remote();
    let sync = synchronizer(&vault, settings(Some(&remote), true));

    let outcome = sync.synchronize(&SyncRequest::forced("Local edit"));

    assert_eq!(outcome.status, SyncStatus::Pushed, "{}", outcome.detail);
    let stages: Vec<PushStage> = outcome.push_attempts.iter().map(|a| a.stage).collect();
    assert_eq!(stages, vec![PushStage::FastForward, PushStage::IntegrateThenPush]);
    assert!(vault.join("data/categories/remote.json").exists());
    assert_eq!(remote_head(&remote, "main"), Some(head(&vault)));
}

fn conflicting_edit() -> (
    tempfile::TempDir,
    std::path::PathBuf,
    tempfile::TempDir,
    std::path::PathBuf,
    tempfile::TempDir,
    std::path::PathBuf,
) {
    let (remote_dir, remote) = create_bare_remote();
    let (vault_dir, vault) = create_vault();
    write_file(&vault, "data/templates/shared.json", r#"{"name": "base"}"#);
    let sync = synchronizer(&vault, settings(Some(&remote), true));
    assert_eq!(
        sync.synchronize(&SyncRequest::auto("Base")).status,
        SyncStatus::Pushed
    );

    let (other_dir, other) = clone_remote(&remote);
    write_file(&other, "data/templates/shared.json", r#"{"name": "remote"}"#);
    git(&other, &["commit", "--quiet", "-am", "Remote edit"]);
    git(&other, &["push", "--quiet", "origin", "main"]);

    write_file(&vault, "data/templates/shared.json", r#"{"name": "local"}"#);
    (remote_dir, remote, vault_dir, vault, other_dir, other)
}

/// A conflicting remote edit is never overwritten by a routine save
#[test]
fn test_conflict_in_auto_mode_is_rejected_push() {
    let (_r, remote, _v, vault, _o, other) = conflicting_edit();
    let sync = synchronizer(&vault, settings(Some(&remote), true));

    let outcome = sync.synchronize(&SyncRequest::auto("Local edit"));

    assert_eq!(outcome.status, SyncStatus::Failed);
    assert_eq!(outcome.error_kind, Some(ErrorKind::RejectedPush));
    assert!(outcome.commit.is_some());
    assert_eq!(remote_head(&remote, "main"), Some(head(&other)));
    assert_eq!(outcome.push_attempts.len(), 1);
    assert_eq!(git(&vault, &["rev-parse", "--abbrev-ref", "HEAD"]), "main");
}

/// Keeping the remote version discards the local commit
#[test]
fn test_keep_remote_resets_to_remote_branch() {
    let (_r, remote, _v, vault, _o, other) = conflicting_edit();
    let sync = synchronizer(&vault, settings(Some(&remote), true));
    sync.synchronize(&SyncRequest::auto("Local edit"));

    let outcome = sync.resolve_conflict(ConflictStrategy::KeepRemote);

    assert_eq!(outcome.status, SyncStatus::NoChanges, "{}", outcome.detail);
    assert_eq!(head(&vault), head(&other));
    let content = std::fs::read_to_string(vault.join("data/templates/shared.json")).unwrap();
    assert!(content.contains("remote"));
}

/// A forced save climbs to the lease-protected force push
#[test]
fn test_forced_save_overwrites_with_lease() {
    let (_r, remote, _v, vault, _o, _other) = conflicting_edit();
    let sync = synchronizer(&vault, settings(Some(&remote), true));

    let outcome = sync.synchronize(&SyncRequest::forced("Keep my version"));

    assert_eq!(outcome.status, SyncStatus::Pushed, "{}", outcome.detail);
    let stages: Vec<PushStage> = outcome.push_attempts.iter().map(|a| a.stage).collect();
    assert_eq!(
        stages,
        vec![
            PushStage::FastForward,
            PushStage::IntegrateThenPush,
            PushStage::ForceWithLease
        ]
    );
    assert_eq!(remote_head(&remote, "main"), Some(head(&vault)));
}

/// Provisioning credentials never writes the token into the remote URL or
/// the repository config
#[test]
fn test_credentials_never_land_in_repository_config() {
    const TOKEN: &str = "ghp_integrationsecret1234567890";
    let (_vault_dir, vault) = create_vault();
    git(
        &vault,
        &["remote", "add", "origin", "https://github.com/acme/roster-data.git"],
    );
    let mut settings = settings(None, false);
    settings.auth = Credentials::new(Some(TOKEN.to_string()), None);
    let sync = synchronizer(&vault, settings);

    let result = sync.remediate(Remediation::ProvisionCredentials).unwrap();
    assert!(result.changed());
    assert!(!result.describe().contains(TOKEN));

    assert_eq!(
        git(&vault, &["remote", "get-url", "origin"]),
        "https://github.com/acme/roster-data.git"
    );
    let config = std::fs::read_to_string(vault.join(".git/config")).unwrap();
    assert!(!config.contains(TOKEN));
    let stored = std::fs::read_to_string(vault.join(".git/roster-credentials")).unwrap();
    assert!(stored.contains(TOKEN));
}

/// Status reflects the repository without changing it
#[test]
fn test_status_is_read_only() {
    let (_vault_dir, vault) = create_vault();
    git(&vault, &["checkout", "--quiet", "--detach", "HEAD"]);
    write_file(&vault, "data/caregivers/4.json", "{}");
    let sync = synchronizer(&vault, settings(None, false));

    let report = sync.status();

    assert!(report.repository.head_detached);
    assert!(report.repository.working_tree_dirty);
    assert!(!report.changes.is_empty());
    assert!(report.lock.is_none());
    assert_eq!(git(&vault, &["rev-parse", "--abbrev-ref", "HEAD"]), "HEAD");
}

use roster_vault::config::{initialize_repo, settings_path, Settings};
use serial_test::serial;
use std::env;
use tempfile::TempDir;

const VARS: &[&str] = &[
    "ROSTER_GIT_BRANCH",
    "ROSTER_GIT_AUTO_PUSH",
    "ROSTER_GIT_TOKEN",
    "GITHUB_TOKEN",
    "ROSTER_ENV",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

/// Environment overrides apply on top of the stored file
#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_env();
    let tmp = TempDir::new().unwrap();
    initialize_repo(tmp.path(), Some("https://example.test/data.git".to_string())).unwrap();

    env::set_var("ROSTER_GIT_BRANCH", "trunk");
    env::set_var("ROSTER_GIT_AUTO_PUSH", "true");
    env::set_var("GITHUB_TOKEN", "ghp_fromgithubvar");
    env::set_var("ROSTER_ENV", "production");

    let settings = Settings::load(tmp.path()).unwrap();
    clear_env();

    assert_eq!(settings.git.branch_candidates, vec!["trunk", "main", "master"]);
    assert!(settings.git.auto_push);
    assert_eq!(settings.auth.token(), Some("ghp_fromgithubvar"));
    assert!(!settings.store.git_enabled());

    // Credentials are never written back.
    settings.save_to_file(&settings_path(tmp.path())).unwrap();
    let stored = std::fs::read_to_string(settings_path(tmp.path())).unwrap();
    assert!(!stored.contains("ghp_fromgithubvar"));
}

/// The roster-specific token wins over the generic one
#[test]
#[serial]
fn test_roster_token_preferred() {
    clear_env();
    let tmp = TempDir::new().unwrap();
    initialize_repo(tmp.path(), None).unwrap();

    env::set_var("ROSTER_GIT_TOKEN", "ghp_roster");
    env::set_var("GITHUB_TOKEN", "ghp_generic");
    let settings = Settings::load(tmp.path()).unwrap();
    clear_env();

    assert_eq!(settings.auth.token(), Some("ghp_roster"));
}

/// A malformed boolean in the environment is a configuration error
#[test]
#[serial]
fn test_invalid_env_boolean_rejected() {
    clear_env();
    let tmp = TempDir::new().unwrap();
    initialize_repo(tmp.path(), None).unwrap();

    env::set_var("ROSTER_GIT_AUTO_PUSH", "sometimes");
    let result = Settings::load(tmp.path());
    clear_env();

    assert!(result.is_err());
}

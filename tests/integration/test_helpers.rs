use roster_vault::config::{initialize_repo, Settings};
use roster_vault::git::GitClient;
use roster_vault::sync::Synchronizer;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Run git in `dir`, panicking with stderr on failure. Returns trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("git should be installed");

    if !output.status.success() {
        panic!(
            "git {} failed\nstderr: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn configure_identity(repo: &Path) {
    git(repo, &["config", "user.name", "Test User"]);
    git(repo, &["config", "user.email", "test@example.com"]);
    git(repo, &["config", "core.autocrlf", "false"]);
}

/// Bare repository whose HEAD names `main`.
pub fn create_bare_remote() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("remote.git");
    std::fs::create_dir_all(&path).unwrap();
    git(&path, &["init", "--bare", "--quiet"]);
    git(&path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    (temp_dir, path)
}

/// Initialized vault on `main` with one commit holding the layout.
pub fn create_vault() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().join("vault");
    std::fs::create_dir_all(&repo_path).unwrap();

    git(&repo_path, &["init", "--quiet"]);
    git(&repo_path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    configure_identity(&repo_path);

    initialize_repo(&repo_path, None).unwrap();
    git(&repo_path, &["add", "--all"]);
    git(&repo_path, &["commit", "--quiet", "-m", "Initial commit"]);

    (temp_dir, repo_path)
}

/// Second working copy of `remote`, as another device would have.
pub fn clone_remote(remote: &Path) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("other");
    git(
        temp_dir.path(),
        &["clone", "--quiet", remote.to_str().unwrap(), "other"],
    );
    configure_identity(&path);
    (temp_dir, path)
}

/// Settings pointing at `remote_url`, built without reading the process
/// environment.
pub fn settings(remote_url: Option<&Path>, auto_push: bool) -> Settings {
    let mut settings = Settings::default();
    settings.git.remote_url = remote_url.map(|p| p.display().to_string());
    settings.git.auto_push = auto_push;
    settings.sync.network_timeout_secs = 30;
    settings
}

pub fn synchronizer(repo_path: &Path, settings: Settings) -> Synchronizer<GitClient> {
    let client = GitClient::open(repo_path, Duration::from_secs(30)).unwrap();
    Synchronizer::new(client, Arc::new(settings))
}

pub fn write_file(repo_path: &Path, relative: &str, content: &str) -> PathBuf {
    let path = repo_path.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

pub fn head(repo_path: &Path) -> String {
    git(repo_path, &["rev-parse", "HEAD"])
}

pub fn remote_head(remote: &Path, branch: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{branch}")])
        .current_dir(remote)
        .output()
        .ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

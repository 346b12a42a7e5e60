pub mod client;
pub mod command;
pub mod github;
pub mod remote_url;
pub mod repository;

#[cfg(test)]
pub(crate) mod fake;

pub use client::GitClient;
pub use command::{CommandOutput, GitCommand};
pub use remote_url::SecretUrl;
pub use repository::GitRepository;

use crate::errors::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where HEAD currently points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeadState {
    /// On a branch with at least one commit.
    Attached(String),
    /// On a branch that has no commits yet.
    Unborn(String),
    /// Not on any branch.
    Detached(String),
}

impl HeadState {
    pub fn is_detached(&self) -> bool {
        matches!(self, HeadState::Detached(_))
    }

    pub fn branch(&self) -> Option<&str> {
        match self {
            HeadState::Attached(name) | HeadState::Unborn(name) => Some(name),
            HeadState::Detached(_) => None,
        }
    }
}

/// A commit not yet present on the remote branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub hash: String,
    pub message: String,
}

/// Where a fetch/pull/push goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteTarget {
    Named(String),
    /// Authenticated URL used for exactly one invocation.
    OneShot(SecretUrl),
}

impl RemoteTarget {
    pub fn named(name: &str) -> Self {
        RemoteTarget::Named(name.to_string())
    }

    /// Argument handed to the client. Never log this; log `Display` instead.
    pub fn as_arg(&self) -> &str {
        match self {
            RemoteTarget::Named(name) => name,
            RemoteTarget::OneShot(url) => url.expose(),
        }
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteTarget::Named(name) => f.write_str(name),
            RemoteTarget::OneShot(url) => write!(f, "{url}"),
        }
    }
}

/// How hard a push may overwrite the remote branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForceMode {
    None,
    /// Fails if the remote branch is not at `expected` (absent = must not exist).
    WithLease { expected: Option<String> },
    Force,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushCommand {
    pub target: RemoteTarget,
    pub branch: String,
    pub force: ForceMode,
}

/// Capability interface over the external version-control client.
///
/// Read queries must observe the repository as it is at call time; callers
/// rely on this to re-probe after a repair.
pub trait VersionControlClient: Send + Sync {
    fn workdir(&self) -> &Path;
    fn git_dir(&self) -> &Path;

    fn head(&self) -> Result<HeadState>;
    fn remote_url(&self, remote: &str) -> Result<Option<String>>;
    fn config_value(&self, key: &str) -> Result<Option<String>>;
    fn set_config_value(&self, key: &str, value: &str) -> Result<()>;
    fn is_dirty(&self) -> Result<bool>;
    /// Porcelain-style change lines (`M data/x.json`).
    fn status_lines(&self) -> Result<Vec<String>>;
    fn unpushed_commits(&self, remote: &str, branch: &str) -> Result<Vec<CommitSummary>>;
    fn branch_exists(&self, name: &str) -> Result<bool>;
    fn remote_branch_oid(&self, remote: &str, branch: &str) -> Result<Option<String>>;

    fn checkout(&self, name: &str) -> Result<()>;
    fn create_branch(&self, name: &str, start_point: Option<&str>) -> Result<()>;
    fn add_remote(&self, name: &str, url: &str) -> Result<()>;
    fn set_remote_url(&self, name: &str, url: &str) -> Result<()>;
    /// Stage the given paths, or everything when `None`.
    fn stage(&self, paths: Option<&[PathBuf]>) -> Result<()>;
    fn has_staged_changes(&self) -> Result<bool>;
    /// Commit the index, returning the new commit hash.
    fn commit(&self, message: &str) -> Result<String>;

    fn fetch(&self, target: &RemoteTarget) -> Result<()>;
    /// Fetch `branch` from `target` into `refs/remotes/<tracking_remote>/<branch>`.
    /// Git only maps named remotes to tracking refs, so one-shot URLs need this
    /// to keep the lease for a later force push current.
    fn fetch_branch(
        &self,
        target: &RemoteTarget,
        branch: &str,
        tracking_remote: &str,
    ) -> Result<()>;
    fn pull_rebase(&self, target: &RemoteTarget, branch: &str) -> Result<()>;
    fn abort_rebase(&self) -> Result<()>;
    fn push(&self, command: &PushCommand) -> Result<()>;
    fn reset_hard(&self, target: &str) -> Result<()>;
    /// Number of refs advertised by the remote.
    fn ls_remote(&self, target: &RemoteTarget) -> Result<usize>;
}

/// Resolve the per-worktree git directory from a workdir path.
/// Handles both normal repos (.git is a directory) and worktrees (.git is a file
/// containing `gitdir: <path>`).
pub fn resolve_git_dir(workdir: &Path) -> Result<PathBuf> {
    let git_path = workdir.join(".git");
    if git_path.is_dir() {
        Ok(git_path)
    } else if git_path.is_file() {
        let content = std::fs::read_to_string(&git_path)
            .map_err(|e| VaultError::config(format!("Failed to read .git file: {e}")))?;
        let gitdir = content
            .strip_prefix("gitdir: ")
            .map(|s| s.trim())
            .ok_or_else(|| VaultError::config("Invalid .git file format"))?;
        let resolved = if Path::new(gitdir).is_absolute() {
            PathBuf::from(gitdir)
        } else {
            workdir.join(gitdir)
        };
        Ok(resolved)
    } else {
        Err(VaultError::config(format!(
            "Not a git repository: {}",
            git_path.display()
        )))
    }
}

/// Check if a directory is a Git repository
pub fn is_git_repository(path: &Path) -> bool {
    path.join(".git").exists() || git2::Repository::discover(path).is_ok()
}

/// Find the root of the Git repository
pub fn find_repository_root(start_path: &Path) -> Result<PathBuf> {
    let repo = git2::Repository::discover(start_path)?;

    let workdir = repo
        .workdir()
        .ok_or_else(|| VaultError::config("Repository has no working directory (bare repo?)"))?;

    Ok(workdir.to_path_buf())
}

/// Locate the repository enclosing the current directory
pub fn current_repository_root() -> Result<PathBuf> {
    let current_dir = std::env::current_dir()
        .map_err(|e| VaultError::config(format!("Could not get current directory: {e}")))?;
    find_repository_root(&current_dir)
}

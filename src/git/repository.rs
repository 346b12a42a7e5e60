use crate::errors::{Result, VaultError};
use crate::git::{CommitSummary, HeadState};
use git2::{BranchType, ErrorCode, Oid, Repository, Status, StatusOptions};
use std::path::{Path, PathBuf};

/// Upper bound on commits reported as unpushed.
const MAX_UNPUSHED: usize = 100;

/// Read-only view over a git2 repository.
///
/// Opened fresh for every query so that nothing observed here can be stale.
pub struct GitRepository {
    repo: Repository,
    path: PathBuf,
}

impl GitRepository {
    /// Open a Git repository at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| VaultError::config(format!("Not a git repository: {e}")))?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| VaultError::config("Repository has no working directory"))?
            .to_path_buf();

        Ok(Self {
            repo,
            path: workdir,
        })
    }

    /// Get repository path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Where HEAD points, distinguishing unborn and detached states
    pub fn head_state(&self) -> Result<HeadState> {
        match self.repo.head() {
            Ok(head) => {
                if self.repo.head_detached()? {
                    let commit = head.peel_to_commit().map_err(|e| {
                        VaultError::branch(format!("Could not get HEAD commit: {e}"))
                    })?;
                    Ok(HeadState::Detached(commit.id().to_string()))
                } else {
                    let name = head
                        .shorthand()
                        .ok_or_else(|| VaultError::branch("Branch name is not valid UTF-8"))?;
                    Ok(HeadState::Attached(name.to_string()))
                }
            }
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                let head = self.repo.find_reference("HEAD")?;
                let target = head.symbolic_target().unwrap_or("refs/heads/master");
                let name = target.strip_prefix("refs/heads/").unwrap_or(target);
                Ok(HeadState::Unborn(name.to_string()))
            }
            Err(e) => Err(VaultError::branch(format!("Could not get HEAD: {e}"))),
        }
    }

    /// Get remote URL for a given remote name, `None` if the remote is absent
    pub fn get_remote_url(&self, name: &str) -> Result<Option<String>> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(str::to_string)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) if e.class() == git2::ErrorClass::Config => Ok(None),
            Err(e) => Err(VaultError::Git(e)),
        }
    }

    /// Effective configuration value (repository, global and system scopes)
    pub fn config_value(&self, key: &str) -> Result<Option<String>> {
        let config = self.repo.config()?;
        match config.get_string(key) {
            Ok(value) if value.trim().is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(VaultError::Git(e)),
        }
    }

    fn statuses(&self) -> Result<git2::Statuses<'_>> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        Ok(self.repo.statuses(Some(&mut opts))?)
    }

    /// Check if the working directory is dirty (has uncommitted changes)
    pub fn is_dirty(&self) -> Result<bool> {
        let statuses = self.statuses()?;

        for status in statuses.iter() {
            if status.status().intersects(
                Status::INDEX_MODIFIED
                    | Status::INDEX_NEW
                    | Status::INDEX_DELETED
                    | Status::INDEX_RENAMED
                    | Status::WT_MODIFIED
                    | Status::WT_NEW
                    | Status::WT_DELETED
                    | Status::WT_RENAMED,
            ) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Short two-column status lines, like `git status --porcelain`
    pub fn status_lines(&self) -> Result<Vec<String>> {
        let statuses = self.statuses()?;
        let mut lines = Vec::new();

        for entry in statuses.iter() {
            let flags = entry.status();
            let index = if flags.contains(Status::INDEX_NEW) {
                'A'
            } else if flags.contains(Status::INDEX_MODIFIED) {
                'M'
            } else if flags.contains(Status::INDEX_DELETED) {
                'D'
            } else if flags.contains(Status::INDEX_RENAMED) {
                'R'
            } else if flags.contains(Status::WT_NEW) {
                '?'
            } else {
                ' '
            };
            let worktree = if flags.contains(Status::WT_NEW) {
                '?'
            } else if flags.contains(Status::WT_MODIFIED) {
                'M'
            } else if flags.contains(Status::WT_DELETED) {
                'D'
            } else if flags.contains(Status::WT_RENAMED) {
                'R'
            } else {
                ' '
            };

            if let Some(path) = entry.path() {
                lines.push(format!("{index}{worktree} {path}"));
            }
        }

        Ok(lines)
    }

    /// Commits reachable from HEAD but not from `<remote>/<branch>`
    pub fn unpushed_commits(&self, remote: &str, branch: &str) -> Result<Vec<CommitSummary>> {
        let head_oid = match self.repo.head() {
            Ok(head) => match head.target() {
                Some(oid) => oid,
                None => return Ok(Vec::new()),
            },
            Err(e) if e.code() == ErrorCode::UnbornBranch => return Ok(Vec::new()),
            Err(e) => return Err(VaultError::Git(e)),
        };

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(head_oid)?;
        if let Some(remote_oid) = self.remote_branch_id(remote, branch)? {
            revwalk.hide(remote_oid)?;
        }

        let mut commits = Vec::new();
        for oid in revwalk.take(MAX_UNPUSHED) {
            let commit = self.repo.find_commit(oid?)?;
            commits.push(CommitSummary {
                hash: commit.id().to_string(),
                message: commit.summary().unwrap_or_default().to_string(),
            });
        }

        Ok(commits)
    }

    /// Check if a branch exists
    pub fn branch_exists(&self, name: &str) -> bool {
        self.repo.find_branch(name, BranchType::Local).is_ok()
    }

    /// Last known position of `<remote>/<branch>`
    pub fn remote_branch_oid(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        Ok(self
            .remote_branch_id(remote, branch)?
            .map(|oid| oid.to_string()))
    }

    fn remote_branch_id(&self, remote: &str, branch: &str) -> Result<Option<Oid>> {
        match self
            .repo
            .refname_to_id(&format!("refs/remotes/{remote}/{branch}"))
        {
            Ok(oid) => Ok(Some(oid)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(VaultError::Git(e)),
        }
    }

    /// Whether the index differs from HEAD
    pub fn has_staged_changes(&self) -> Result<bool> {
        let head_tree = match self.repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(e) if e.code() == ErrorCode::UnbornBranch => None,
            Err(e) => return Err(VaultError::Git(e)),
        };

        let index = self.repo.index()?;
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), Some(&index), None)?;

        Ok(diff.deltas().len() > 0)
    }

    /// List all local branches
    pub fn list_branches(&self) -> Result<Vec<String>> {
        let mut branch_names = Vec::new();
        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                branch_names.push(name.to_string());
            }
        }

        Ok(branch_names)
    }
}

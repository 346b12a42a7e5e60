use crate::errors::Result;
use crate::git::{
    CommitSummary, ForceMode, GitCommand, GitRepository, HeadState, PushCommand, RemoteTarget,
    VersionControlClient,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Production [`VersionControlClient`].
///
/// Queries go through git2 on a freshly opened repository; anything that
/// mutates the repository or talks to a remote runs the `git` binary.
#[derive(Debug, Clone)]
pub struct GitClient {
    workdir: PathBuf,
    git_dir: PathBuf,
    git: GitCommand,
}

impl GitClient {
    /// Open the repository containing `path`.
    pub fn open(path: &Path, network_timeout: Duration) -> Result<Self> {
        let repo = GitRepository::open(path)?;
        let workdir = repo.path().to_path_buf();
        let git_dir = repo.git_dir().to_path_buf();

        Ok(Self {
            git: GitCommand::new(&workdir, network_timeout),
            workdir,
            git_dir,
        })
    }

    /// Create a repository at `path` whose unborn HEAD points at `branch`.
    pub fn init(path: &Path, branch: &str, network_timeout: Duration) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let git = GitCommand::new(path, network_timeout);
        git.run_local(&["init", "--quiet"])?;
        git.run_local(&["symbolic-ref", "HEAD", &format!("refs/heads/{branch}")])?;
        tracing::info!("Initialized git repository at {}", path.display());

        Self::open(path, network_timeout)
    }

    /// Swap the executable used for mutations.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.git = self.git.with_program(program);
        self
    }

    fn repo(&self) -> Result<GitRepository> {
        GitRepository::open(&self.workdir)
    }

    /// Pathspecs relative to the workdir, as git expects them.
    fn path_args(&self, paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| {
                p.strip_prefix(&self.workdir)
                    .unwrap_or(p)
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}

impl VersionControlClient for GitClient {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn head(&self) -> Result<HeadState> {
        self.repo()?.head_state()
    }

    fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        self.repo()?.get_remote_url(remote)
    }

    fn config_value(&self, key: &str) -> Result<Option<String>> {
        self.repo()?.config_value(key)
    }

    fn set_config_value(&self, key: &str, value: &str) -> Result<()> {
        self.git.run_local(&["config", "--local", key, value])?;
        Ok(())
    }

    fn is_dirty(&self) -> Result<bool> {
        self.repo()?.is_dirty()
    }

    fn status_lines(&self) -> Result<Vec<String>> {
        self.repo()?.status_lines()
    }

    fn unpushed_commits(&self, remote: &str, branch: &str) -> Result<Vec<CommitSummary>> {
        self.repo()?.unpushed_commits(remote, branch)
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        Ok(self.repo()?.branch_exists(name))
    }

    fn remote_branch_oid(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        self.repo()?.remote_branch_oid(remote, branch)
    }

    fn checkout(&self, name: &str) -> Result<()> {
        self.git.run_local(&["checkout", "--quiet", name])?;
        Ok(())
    }

    fn create_branch(&self, name: &str, start_point: Option<&str>) -> Result<()> {
        let mut args = vec!["checkout", "--quiet", "-b", name];
        if let Some(start) = start_point {
            args.push("--track");
            args.push(start);
        }
        self.git.run_local(&args)?;
        Ok(())
    }

    fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        self.git.run_local(&["remote", "add", name, url])?;
        Ok(())
    }

    fn set_remote_url(&self, name: &str, url: &str) -> Result<()> {
        self.git.run_local(&["remote", "set-url", name, url])?;
        Ok(())
    }

    fn stage(&self, paths: Option<&[PathBuf]>) -> Result<()> {
        match paths {
            None => {
                self.git.run_local(&["add", "--all"])?;
            }
            Some(paths) if paths.is_empty() => {}
            Some(paths) => {
                let owned = self.path_args(paths);
                let mut args = vec!["add", "--all", "--"];
                args.extend(owned.iter().map(String::as_str));
                self.git.run_local(&args)?;
            }
        }
        Ok(())
    }

    fn has_staged_changes(&self) -> Result<bool> {
        self.repo()?.has_staged_changes()
    }

    fn commit(&self, message: &str) -> Result<String> {
        self.git.run_local(&["commit", "-m", message])?;
        let output = self.git.run_local(&["rev-parse", "HEAD"])?;
        Ok(output.stdout.trim().to_string())
    }

    fn fetch(&self, target: &RemoteTarget) -> Result<()> {
        self.git.run_network(&["fetch", "--quiet", target.as_arg()])?;
        Ok(())
    }

    fn fetch_branch(
        &self,
        target: &RemoteTarget,
        branch: &str,
        tracking_remote: &str,
    ) -> Result<()> {
        let refspec = format!("+refs/heads/{branch}:refs/remotes/{tracking_remote}/{branch}");
        self.git
            .run_network(&["fetch", "--quiet", target.as_arg(), &refspec])?;
        Ok(())
    }

    fn pull_rebase(&self, target: &RemoteTarget, branch: &str) -> Result<()> {
        self.git
            .run_network(&[
                "pull",
                "--rebase",
                "--autostash",
                "--quiet",
                target.as_arg(),
                branch,
            ])?;
        Ok(())
    }

    fn abort_rebase(&self) -> Result<()> {
        self.git.run_local(&["rebase", "--abort"])?;
        Ok(())
    }

    fn push(&self, command: &PushCommand) -> Result<()> {
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", command.branch);
        let mut args: Vec<String> = vec!["push".to_string()];

        if matches!(command.target, RemoteTarget::Named(_)) {
            args.push("--set-upstream".to_string());
        }

        match &command.force {
            ForceMode::None => {}
            ForceMode::WithLease { expected } => args.push(format!(
                "--force-with-lease=refs/heads/{}:{}",
                command.branch,
                expected.as_deref().unwrap_or_default()
            )),
            ForceMode::Force => args.push("--force".to_string()),
        }

        args.push(command.target.as_arg().to_string());
        args.push(refspec);

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.git.run_network(&args)?;
        Ok(())
    }

    fn reset_hard(&self, target: &str) -> Result<()> {
        self.git.run_local(&["reset", "--hard", "--quiet", target])?;
        Ok(())
    }

    fn ls_remote(&self, target: &RemoteTarget) -> Result<usize> {
        let output = self.git.run_network(&["ls-remote", target.as_arg()])?;
        Ok(output.stdout.lines().filter(|l| !l.trim().is_empty()).count())
    }
}

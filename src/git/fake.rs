//! Scripted in-memory client for exercising the sync engine.

use crate::errors::{Result, VaultError};
use crate::git::{
    CommitSummary, ForceMode, HeadState, PushCommand, RemoteTarget, VersionControlClient,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    SetConfig,
    Checkout,
    CreateBranch,
    AddRemote,
    SetRemoteUrl,
    Stage,
    Commit,
    Fetch,
    PullRebase,
    Push,
    ResetHard,
    LsRemote,
}

/// One recorded mutation. Targets are recorded as handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    SetConfig(String, String),
    Checkout(String),
    CreateBranch(String, Option<String>),
    AddRemote(String, String),
    SetRemoteUrl(String, String),
    Stage(Option<Vec<PathBuf>>),
    Commit(String),
    Fetch(String),
    FetchBranch(String, String),
    PullRebase(String, String),
    AbortRebase,
    Push {
        target: String,
        branch: String,
        force: ForceMode,
    },
    ResetHard(String),
    LsRemote(String),
}

#[derive(Debug, Clone)]
pub(crate) struct FakeState {
    pub head: HeadState,
    pub branches: BTreeSet<String>,
    /// Tracking refs, keyed by `<remote>/<branch>`.
    pub remote_branches: BTreeMap<String, String>,
    /// What the remote really holds; fetches copy it into `remote_branches`.
    pub upstream: BTreeMap<String, String>,
    pub remotes: BTreeMap<String, String>,
    pub config: BTreeMap<String, String>,
    pub dirty: bool,
    pub staged: bool,
    pub unpushed: Vec<CommitSummary>,
    pub commits: usize,
}

type Hook = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct FakeClient {
    workdir: PathBuf,
    git_dir: PathBuf,
    state: Mutex<FakeState>,
    failures: Mutex<HashMap<Op, VecDeque<VaultError>>>,
    calls: Mutex<Vec<Call>>,
    on_stage: Mutex<Option<Hook>>,
}

impl FakeClient {
    /// A healthy repository on `main` with an `origin` remote and an identity.
    pub fn new(workdir: &Path) -> Self {
        let git_dir = workdir.join(".git");
        std::fs::create_dir_all(&git_dir).unwrap();

        let mut config = BTreeMap::new();
        config.insert("user.name".to_string(), "Test".to_string());
        config.insert("user.email".to_string(), "test@test.com".to_string());

        let mut remotes = BTreeMap::new();
        remotes.insert(
            "origin".to_string(),
            "https://example.test/repo.git".to_string(),
        );

        Self {
            workdir: workdir.to_path_buf(),
            git_dir,
            state: Mutex::new(FakeState {
                head: HeadState::Attached("main".to_string()),
                branches: BTreeSet::from(["main".to_string()]),
                remote_branches: BTreeMap::new(),
                upstream: BTreeMap::new(),
                remotes,
                config,
                dirty: false,
                staged: false,
                unpushed: Vec::new(),
                commits: 0,
            }),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            on_stage: Mutex::new(None),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Simulate an edit in the working tree.
    pub fn touch(&self) {
        self.state().dirty = true;
    }

    /// Make the next invocation of `op` fail with the given git output.
    pub fn fail_next(&self, op: Op, stderr: &str) {
        self.fail_with(
            op,
            VaultError::Command {
                command: format!("{op:?}").to_lowercase(),
                stderr: stderr.to_string(),
                code: Some(1),
            },
        );
    }

    pub fn fail_with(&self, op: Op, error: VaultError) {
        self.failures
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Run `hook` inside every `stage` call, before staging.
    pub fn on_stage(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_stage.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pushes(&self) -> Vec<(String, ForceMode)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Push { target, force, .. } => Some((target, force)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call, op: Op) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().get_mut(&op) {
            Some(queue) => match queue.pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    fn command_error(op: &str, stderr: impl Into<String>) -> VaultError {
        VaultError::Command {
            command: op.to_string(),
            stderr: stderr.into(),
            code: Some(128),
        }
    }

    fn refresh_tracking(&self, key: &str) {
        let mut state = self.state();
        if let Some(tip) = state.upstream.get(key).cloned() {
            state.remote_branches.insert(key.to_string(), tip);
        }
    }

    fn check_named_remote(&self, target: &RemoteTarget) -> Result<String> {
        match target {
            RemoteTarget::Named(name) => {
                if self.state().remotes.contains_key(name) {
                    Ok(name.clone())
                } else {
                    Err(Self::command_error(
                        "push",
                        format!("fatal: '{name}' does not appear to be a git repository"),
                    ))
                }
            }
            // One-shot URLs update the remote named `origin` in this fake.
            RemoteTarget::OneShot(_) => Ok("origin".to_string()),
        }
    }
}

impl VersionControlClient for FakeClient {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn head(&self) -> Result<HeadState> {
        Ok(self.state().head.clone())
    }

    fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        Ok(self.state().remotes.get(remote).cloned())
    }

    fn config_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state().config.get(key).cloned())
    }

    fn set_config_value(&self, key: &str, value: &str) -> Result<()> {
        self.record(Call::SetConfig(key.into(), value.into()), Op::SetConfig)?;
        self.state().config.insert(key.into(), value.into());
        Ok(())
    }

    fn is_dirty(&self) -> Result<bool> {
        let state = self.state();
        Ok(state.dirty || state.staged)
    }

    fn status_lines(&self) -> Result<Vec<String>> {
        let state = self.state();
        let mut lines = Vec::new();
        if state.staged {
            lines.push("A  data/staged.json".to_string());
        }
        if state.dirty {
            lines.push("?? data/record.json".to_string());
        }
        Ok(lines)
    }

    fn unpushed_commits(&self, _remote: &str, _branch: &str) -> Result<Vec<CommitSummary>> {
        Ok(self.state().unpushed.clone())
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state().branches.contains(name))
    }

    fn remote_branch_oid(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        Ok(self
            .state()
            .remote_branches
            .get(&format!("{remote}/{branch}"))
            .cloned())
    }

    fn checkout(&self, name: &str) -> Result<()> {
        self.record(Call::Checkout(name.into()), Op::Checkout)?;
        let mut state = self.state();
        if !state.branches.contains(name) {
            return Err(Self::command_error(
                "checkout",
                format!("error: pathspec '{name}' did not match any file(s) known to git"),
            ));
        }
        state.head = HeadState::Attached(name.into());
        Ok(())
    }

    fn create_branch(&self, name: &str, start_point: Option<&str>) -> Result<()> {
        self.record(
            Call::CreateBranch(name.into(), start_point.map(str::to_string)),
            Op::CreateBranch,
        )?;
        let mut state = self.state();
        if state.branches.contains(name) {
            return Err(Self::command_error(
                "checkout",
                format!("fatal: a branch named '{name}' already exists"),
            ));
        }
        if let Some(start) = start_point {
            if !state.remote_branches.contains_key(start) {
                return Err(Self::command_error(
                    "checkout",
                    format!("fatal: '{start}' is not a commit"),
                ));
            }
        }
        state.branches.insert(name.into());
        state.head = HeadState::Attached(name.into());
        Ok(())
    }

    fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        self.record(Call::AddRemote(name.into(), url.into()), Op::AddRemote)?;
        let mut state = self.state();
        if state.remotes.contains_key(name) {
            return Err(Self::command_error(
                "remote add",
                format!("error: remote {name} already exists."),
            ));
        }
        state.remotes.insert(name.into(), url.into());
        Ok(())
    }

    fn set_remote_url(&self, name: &str, url: &str) -> Result<()> {
        self.record(Call::SetRemoteUrl(name.into(), url.into()), Op::SetRemoteUrl)?;
        let mut state = self.state();
        match state.remotes.get_mut(name) {
            Some(current) => {
                *current = url.into();
                Ok(())
            }
            None => Err(Self::command_error(
                "remote set-url",
                format!("error: No such remote '{name}'"),
            )),
        }
    }

    fn stage(&self, paths: Option<&[PathBuf]>) -> Result<()> {
        let hook = self.on_stage.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook();
        }

        self.record(Call::Stage(paths.map(<[PathBuf]>::to_vec)), Op::Stage)?;
        let mut state = self.state();
        if state.dirty {
            state.dirty = false;
            state.staged = true;
        }
        Ok(())
    }

    fn has_staged_changes(&self) -> Result<bool> {
        Ok(self.state().staged)
    }

    fn commit(&self, message: &str) -> Result<String> {
        self.record(Call::Commit(message.into()), Op::Commit)?;
        let mut state = self.state();

        if !state.config.contains_key("user.email") {
            return Err(Self::command_error(
                "commit",
                "Author identity unknown\n\n*** Please tell me who you are.",
            ));
        }
        if !state.staged {
            return Err(Self::command_error(
                "commit",
                "nothing to commit, working tree clean",
            ));
        }

        state.commits += 1;
        let hash = format!("{:040x}", state.commits);
        state.staged = false;
        state.unpushed.push(CommitSummary {
            hash: hash.clone(),
            message: message.into(),
        });
        if let HeadState::Unborn(branch) = state.head.clone() {
            state.branches.insert(branch.clone());
            state.head = HeadState::Attached(branch);
        }
        Ok(hash)
    }

    fn fetch(&self, target: &RemoteTarget) -> Result<()> {
        self.record(Call::Fetch(target.as_arg().into()), Op::Fetch)?;
        self.check_named_remote(target).map(|_| ())
    }

    fn fetch_branch(
        &self,
        target: &RemoteTarget,
        branch: &str,
        tracking_remote: &str,
    ) -> Result<()> {
        self.record(
            Call::FetchBranch(target.as_arg().into(), branch.into()),
            Op::Fetch,
        )?;
        self.check_named_remote(target)?;
        self.refresh_tracking(&format!("{tracking_remote}/{branch}"));
        Ok(())
    }

    fn pull_rebase(&self, target: &RemoteTarget, branch: &str) -> Result<()> {
        self.record(
            Call::PullRebase(target.as_arg().into(), branch.into()),
            Op::PullRebase,
        )?;
        self.check_named_remote(target)?;
        // Like git, only a named remote updates its tracking ref on pull.
        if let RemoteTarget::Named(remote) = target {
            self.refresh_tracking(&format!("{remote}/{branch}"));
        }
        Ok(())
    }

    fn abort_rebase(&self) -> Result<()> {
        self.calls.lock().unwrap().push(Call::AbortRebase);
        Ok(())
    }

    fn push(&self, command: &PushCommand) -> Result<()> {
        self.record(
            Call::Push {
                target: command.target.as_arg().into(),
                branch: command.branch.clone(),
                force: command.force.clone(),
            },
            Op::Push,
        )?;
        let remote = self.check_named_remote(&command.target)?;

        let mut state = self.state();
        let tip = state
            .unpushed
            .last()
            .map(|c| c.hash.clone())
            .unwrap_or_else(|| format!("{:040x}", state.commits));
        let key = format!("{remote}/{}", command.branch);
        state.upstream.insert(key.clone(), tip.clone());
        state.remote_branches.insert(key, tip);
        state.unpushed.clear();
        Ok(())
    }

    fn reset_hard(&self, target: &str) -> Result<()> {
        self.record(Call::ResetHard(target.into()), Op::ResetHard)?;
        let mut state = self.state();
        state.unpushed.clear();
        state.dirty = false;
        state.staged = false;
        Ok(())
    }

    fn ls_remote(&self, target: &RemoteTarget) -> Result<usize> {
        self.record(Call::LsRemote(target.as_arg().into()), Op::LsRemote)?;
        self.check_named_remote(target)?;
        Ok(self.state().remote_branches.len())
    }
}

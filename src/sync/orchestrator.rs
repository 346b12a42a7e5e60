use crate::config::Settings;
use crate::errors::{ErrorKind, Remediation, Result, VaultError};
use crate::git::{RemoteTarget, VersionControlClient};
use crate::sync::classify::classify_error;
use crate::sync::commit::{commit_changes, CommitResult};
use crate::sync::credentials::{apply_credentials, AppliedCredentials, CredentialScope};
use crate::sync::identity::ensure_identity;
use crate::sync::lock::{LockInfo, OperationLock};
use crate::sync::push::{push_changes, PushOutcome};
use crate::sync::repair::{repair_detached_head, repair_remote, RepairResult};
use crate::sync::state::{probe, Repair, RepositoryState};
use crate::sync::{SyncMode, SyncOutcome, SyncPhase, SyncRequest, SyncStatus};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How to settle a rejected push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConflictStrategy {
    /// Publish local history, overwriting the remote if necessary
    KeepLocal,
    /// Discard local history and match the remote branch
    KeepRemote,
}

/// Read-only view for status and diagnostics surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub repository: RepositoryState,
    /// Porcelain-style change lines
    pub changes: Vec<String>,
    /// Current lock marker, if a synchronization holds it
    pub lock: Option<LockInfo>,
    pub token_configured: bool,
    pub remote_name: String,
    pub auto_push: bool,
    pub environment: String,
    pub git_enabled: bool,
}

/// Sequences lock, probe, repairs, commit and push for one save request.
pub struct Synchronizer<C> {
    client: C,
    settings: Arc<Settings>,
}

/// Tracks and logs orchestrator state transitions.
struct Machine {
    phase: SyncPhase,
}

impl Machine {
    fn new() -> Self {
        Self {
            phase: SyncPhase::Idle,
        }
    }

    fn enter(&mut self, next: SyncPhase) {
        debug!("sync: {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    fn fail(&mut self, phase: SyncPhase, kind: ErrorKind, detail: impl Into<String>) -> SyncOutcome {
        self.enter(phase);
        SyncOutcome::failed(phase, kind, detail)
    }

    fn local_failure(&mut self, error: &VaultError) -> SyncOutcome {
        match error {
            VaultError::ClientMissing(_) => self.fail(
                SyncPhase::FailedFatal,
                ErrorKind::UnknownPushError,
                format!("{error}. Synchronization cannot run without git."),
            ),
            other => self.fail(
                SyncPhase::FailedRecoverable,
                ErrorKind::for_local_error(other),
                other.to_string(),
            ),
        }
    }

    fn succeed(&mut self, status: SyncStatus, detail: impl Into<String>) -> SyncOutcome {
        self.enter(SyncPhase::Succeeded);
        SyncOutcome::succeeded(status, detail)
    }
}

impl<C: VersionControlClient> Synchronizer<C> {
    pub fn new(client: C, settings: Arc<Settings>) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Fresh repository snapshot.
    pub fn probe(&self) -> RepositoryState {
        probe(&self.client, &self.settings.git.remote_name)
    }

    fn acquire_lock(&self) -> Result<OperationLock> {
        OperationLock::acquire(self.client.git_dir(), self.settings.sync.lock_stale_after())
    }

    /// Persist local changes and, when enabled, publish them.
    ///
    /// Never panics and never returns an error: every failure is reported
    /// through the outcome. The lock is released on every path.
    pub fn synchronize(&self, request: &SyncRequest) -> SyncOutcome {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run(request))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown fault".to_string());
                error!("Synchronization aborted: {}", reason);
                SyncOutcome::failed(
                    SyncPhase::FailedFatal,
                    ErrorKind::UnknownPushError,
                    format!("Synchronization aborted unexpectedly: {reason}"),
                )
            }
        }
    }

    fn run(&self, request: &SyncRequest) -> SyncOutcome {
        let mut machine = Machine::new();

        let mut lock = match self.acquire_lock() {
            Ok(lock) => lock,
            Err(e) => {
                info!("Skipping synchronization: {}", e);
                return machine.local_failure(&e);
            }
        };
        machine.enter(SyncPhase::Locked);

        let outcome = self.run_locked(&mut machine, request);

        if let Err(e) = lock.release() {
            warn!("Could not release sync lock: {}", e);
        }
        machine.enter(SyncPhase::Idle);
        outcome
    }

    fn run_locked(&self, machine: &mut Machine, request: &SyncRequest) -> SyncOutcome {
        let git = &self.settings.git;
        let push_planned = git.auto_push || request.mode == SyncMode::Forced;

        machine.enter(SyncPhase::Probing);
        let state = self.probe();

        let repairs = state.repairs_needed(git, push_planned);
        if !repairs.is_empty() {
            machine.enter(SyncPhase::Repairing);
            for repair in repairs {
                match self.apply_repair(repair) {
                    Ok(result) => debug!("repair {}: {}", repair, result.describe()),
                    Err(e) if request.mode == SyncMode::Forced => {
                        warn!("{} repair failed, continuing: {}", repair, e);
                    }
                    Err(e) => return machine.local_failure(&e),
                }
            }
        }

        machine.enter(SyncPhase::Committing);
        let commit = match commit_changes(&self.client, request) {
            Ok(CommitResult::Committed { hash }) => Some(hash),
            Ok(CommitResult::NoChanges) => None,
            Err(e) => return machine.local_failure(&e),
        };

        if !push_planned {
            return match commit {
                Some(hash) => {
                    let mut outcome = machine.succeed(
                        SyncStatus::Committed,
                        format!("Committed '{}'", request.message),
                    );
                    outcome.commit = Some(hash);
                    outcome
                }
                None => machine.succeed(SyncStatus::NoChanges, "No changes to save"),
            };
        }

        // Re-probe: repairs and the commit may have changed branch and history.
        let state = self.probe();

        if commit.is_none() {
            let stranded =
                request.mode == SyncMode::Forced && !state.unpushed_commits.is_empty();
            if !stranded {
                return machine.succeed(SyncStatus::NoChanges, "No changes to save");
            }
            info!(
                "Publishing {} previously committed change(s)",
                state.unpushed_commits.len()
            );
        }

        machine.enter(SyncPhase::Pushing);
        let precondition = match (&state.current_branch, state.has_remote) {
            (None, _) => Err((
                ErrorKind::BranchRepairFailed,
                "HEAD is not on a branch; nothing can be pushed".to_string(),
            )),
            (Some(_), false) => Err((
                ErrorKind::RemoteConfigurationError,
                format!("Remote '{}' is not configured", git.remote_name),
            )),
            (Some(branch), true) => Ok(branch.clone()),
        };
        let branch = match precondition {
            Ok(branch) => branch,
            Err((kind, detail)) => {
                let mut outcome = machine.fail(SyncPhase::FailedRecoverable, kind, detail);
                outcome.commit = commit;
                return outcome;
            }
        };

        let result = push_changes(
            &self.client,
            git,
            &self.settings.auth,
            &branch,
            request.mode,
        );

        let mut outcome = match &result.outcome {
            PushOutcome::Pushed(stage) => machine.succeed(
                SyncStatus::Pushed,
                format!("Pushed {branch} to {} ({stage})", git.remote_name),
            ),
            PushOutcome::Failed { kind, detail } => machine.fail(
                SyncPhase::FailedRecoverable,
                *kind,
                format!("Push failed: {detail}"),
            ),
        };
        outcome.commit = commit;
        outcome.push_attempts = result.attempts;
        outcome
    }

    fn apply_repair(&self, repair: Repair) -> Result<RepairResult> {
        let git = &self.settings.git;
        match repair {
            Repair::Branch => repair_detached_head(&self.client, git),
            Repair::Remote => repair_remote(&self.client, git),
            Repair::Identity => ensure_identity(&self.client, git),
        }
    }

    /// Read-only status. Never repairs anything.
    pub fn status(&self) -> StatusReport {
        let store = &self.settings.store;
        StatusReport {
            repository: self.probe(),
            changes: self.client.status_lines().unwrap_or_default(),
            lock: OperationLock::inspect(self.client.git_dir()),
            token_configured: self.settings.auth.has_token(),
            remote_name: self.settings.git.remote_name.clone(),
            auto_push: self.settings.git.auto_push,
            environment: store.environment.clone(),
            git_enabled: store.git_enabled(),
        }
    }

    /// Run the targeted fix for a failed outcome, without pushing.
    pub fn remediate(&self, remediation: Remediation) -> Result<RepairResult> {
        let _lock = self.acquire_lock()?;
        let git = &self.settings.git;

        match remediation {
            Remediation::RetryLater => Ok(RepairResult::AlreadyHealthy),
            Remediation::FixIdentity => ensure_identity(&self.client, git),
            Remediation::RepairBranch => repair_detached_head(&self.client, git),
            Remediation::RepairRemote => repair_remote(&self.client, git),
            Remediation::ProvisionCredentials => {
                match apply_credentials(
                    &self.client,
                    git,
                    &self.settings.auth,
                    CredentialScope::PersistentStore,
                )? {
                    AppliedCredentials::Stored(path) => Ok(RepairResult::Repaired(format!(
                        "Stored credentials in {}",
                        path.display()
                    ))),
                    AppliedCredentials::OneShot(_) => Ok(RepairResult::AlreadyHealthy),
                }
            }
            Remediation::ResolveConflict => Err(VaultError::validation(
                "Choose a conflict strategy: keep-local or keep-remote",
            )),
            Remediation::InspectManually => Err(VaultError::validation(
                "No automatic fix is available; run `roster doctor`",
            )),
        }
    }

    /// Settle a rejected push.
    pub fn resolve_conflict(&self, strategy: ConflictStrategy) -> SyncOutcome {
        match strategy {
            ConflictStrategy::KeepLocal => self.synchronize(&SyncRequest::forced(
                "Resolve conflict keeping local changes",
            )),
            ConflictStrategy::KeepRemote => {
                match panic::catch_unwind(AssertUnwindSafe(|| self.keep_remote())) {
                    Ok(outcome) => outcome,
                    Err(_) => SyncOutcome::failed(
                        SyncPhase::FailedFatal,
                        ErrorKind::UnknownPushError,
                        "Conflict resolution aborted unexpectedly",
                    ),
                }
            }
        }
    }

    fn keep_remote(&self) -> SyncOutcome {
        let mut machine = Machine::new();
        let _lock = match self.acquire_lock() {
            Ok(lock) => lock,
            Err(e) => return machine.local_failure(&e),
        };
        machine.enter(SyncPhase::Locked);

        machine.enter(SyncPhase::Probing);
        let state = self.probe();
        let Some(branch) = state.current_branch else {
            return machine.fail(
                SyncPhase::FailedRecoverable,
                ErrorKind::BranchRepairFailed,
                "HEAD is not on a branch; run `roster fix branch` first",
            );
        };

        let remote = &self.settings.git.remote_name;
        if let Err(e) = self.client.fetch(&RemoteTarget::named(remote)) {
            return machine.fail(
                SyncPhase::FailedRecoverable,
                classify_error(&e),
                format!("Fetch failed: {}", e.failure_text()),
            );
        }

        let upstream = format!("{remote}/{branch}");
        if self
            .client
            .remote_branch_oid(remote, &branch)
            .ok()
            .flatten()
            .is_none()
        {
            return machine.fail(
                SyncPhase::FailedRecoverable,
                ErrorKind::RemoteError,
                format!("Remote branch {upstream} does not exist"),
            );
        }

        warn!("Discarding local history on {} in favour of {}", branch, upstream);
        if let Err(e) = self.client.reset_hard(&upstream) {
            return machine.local_failure(&e);
        }

        machine.succeed(SyncStatus::NoChanges, format!("Reset {branch} to {upstream}"))
    }
}

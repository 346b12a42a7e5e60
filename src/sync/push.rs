//! Push escalation ladder.
//!
//! Stages run strictly in order: fast-forward, integrate-then-push,
//! force-with-lease, force. A stage only runs after the previous one was
//! rejected by the remote. Auto mode stops after the fast path; only forced
//! mode climbs further. An authentication failure applies one-shot
//! credentials once and retries the same stage once.

use crate::config::{Credentials, GitSettings};
use crate::errors::ErrorKind;
use crate::git::{ForceMode, PushCommand, RemoteTarget, VersionControlClient};
use crate::sync::classify::classify_error;
use crate::sync::credentials::{apply_credentials, AppliedCredentials, CredentialScope};
use crate::sync::SyncMode;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PushStage {
    FastForward,
    IntegrateThenPush,
    ForceWithLease,
    Force,
}

impl PushStage {
    pub const LADDER: [PushStage; 4] = [
        PushStage::FastForward,
        PushStage::IntegrateThenPush,
        PushStage::ForceWithLease,
        PushStage::Force,
    ];

    /// Whether `mode` allows this stage to run.
    pub fn permitted(self, mode: SyncMode) -> bool {
        match self {
            PushStage::FastForward => true,
            PushStage::IntegrateThenPush | PushStage::ForceWithLease | PushStage::Force => {
                mode == SyncMode::Forced
            }
        }
    }
}

impl fmt::Display for PushStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PushStage::FastForward => "fast-forward push",
            PushStage::IntegrateThenPush => "rebase then push",
            PushStage::ForceWithLease => "force push with lease",
            PushStage::Force => "force push",
        };
        f.write_str(name)
    }
}

/// One executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushAttempt {
    pub stage: PushStage,
    /// Whether the attempt used one-shot token credentials
    pub authenticated: bool,
    /// `None` when the attempt succeeded
    pub failure: Option<ErrorKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PushOutcome {
    Pushed(PushStage),
    Failed { kind: ErrorKind, detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushResult {
    pub attempts: Vec<PushAttempt>,
    pub outcome: PushOutcome,
}

impl PushResult {
    pub fn stages(&self) -> Vec<PushStage> {
        self.attempts.iter().map(|a| a.stage).collect()
    }
}

struct StageFailure {
    kind: ErrorKind,
    detail: String,
}

/// Publish `branch` to the configured remote.
pub fn push_changes<C>(
    client: &C,
    git: &GitSettings,
    auth: &Credentials,
    branch: &str,
    mode: SyncMode,
) -> PushResult
where
    C: VersionControlClient + ?Sized,
{
    let mut ladder = Ladder {
        client,
        git,
        branch,
        target: RemoteTarget::named(&git.remote_name),
        authenticated: false,
        attempts: Vec::new(),
    };

    let mut last: Option<StageFailure> = None;

    for stage in PushStage::LADDER {
        if !stage.permitted(mode) {
            debug!("{} not permitted in {:?} mode", stage, mode);
            break;
        }
        if let Some(failure) = &last {
            if failure.kind != ErrorKind::RejectedPush {
                break;
            }
        }

        let mut result = ladder.run(stage);

        if let Err(failure) = &result {
            if failure.kind == ErrorKind::AuthError && !ladder.authenticated {
                match apply_credentials(client, git, auth, CredentialScope::OneShotUrl) {
                    Ok(AppliedCredentials::OneShot(target)) => {
                        ladder.target = target;
                        ladder.authenticated = true;
                        info!("Retrying {} with token credentials", stage);
                        result = ladder.run(stage);
                    }
                    Ok(AppliedCredentials::Stored(_)) => {}
                    Err(e) => {
                        return ladder.finish(PushOutcome::Failed {
                            kind: ErrorKind::CredentialError,
                            detail: format!("{} was refused and {}", stage, e),
                        });
                    }
                }
            }
        }

        match result {
            Ok(()) => {
                info!("Pushed {} via {}", branch, stage);
                return ladder.finish(PushOutcome::Pushed(stage));
            }
            Err(failure) => last = Some(failure),
        }
    }

    let failure = last.unwrap_or(StageFailure {
        kind: ErrorKind::UnknownPushError,
        detail: "No push stage was permitted".to_string(),
    });
    ladder.finish(PushOutcome::Failed {
        kind: failure.kind,
        detail: failure.detail,
    })
}

struct Ladder<'a, C: ?Sized> {
    client: &'a C,
    git: &'a GitSettings,
    branch: &'a str,
    target: RemoteTarget,
    authenticated: bool,
    attempts: Vec<PushAttempt>,
}

impl<C> Ladder<'_, C>
where
    C: VersionControlClient + ?Sized,
{
    fn run(&mut self, stage: PushStage) -> std::result::Result<(), StageFailure> {
        debug!("push: {} to {}", stage, self.target);
        let result = self.execute(stage);

        self.attempts.push(PushAttempt {
            stage,
            authenticated: self.authenticated,
            failure: result.as_ref().err().map(|f| f.kind),
        });
        if let Err(failure) = &result {
            debug!("push: {} failed ({}): {}", stage, failure.kind, failure.detail);
        }
        result
    }

    fn execute(&self, stage: PushStage) -> std::result::Result<(), StageFailure> {
        let force = match stage {
            PushStage::FastForward => ForceMode::None,
            PushStage::IntegrateThenPush => {
                self.integrate()?;
                ForceMode::None
            }
            PushStage::ForceWithLease => ForceMode::WithLease {
                expected: self
                    .client
                    .remote_branch_oid(&self.git.remote_name, self.branch)
                    .ok()
                    .flatten(),
            },
            PushStage::Force => {
                warn!(
                    "Force-pushing {} to {}; remote history will be overwritten",
                    self.branch, self.target
                );
                ForceMode::Force
            }
        };

        self.client
            .push(&PushCommand {
                target: self.target.clone(),
                branch: self.branch.to_string(),
                force,
            })
            .map_err(|e| StageFailure {
                kind: classify_error(&e),
                detail: e.failure_text(),
            })
    }

    /// Rebase local commits onto the remote branch. A rebase that cannot
    /// complete is aborted and reported as a rejection so that forced mode
    /// may escalate past it.
    fn integrate(&self) -> std::result::Result<(), StageFailure> {
        if let RemoteTarget::OneShot(_) = &self.target {
            self.client
                .fetch_branch(&self.target, self.branch, &self.git.remote_name)
                .map_err(|e| StageFailure {
                    kind: classify_error(&e),
                    detail: format!("Could not fetch the remote branch: {}", e.failure_text()),
                })?;
        }

        if let Err(e) = self.client.pull_rebase(&self.target, self.branch) {
            if let Err(abort) = self.client.abort_rebase() {
                debug!("rebase --abort: {}", abort);
            }

            let kind = match classify_error(&e) {
                kind @ (ErrorKind::AuthError | ErrorKind::RemoteError) => kind,
                _ => ErrorKind::RejectedPush,
            };
            return Err(StageFailure {
                kind,
                detail: format!("Could not rebase onto the remote branch: {}", e.failure_text()),
            });
        }
        Ok(())
    }

    fn finish(self, outcome: PushOutcome) -> PushResult {
        PushResult {
            attempts: self.attempts,
            outcome,
        }
    }
}

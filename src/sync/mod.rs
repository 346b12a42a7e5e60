//! Synchronization engine
//!
//! Reconciles local record changes with the remote repository:
//! - Operation lock (one synchronization per repository at a time)
//! - Repository probe and targeted repairs (branch, remote, identity)
//! - Commit pipeline and the push escalation ladder
//! - Failure classification into typed outcomes

pub mod classify;
pub mod commit;
pub mod credentials;
pub mod identity;
pub mod lock;
pub mod orchestrator;
pub mod push;
pub mod repair;
pub mod state;

pub use classify::{classify, classify_error};
pub use commit::CommitResult;
pub use credentials::{AppliedCredentials, CredentialScope};
pub use lock::{LockInfo, OperationLock};
pub use orchestrator::{ConflictStrategy, StatusReport, Synchronizer};
pub use push::{PushAttempt, PushOutcome, PushResult, PushStage};
pub use repair::RepairResult;
pub use state::{probe, Repair, RepositoryState};

use crate::errors::{ErrorKind, Remediation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How far the engine may go to publish a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Routine save: repairs must succeed, pushes never overwrite the remote
    Auto,
    /// Explicit operator request: best-effort repairs, force-push allowed
    Forced,
}

/// A request to persist local changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub message: String,
    /// Paths to stage; `None` stages every change
    pub files: Option<Vec<PathBuf>>,
    pub mode: SyncMode,
}

impl SyncRequest {
    pub fn auto(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            files: None,
            mode: SyncMode::Auto,
        }
    }

    pub fn forced(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            files: None,
            mode: SyncMode::Forced,
        }
    }

    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = Some(files);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    NoChanges,
    Committed,
    Pushed,
    Failed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStatus::NoChanges => "no_changes",
            SyncStatus::Committed => "committed",
            SyncStatus::Pushed => "pushed",
            SyncStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncPhase {
    Idle,
    Locked,
    Probing,
    Repairing,
    Committing,
    Pushing,
    Succeeded,
    FailedRecoverable,
    FailedFatal,
}

/// Result of one synchronization. Exactly one terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    /// Plain-language description
    pub detail: String,
    pub error_kind: Option<ErrorKind>,
    /// Terminal orchestrator state
    pub phase: SyncPhase,
    /// Commit created by this run, if any
    pub commit: Option<String>,
    pub push_attempts: Vec<PushAttempt>,
}

impl SyncOutcome {
    pub(crate) fn succeeded(status: SyncStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            error_kind: None,
            phase: SyncPhase::Succeeded,
            commit: None,
            push_attempts: Vec::new(),
        }
    }

    pub(crate) fn failed(phase: SyncPhase, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Failed,
            detail: detail.into(),
            error_kind: Some(kind),
            phase,
            commit: None,
            push_attempts: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status != SyncStatus::Failed
    }

    /// Corrective action to offer for a failed outcome.
    pub fn remediation(&self) -> Option<Remediation> {
        self.error_kind.map(ErrorKind::remediation)
    }
}

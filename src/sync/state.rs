use crate::config::GitSettings;
use crate::git::remote_url::{has_inline_credentials, redact, same_location};
use crate::git::{CommitSummary, HeadState, VersionControlClient};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Snapshot of the repository taken by [`probe`].
///
/// Never cached: anything that may have changed the repository is followed
/// by a fresh probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryState {
    pub head_detached: bool,
    pub current_branch: Option<String>,
    pub has_remote: bool,
    /// Configured remote URL, redacted
    pub remote_url: Option<String>,
    pub remote_has_inline_credentials: bool,
    pub identity_configured: bool,
    pub working_tree_dirty: bool,
    pub unpushed_commits: Vec<CommitSummary>,
}

/// A corrective action the probe found necessary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Repair {
    Identity,
    Branch,
    Remote,
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repair::Identity => f.write_str("identity"),
            Repair::Branch => f.write_str("branch"),
            Repair::Remote => f.write_str("remote"),
        }
    }
}

impl RepositoryState {
    /// Repairs to run before committing, in execution order.
    ///
    /// A missing remote only needs repair when something will be pushed or a
    /// repository URL is configured; purely local vaults are left alone.
    pub fn repairs_needed(&self, git: &GitSettings, push_planned: bool) -> Vec<Repair> {
        let mut repairs = Vec::new();

        if self.head_detached {
            repairs.push(Repair::Branch);
        }

        let remote_mismatch = match (&self.remote_url, &git.remote_url) {
            (Some(current), Some(desired)) => !same_location(current, desired),
            _ => false,
        };
        let remote_missing = !self.has_remote && (push_planned || git.remote_url.is_some());
        if remote_missing || remote_mismatch || self.remote_has_inline_credentials {
            repairs.push(Repair::Remote);
        }

        if !self.identity_configured {
            repairs.push(Repair::Identity);
        }

        repairs
    }
}

/// Inspect the repository. Never fails: any check that cannot complete
/// reports its conservative default.
pub fn probe<C>(client: &C, remote: &str) -> RepositoryState
where
    C: VersionControlClient + ?Sized,
{
    let head = client.head().unwrap_or_else(|e| {
        debug!("probe: HEAD unreadable: {}", e);
        HeadState::Detached(String::new())
    });

    let raw_remote = client.remote_url(remote).unwrap_or_else(|e| {
        debug!("probe: remote '{}' unreadable: {}", remote, e);
        None
    });

    let identity_configured = ["user.name", "user.email"].iter().all(|key| {
        client
            .config_value(key)
            .map(|v| v.is_some())
            .unwrap_or(false)
    });

    let working_tree_dirty = client.is_dirty().unwrap_or_else(|e| {
        debug!("probe: status unavailable: {}", e);
        false
    });

    let current_branch = head.branch().map(str::to_string);
    let unpushed_commits = match (&current_branch, &raw_remote) {
        (Some(branch), Some(_)) => client
            .unpushed_commits(remote, branch)
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let state = RepositoryState {
        head_detached: head.is_detached(),
        current_branch,
        has_remote: raw_remote.is_some(),
        remote_has_inline_credentials: raw_remote
            .as_deref()
            .is_some_and(has_inline_credentials),
        remote_url: raw_remote.as_deref().map(redact),
        identity_configured,
        working_tree_dirty,
        unpushed_commits,
    };

    debug!(
        "probe: branch={:?} detached={} remote={} identity={} dirty={} unpushed={}",
        state.current_branch,
        state.head_detached,
        state.has_remote,
        state.identity_configured,
        state.working_tree_dirty,
        state.unpushed_commits.len()
    );
    state
}

use crate::config::GitSettings;
use crate::errors::{Result, VaultError};
use crate::git::remote_url::{has_inline_credentials, redact, same_location, strip_credentials};
use crate::git::{RemoteTarget, VersionControlClient};
use serde::Serialize;
use tracing::{debug, info};

/// Result of a repair step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RepairResult {
    /// Nothing needed fixing
    AlreadyHealthy,
    /// What was changed
    Repaired(String),
}

impl RepairResult {
    pub fn changed(&self) -> bool {
        matches!(self, RepairResult::Repaired(_))
    }

    pub fn describe(&self) -> &str {
        match self {
            RepairResult::AlreadyHealthy => "already healthy",
            RepairResult::Repaired(action) => action,
        }
    }
}

/// Reattach a detached HEAD to a usable branch.
///
/// Candidates are tried in configured order: an existing local branch is
/// checked out, otherwise a remote-tracking branch of the same name is
/// checked out as a new local branch. When no candidate is available the
/// last one is created at the current commit.
pub fn repair_detached_head<C>(client: &C, git: &GitSettings) -> Result<RepairResult>
where
    C: VersionControlClient + ?Sized,
{
    let head = client
        .head()
        .map_err(|e| VaultError::branch(format!("Could not read HEAD: {e}")))?;
    if !head.is_detached() {
        return Ok(RepairResult::AlreadyHealthy);
    }

    let remote = git.remote_name.as_str();
    if client.remote_url(remote).ok().flatten().is_some() {
        // Refresh remote-tracking branches; failure only narrows the options.
        if let Err(e) = client.fetch(&RemoteTarget::named(remote)) {
            debug!("Fetch before branch repair failed: {}", e);
        }
    }

    for candidate in &git.branch_candidates {
        if client.branch_exists(candidate).unwrap_or(false) {
            match client.checkout(candidate) {
                Ok(()) => {
                    info!("Reattached HEAD to existing branch '{}'", candidate);
                    return Ok(RepairResult::Repaired(format!(
                        "Checked out existing branch {candidate}"
                    )));
                }
                Err(e) => debug!("Checkout of '{}' failed: {}", candidate, e),
            }
        }

        if client
            .remote_branch_oid(remote, candidate)
            .ok()
            .flatten()
            .is_some()
        {
            let upstream = format!("{remote}/{candidate}");
            match client.create_branch(candidate, Some(&upstream)) {
                Ok(()) => {
                    info!("Reattached HEAD to '{}' tracking '{}'", candidate, upstream);
                    return Ok(RepairResult::Repaired(format!(
                        "Checked out {candidate} from {upstream}"
                    )));
                }
                Err(e) => debug!("Checkout of '{}' from '{}' failed: {}", candidate, upstream, e),
            }
        }
    }

    let fallback = git
        .branch_candidates
        .last()
        .ok_or_else(|| VaultError::branch("No branch candidates are configured"))?;

    client.create_branch(fallback, None).map_err(|e| {
        VaultError::branch(format!(
            "Could not create branch {fallback}: {}",
            e.failure_text()
        ))
    })?;

    info!("Created branch '{}' at the detached commit", fallback);
    Ok(RepairResult::Repaired(format!("Created branch {fallback}")))
}

/// Make sure the configured remote exists and carries no credentials.
pub fn repair_remote<C>(client: &C, git: &GitSettings) -> Result<RepairResult>
where
    C: VersionControlClient + ?Sized,
{
    let name = git.remote_name.as_str();
    let desired = git.remote_url.as_deref().map(strip_credentials);
    let current = client
        .remote_url(name)
        .map_err(|e| VaultError::remote(format!("Could not read remote '{name}': {e}")))?;

    let Some(current) = current else {
        let url = desired.ok_or_else(|| {
            VaultError::remote(format!(
                "No remote '{name}' is configured and no repository URL is set"
            ))
        })?;

        client.add_remote(name, &url).map_err(|e| {
            VaultError::remote(format!("Could not add remote '{name}': {}", e.failure_text()))
        })?;
        info!("Added remote '{}' -> {}", name, redact(&url));
        return Ok(RepairResult::Repaired(format!(
            "Added remote {name} ({})",
            redact(&url)
        )));
    };

    let target = match desired {
        Some(url) if !same_location(&current, &url) => url,
        _ if has_inline_credentials(&current) => strip_credentials(&current),
        _ => return Ok(RepairResult::AlreadyHealthy),
    };

    client.set_remote_url(name, &target).map_err(|e| {
        VaultError::remote(format!(
            "Could not update remote '{name}': {}",
            e.failure_text()
        ))
    })?;
    info!("Pointed remote '{}' at {}", name, redact(&target));
    Ok(RepairResult::Repaired(format!(
        "Set remote {name} to {}",
        redact(&target)
    )))
}

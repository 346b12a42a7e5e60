use crate::config::GitSettings;
use crate::errors::{Result, VaultError};
use crate::git::VersionControlClient;
use crate::sync::RepairResult;
use tracing::info;

/// Committer name used when neither git nor the settings provide one.
pub const FALLBACK_NAME: &str = "Roster Vault";
/// Committer email used when neither git nor the settings provide one.
pub const FALLBACK_EMAIL: &str = "roster-vault@localhost";

/// Fill in `user.name` / `user.email` when unset. Existing values are never
/// overwritten.
pub fn ensure_identity<C>(client: &C, git: &GitSettings) -> Result<RepairResult>
where
    C: VersionControlClient + ?Sized,
{
    let wanted = [
        ("user.name", git.author_name.as_deref().unwrap_or(FALLBACK_NAME)),
        (
            "user.email",
            git.author_email.as_deref().unwrap_or(FALLBACK_EMAIL),
        ),
    ];

    let mut set = Vec::new();
    for (key, value) in wanted {
        if client.config_value(key).ok().flatten().is_some() {
            continue;
        }

        client.set_config_value(key, value).map_err(|e| {
            VaultError::config(format!("Could not set {key}: {}", e.failure_text()))
        })?;
        info!("Configured {} = {}", key, value);
        set.push(key);
    }

    if set.is_empty() {
        Ok(RepairResult::AlreadyHealthy)
    } else {
        Ok(RepairResult::Repaired(format!("Set {}", set.join(", "))))
    }
}

use crate::config::{Credentials, GitSettings};
use crate::errors::{Result, VaultError};
use crate::git::remote_url::strip_credentials;
use crate::git::{RemoteTarget, SecretUrl, VersionControlClient};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Credential store file inside the git directory.
pub const CREDENTIAL_STORE_FILE: &str = "roster-credentials";

/// Where credentials get applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScope {
    /// An authenticated URL for a single invocation
    OneShotUrl,
    /// The client's credential store, owner-readable only
    PersistentStore,
}

#[derive(Debug, Clone)]
pub enum AppliedCredentials {
    OneShot(RemoteTarget),
    Stored(PathBuf),
}

/// Provision credentials for the configured remote.
///
/// The persisted remote URL is never touched. No message produced here
/// contains the token.
pub fn apply_credentials<C>(
    client: &C,
    git: &GitSettings,
    auth: &Credentials,
    scope: CredentialScope,
) -> Result<AppliedCredentials>
where
    C: VersionControlClient + ?Sized,
{
    if !auth.has_token() {
        return Err(VaultError::credential(
            "No access token is configured (set ROSTER_GIT_TOKEN or GITHUB_TOKEN)",
        ));
    }

    let base = client
        .remote_url(&git.remote_name)
        .ok()
        .flatten()
        .or_else(|| git.remote_url.clone())
        .map(|url| strip_credentials(&url))
        .ok_or_else(|| VaultError::credential("No remote URL to authenticate against"))?;

    let secret = SecretUrl::authenticated(&base, auth)?;

    match scope {
        CredentialScope::OneShotUrl => {
            info!("Using token credentials for {}", secret);
            Ok(AppliedCredentials::OneShot(RemoteTarget::OneShot(secret)))
        }
        CredentialScope::PersistentStore => {
            let path = client.git_dir().join(CREDENTIAL_STORE_FILE);
            write_store(&path, &secret)?;

            let helper = format!("store --file='{}'", path.display());
            client
                .set_config_value("credential.helper", &helper)
                .map_err(|e| {
                    VaultError::credential(format!(
                        "Could not configure credential helper: {}",
                        e.failure_text()
                    ))
                })?;

            info!("Stored credentials in {}", path.display());
            Ok(AppliedCredentials::Stored(path))
        }
    }
}

fn write_store(path: &Path, secret: &SecretUrl) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .map_err(|e| VaultError::credential(format!("Could not open credential store: {e}")))?;

    // An existing file keeps its old mode on open; tighten it explicitly.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                VaultError::credential(format!("Could not restrict credential store: {e}"))
            })?;
    }

    writeln!(file, "{}", secret.origin_line())
        .map_err(|e| VaultError::credential(format!("Could not write credential store: {e}")))?;
    Ok(())
}

use crate::errors::{Result, VaultError};
use crate::git::VersionControlClient;
use crate::sync::SyncRequest;
use tracing::{debug, info};

const NOTHING_TO_COMMIT: &[&str] = &["nothing to commit", "no changes added to commit"];
const IDENTITY_MISSING: &[&str] = &[
    "please tell me who you are",
    "empty ident",
    "unable to auto-detect email address",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    NoChanges,
    Committed { hash: String },
}

/// Stage the request's files (or everything) and commit them.
///
/// Having nothing to commit is a result, not an error, so re-running a save
/// that already landed is harmless.
pub fn commit_changes<C>(client: &C, request: &SyncRequest) -> Result<CommitResult>
where
    C: VersionControlClient + ?Sized,
{
    client.stage(request.files.as_deref())?;

    if !client.has_staged_changes()? {
        debug!("Nothing staged for '{}'", request.message);
        return Ok(CommitResult::NoChanges);
    }

    match client.commit(&request.message) {
        Ok(hash) => {
            info!("Committed {} '{}'", short(&hash), request.message);
            Ok(CommitResult::Committed { hash })
        }
        Err(e) => {
            let text = e.failure_text().to_lowercase();
            if NOTHING_TO_COMMIT.iter().any(|p| text.contains(p)) {
                debug!("Commit reported nothing to commit");
                Ok(CommitResult::NoChanges)
            } else if IDENTITY_MISSING.iter().any(|p| text.contains(p)) {
                Err(VaultError::config(format!(
                    "Committer identity is not configured: {}",
                    e.failure_text()
                )))
            } else {
                Err(e)
            }
        }
    }
}

fn short(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

use crate::cli::commands::{report_outcome, Workspace};
use crate::errors::{Result, VaultError};
use crate::sync::{SyncRequest, SyncStatus};
use crate::utils::async_ops::run_blocking;
use crate::utils::spinner::Spinner;
use std::path::PathBuf;

/// Commit local changes and publish them when enabled (always with `--force`)
pub async fn run(message: String, files: Vec<PathBuf>, force: bool) -> Result<()> {
    let workspace = Workspace::discover()?;
    let synchronizer = workspace.synchronizer()?;

    let mut request = if force {
        SyncRequest::forced(message)
    } else {
        SyncRequest::auto(message)
    };
    if !files.is_empty() {
        let root = workspace.root.clone();
        request = request.with_files(
            files
                .into_iter()
                .map(|f| if f.is_absolute() { f } else { root.join(f) })
                .collect(),
        );
    }

    let spinner = Spinner::new("Synchronizing...");
    let outcome = run_blocking(move || Ok(synchronizer.synchronize(&request))).await?;
    spinner.stop();

    report_outcome(&outcome);

    if outcome.status == SyncStatus::Failed {
        return Err(VaultError::validation(format!(
            "Synchronization failed ({})",
            outcome
                .error_kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        )));
    }
    Ok(())
}

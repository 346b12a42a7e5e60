use crate::cli::commands::{report_outcome, Workspace};
use crate::cli::ResolveStrategy;
use crate::errors::{Result, VaultError};
use crate::sync::{ConflictStrategy, SyncStatus};
use crate::utils::async_ops::run_blocking;
use crate::utils::spinner::Spinner;

pub async fn run(strategy: ResolveStrategy) -> Result<()> {
    let workspace = Workspace::discover()?;
    let synchronizer = workspace.synchronizer()?;

    let strategy = match strategy {
        ResolveStrategy::KeepLocal => ConflictStrategy::KeepLocal,
        ResolveStrategy::KeepRemote => ConflictStrategy::KeepRemote,
    };

    let spinner = Spinner::new("Resolving...");
    let outcome = run_blocking(move || Ok(synchronizer.resolve_conflict(strategy))).await?;
    spinner.stop();

    report_outcome(&outcome);
    if outcome.status == SyncStatus::Failed {
        return Err(VaultError::validation("Conflict was not resolved"));
    }
    Ok(())
}

use crate::cli::commands::Workspace;
use crate::cli::output::Output;
use crate::cli::FixTarget;
use crate::errors::{Remediation, Result};
use crate::utils::async_ops::run_blocking;

/// Run one targeted repair under the operation lock
pub async fn run(target: FixTarget) -> Result<()> {
    let workspace = Workspace::discover()?;
    let synchronizer = workspace.synchronizer()?;

    let remediation = match target {
        FixTarget::Identity => Remediation::FixIdentity,
        FixTarget::Branch => Remediation::RepairBranch,
        FixTarget::Remote => Remediation::RepairRemote,
        FixTarget::Credentials => Remediation::ProvisionCredentials,
    };

    let result = run_blocking(move || synchronizer.remediate(remediation)).await?;
    if result.changed() {
        Output::success(result.describe());
    } else {
        Output::info(format!("{:?}: {}", target, result.describe()));
    }
    Ok(())
}

use crate::cli::commands::record::confirm;
use crate::cli::commands::{report_saved_sync, Workspace};
use crate::cli::output::Output;
use crate::cli::BackupAction;
use crate::errors::Result;
use crate::utils::async_ops::run_blocking;
use console::style;

pub async fn run(action: BackupAction) -> Result<()> {
    let workspace = Workspace::discover()?;
    let backups = workspace.backups()?;

    match action {
        BackupAction::Create { description } => {
            let created = run_blocking(move || backups.create(description.as_deref())).await?;
            Output::success(format!(
                "Backup {} created ({} records)",
                created.info.id, created.info.file_count
            ));
            Output::sub_item(created.info.path.display());
            report_saved_sync(created.sync);
        }
        BackupAction::List => {
            let listed = backups.list()?;
            if listed.is_empty() {
                Output::info("No backups yet");
            }
            for backup in listed {
                println!(
                    "{}  {:>4} records  {}",
                    style(&backup.id).cyan(),
                    backup.file_count,
                    backup.metadata.description
                );
            }
        }
        BackupAction::Restore { id, yes } => {
            if !yes
                && !confirm(&format!(
                    "Replace all current records with backup {id}? (current state is backed up first)"
                ))?
            {
                Output::info("Cancelled");
                return Ok(());
            }
            let restored = run_blocking(move || backups.restore(&id)).await?;
            Output::success(format!(
                "Restored {} records from backup {}",
                restored.files_restored, restored.id
            ));
            Output::sub_item(format!("Previous state saved as backup {}", restored.previous.id));
            report_saved_sync(restored.sync);
        }
    }
    Ok(())
}

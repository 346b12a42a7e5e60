pub mod backup;
pub mod completions;
pub mod config;
pub mod doctor;
pub mod fix;
pub mod init;
pub mod record;
pub mod resolve;
pub mod status;
pub mod sync;

use crate::cli::output::Output;
use crate::config::{is_repo_initialized, Settings};
use crate::errors::{Result, VaultError};
use crate::git::{current_repository_root, GitClient};
use crate::store::{BackupManager, RecordStore};
use crate::sync::{SyncOutcome, SyncStatus, Synchronizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Repository root plus the settings every command shares.
pub struct Workspace {
    pub root: PathBuf,
    pub settings: Arc<Settings>,
}

impl Workspace {
    /// Locate the enclosing initialized vault and load its settings.
    pub fn discover() -> Result<Self> {
        Self::discover_at(&current_repository_root()?)
    }

    pub fn discover_at(root: &Path) -> Result<Self> {
        if !is_repo_initialized(root) {
            return Err(VaultError::config(
                "Repository is not initialized for Roster. Run 'roster init' first.",
            ));
        }

        let settings = Settings::load(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            settings: Arc::new(settings),
        })
    }

    pub fn client(&self) -> Result<GitClient> {
        GitClient::open(&self.root, self.settings.sync.network_timeout())
    }

    pub fn synchronizer(&self) -> Result<Synchronizer<GitClient>> {
        Ok(Synchronizer::new(self.client()?, self.settings.clone()))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(&self.settings.store.data_dir)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(&self.settings.store.backup_dir)
    }

    pub fn store(&self) -> Result<RecordStore> {
        Ok(RecordStore::with_recorder(
            self.data_dir(),
            Arc::new(self.synchronizer()?),
            &self.settings.store,
        ))
    }

    pub fn backups(&self) -> Result<BackupManager> {
        Ok(BackupManager::with_recorder(
            self.data_dir(),
            self.backup_dir(),
            Arc::new(self.synchronizer()?),
            &self.settings.store,
        ))
    }
}

/// Print a synchronization outcome with its hint when it failed.
pub fn report_outcome(outcome: &SyncOutcome) {
    match outcome.status {
        SyncStatus::NoChanges => Output::info(&outcome.detail),
        SyncStatus::Committed | SyncStatus::Pushed => Output::success(&outcome.detail),
        SyncStatus::Failed => {
            Output::error(&outcome.detail);
            if let Some(kind) = outcome.error_kind {
                Output::sub_item(format!("Error kind: {kind}"));
                Output::solution(kind.hint());
            }
        }
    }

    if let Some(commit) = &outcome.commit {
        Output::sub_item(format!("Commit: {}", commit.get(..8).unwrap_or(commit)));
    }
    for attempt in &outcome.push_attempts {
        let result = match attempt.failure {
            Some(kind) => format!("failed ({kind})"),
            None => "ok".to_string(),
        };
        let auth = if attempt.authenticated { " with token" } else { "" };
        Output::sub_item(format!("Push {}{auth}: {result}", attempt.stage));
    }
}

/// Print the sync status a store write produced.
pub fn report_saved_sync(sync: Option<SyncStatus>) {
    match sync {
        None => Output::sub_item("Git disabled for this environment; saved locally"),
        Some(SyncStatus::Failed) => {
            Output::warning("Saved locally, but synchronization failed. Run 'roster status'.")
        }
        Some(status) => Output::sub_item(format!("Synchronization: {status}")),
    }
}

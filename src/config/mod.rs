pub mod auth;
pub mod settings;

pub use auth::Credentials;
pub use settings::{GitSettings, Settings, StoreSettings, SyncSettings};

use crate::errors::{Result, VaultError};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the Roster configuration directory for a specific repository
pub fn get_repo_config_dir(repo_path: &Path) -> PathBuf {
    repo_path.join(".roster")
}

/// Path of the repository settings file
pub fn settings_path(repo_path: &Path) -> PathBuf {
    get_repo_config_dir(repo_path).join("config.json")
}

/// Ensure the configuration directory exists
pub fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        fs::create_dir_all(config_dir).map_err(|e| {
            VaultError::config(format!("Failed to create config directory: {e}"))
        })?;
    }
    Ok(())
}

/// Check if a repository is initialized for Roster
pub fn is_repo_initialized(repo_path: &Path) -> bool {
    settings_path(repo_path).exists()
}

/// Initialize a repository for Roster
pub fn initialize_repo(repo_path: &Path, remote_url: Option<String>) -> Result<Settings> {
    ensure_config_dir(&get_repo_config_dir(repo_path))?;

    let mut settings = Settings::default();
    settings.git.remote_url = remote_url;
    settings.validate()?;
    settings.save_to_file(&settings_path(repo_path))?;

    crate::store::RecordStore::ensure_layout(&repo_path.join(&settings.store.data_dir))?;

    tracing::info!("Initialized Roster repository at {}", repo_path.display());
    Ok(settings)
}

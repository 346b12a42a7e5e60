use crate::config::auth::Credentials;
use crate::errors::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub git: GitSettings,
    pub sync: SyncSettings,
    pub store: StoreSettings,
    /// Only ever sourced from the environment.
    #[serde(skip)]
    pub auth: Credentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    pub remote_name: String,
    pub remote_url: Option<String>,
    /// Branches tried, in order, when HEAD has to be reattached.
    pub branch_candidates: Vec<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub auto_push: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub network_timeout_secs: u64,
    pub lock_stale_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub data_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub environment: String,
    pub allow_git_in_production: bool,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            remote_name: "origin".to_string(),
            remote_url: None,
            branch_candidates: vec!["main".to_string(), "master".to_string()],
            author_name: None,
            author_email: None,
            auto_push: false,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            network_timeout_secs: 10,
            lock_stale_secs: 300,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            backup_dir: PathBuf::from("backups"),
            environment: "development".to_string(),
            allow_git_in_production: false,
        }
    }
}

impl SyncSettings {
    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }
}

impl StoreSettings {
    /// Whether record writes should be followed by a synchronization.
    pub fn git_enabled(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development") || self.allow_git_in_production
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(VaultError::config(format!(
            "Invalid boolean value for {key}: {value}"
        ))),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl Settings {
    /// Load settings from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| VaultError::config(format!("Failed to read config file: {e}")))?;

        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| VaultError::config(format!("Failed to parse config file: {e}")))?;

        Ok(settings)
    }

    /// Save settings to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| VaultError::config(format!("Failed to serialize config: {e}")))?;

        crate::utils::atomic_file::write_string(path, &content)
    }

    /// Load the repository settings and apply process environment overrides.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let path = crate::config::settings_path(repo_root);
        let mut settings = Self::load_from_file(&path)?;
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Re-read settings from disk and environment, replacing `self`.
    pub fn reload(&mut self, repo_root: &Path) -> Result<()> {
        *self = Self::load(repo_root)?;
        tracing::debug!("Reloaded settings for {}", repo_root.display());
        Ok(())
    }

    /// Apply environment overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(|v| non_empty(&v));

        if let Some(remote) = get("ROSTER_GIT_REMOTE") {
            self.git.remote_name = remote;
        }
        if let Some(url) = get("ROSTER_GIT_REPOSITORY_URL") {
            self.git.remote_url = Some(url);
        }
        if let Some(branch) = get("ROSTER_GIT_BRANCH") {
            self.git.branch_candidates.retain(|b| b != &branch);
            self.git.branch_candidates.insert(0, branch);
        }
        if let Some(name) = get("ROSTER_GIT_USER_NAME") {
            self.git.author_name = Some(name);
        }
        if let Some(email) = get("ROSTER_GIT_USER_EMAIL") {
            self.git.author_email = Some(email);
        }
        if let Some(flag) = get("ROSTER_GIT_AUTO_PUSH") {
            self.git.auto_push = parse_bool("ROSTER_GIT_AUTO_PUSH", &flag)?;
        }
        if let Some(env) = get("ROSTER_ENV") {
            self.store.environment = env;
        }
        if let Some(flag) = get("ROSTER_ALLOW_GIT_IN_PRODUCTION") {
            self.store.allow_git_in_production =
                parse_bool("ROSTER_ALLOW_GIT_IN_PRODUCTION", &flag)?;
        }

        self.auth = Credentials {
            token: get("ROSTER_GIT_TOKEN").or_else(|| get("GITHUB_TOKEN")),
            username: get("ROSTER_GIT_USERNAME"),
        };

        Ok(())
    }

    /// Update a configuration value by key
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "git.remote_name" => self.git.remote_name = value.to_string(),
            "git.remote_url" => self.git.remote_url = non_empty(value),
            "git.branch_candidates" => {
                self.git.branch_candidates = value
                    .split(',')
                    .filter_map(non_empty)
                    .collect();
            }
            "git.author_name" => self.git.author_name = non_empty(value),
            "git.author_email" => self.git.author_email = non_empty(value),
            "git.auto_push" => self.git.auto_push = parse_bool(key, value)?,
            "sync.network_timeout_secs" => {
                self.sync.network_timeout_secs = value
                    .parse()
                    .map_err(|_| VaultError::config(format!("Invalid number: {value}")))?;
            }
            "sync.lock_stale_secs" => {
                self.sync.lock_stale_secs = value
                    .parse()
                    .map_err(|_| VaultError::config(format!("Invalid number: {value}")))?;
            }
            "store.data_dir" => self.store.data_dir = PathBuf::from(value),
            "store.backup_dir" => self.store.backup_dir = PathBuf::from(value),
            "store.environment" => self.store.environment = value.to_string(),
            "store.allow_git_in_production" => {
                self.store.allow_git_in_production = parse_bool(key, value)?
            }
            _ => return Err(VaultError::config(format!("Unknown config key: {key}"))),
        }

        Ok(())
    }

    /// Get a configuration value by key
    pub fn get_value(&self, key: &str) -> Result<String> {
        let value = match key {
            "git.remote_name" => self.git.remote_name.clone(),
            "git.remote_url" => self.git.remote_url.clone().unwrap_or_default(),
            "git.branch_candidates" => self.git.branch_candidates.join(","),
            "git.author_name" => self.git.author_name.clone().unwrap_or_default(),
            "git.author_email" => self.git.author_email.clone().unwrap_or_default(),
            "git.auto_push" => self.git.auto_push.to_string(),
            "sync.network_timeout_secs" => self.sync.network_timeout_secs.to_string(),
            "sync.lock_stale_secs" => self.sync.lock_stale_secs.to_string(),
            "store.data_dir" => self.store.data_dir.display().to_string(),
            "store.backup_dir" => self.store.backup_dir.display().to_string(),
            "store.environment" => self.store.environment.clone(),
            "store.allow_git_in_production" => self.store.allow_git_in_production.to_string(),
            _ => return Err(VaultError::config(format!("Unknown config key: {key}"))),
        };

        Ok(value)
    }

    /// All keys understood by `get_value` / `set_value`.
    pub fn keys() -> &'static [&'static str] {
        &[
            "git.remote_name",
            "git.remote_url",
            "git.branch_candidates",
            "git.author_name",
            "git.author_email",
            "git.auto_push",
            "sync.network_timeout_secs",
            "sync.lock_stale_secs",
            "store.data_dir",
            "store.backup_dir",
            "store.environment",
            "store.allow_git_in_production",
        ]
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.git.remote_name.trim().is_empty() {
            return Err(VaultError::config("Remote name must not be empty"));
        }

        if self.git.branch_candidates.is_empty() {
            return Err(VaultError::config(
                "At least one branch candidate is required",
            ));
        }

        if let Some(url) = &self.git.remote_url {
            if crate::git::remote_url::has_inline_credentials(url) {
                return Err(VaultError::config(
                    "Repository URL must not embed credentials; use ROSTER_GIT_TOKEN instead",
                ));
            }
        }

        if self.sync.network_timeout_secs == 0 {
            return Err(VaultError::config("Network timeout must be at least 1 second"));
        }

        if self.sync.lock_stale_secs == 0 {
            return Err(VaultError::config(
                "Lock staleness threshold must be at least 1 second",
            ));
        }

        Ok(())
    }
}

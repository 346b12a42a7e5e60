use crate::config::StoreSettings;
use crate::errors::{Result, VaultError};
use crate::store::{ChangeRecorder, RecordKind, SyncHook};
use crate::sync::SyncStatus;
use crate::utils::atomic_file;
use crate::utils::path_validation::validate_id;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BACKUP_PREFIX: &str = "backup_";
const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub timestamp: String,
    /// Absent for backups made by hand without metadata
    pub created_at: Option<DateTime<Utc>>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub id: String,
    pub path: PathBuf,
    pub metadata: BackupMetadata,
    /// Record files across all kinds
    pub file_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupCreated {
    pub info: BackupInfo,
    pub sync: Option<SyncStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Restored {
    pub id: String,
    /// Safety copy of the state that was replaced
    pub previous: BackupInfo,
    pub files_restored: usize,
    pub sync: Option<SyncStatus>,
}

/// Snapshots of the data directory under `<backup_dir>/backup_<timestamp>`.
pub struct BackupManager {
    data_dir: PathBuf,
    backup_dir: PathBuf,
    hook: SyncHook,
}

impl BackupManager {
    pub fn new(data_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            backup_dir: backup_dir.into(),
            hook: SyncHook::default(),
        }
    }

    pub fn with_recorder(
        data_dir: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
        recorder: Arc<dyn ChangeRecorder>,
        settings: &StoreSettings,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            backup_dir: backup_dir.into(),
            hook: SyncHook::new(Some(recorder), settings),
        }
    }

    /// Copy every kind directory into a new backup and record it.
    pub fn create(&self, description: Option<&str>) -> Result<BackupCreated> {
        let timestamp = Local::now().format("%Y%m%d%H%M%S").to_string();
        let id = self.unused_id(&timestamp)?;
        let dir = self.backup_dir.join(format!("{BACKUP_PREFIX}{id}"));
        fs::create_dir_all(&dir)?;

        let mut file_count = 0;
        for kind in RecordKind::ALL {
            let source = self.data_dir.join(kind.dir_name());
            if source.exists() {
                file_count += copy_files(&source, &dir.join(kind.dir_name()))?;
            }
        }

        let metadata = BackupMetadata {
            timestamp: timestamp.clone(),
            created_at: Some(Utc::now()),
            description: description
                .map(str::to_string)
                .unwrap_or_else(|| format!("Backup created at {timestamp}")),
        };
        atomic_file::write_json(&dir.join(METADATA_FILE), &metadata)?;
        info!("Created backup {} ({} files)", id, file_count);

        let sync = self
            .hook
            .record(format!("Backup created at {timestamp}"), vec![dir.clone()]);

        Ok(BackupCreated {
            info: BackupInfo {
                id,
                path: dir,
                metadata,
                file_count,
            },
            sync,
        })
    }

    /// All backups, newest first.
    pub fn list(&self) -> Result<Vec<BackupInfo>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(id) = name.strip_prefix(BACKUP_PREFIX) else {
                continue;
            };
            if !entry.path().is_dir() {
                continue;
            }
            backups.push(self.describe(id, entry.path())?);
        }

        backups.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(backups)
    }

    /// Replace the current records with the contents of backup `id`.
    ///
    /// The current state is backed up first, so a restore can itself be undone.
    pub fn restore(&self, id: &str) -> Result<Restored> {
        let id = validate_id(id)?;
        let source = self.backup_dir.join(format!("{BACKUP_PREFIX}{id}"));
        if !source.is_dir() {
            return Err(VaultError::not_found(format!("Backup {id} not found")));
        }

        let description = format!("Before restoring backup {id}");
        let previous = self.create(Some(description.as_str()))?.info;

        for kind in RecordKind::ALL {
            clear_records(&self.data_dir.join(kind.dir_name()))?;
        }

        let mut files_restored = 0;
        for kind in RecordKind::ALL {
            let from = source.join(kind.dir_name());
            if from.exists() {
                files_restored += copy_files(&from, &self.data_dir.join(kind.dir_name()))?;
            }
        }
        info!("Restored {} files from backup {}", files_restored, id);

        let sync = self.hook.record(
            format!("Restored from backup {id}"),
            vec![self.data_dir.clone()],
        );

        Ok(Restored {
            id: id.to_string(),
            previous,
            files_restored,
            sync,
        })
    }

    fn describe(&self, id: &str, path: PathBuf) -> Result<BackupInfo> {
        let metadata_path = path.join(METADATA_FILE);
        let metadata = if metadata_path.exists() {
            serde_json::from_str(&fs::read_to_string(&metadata_path)?)?
        } else {
            debug!("Backup {} has no metadata", id);
            BackupMetadata {
                timestamp: id.to_string(),
                created_at: None,
                description: format!("Backup {BACKUP_PREFIX}{id}"),
            }
        };

        let file_count = RecordKind::ALL
            .iter()
            .map(|kind| count_records(&path.join(kind.dir_name())))
            .sum();

        Ok(BackupInfo {
            id: id.to_string(),
            path,
            metadata,
            file_count,
        })
    }

    fn unused_id(&self, timestamp: &str) -> Result<String> {
        let taken = |id: &str| self.backup_dir.join(format!("{BACKUP_PREFIX}{id}")).exists();
        if !taken(timestamp) {
            return Ok(timestamp.to_string());
        }
        (2u32..)
            .map(|n| format!("{timestamp}-{n}"))
            .find(|id| !taken(id))
            .ok_or_else(|| VaultError::record("Could not allocate a backup id"))
    }
}

fn is_record(path: &Path) -> bool {
    path.is_file() && path.file_name().is_some_and(|name| name != ".gitkeep")
}

fn count_records(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| is_record(&e.path()))
                .count()
        })
        .unwrap_or(0)
}

/// Copy the regular files of `from` into `to`, returning how many records
/// were copied.
fn copy_files(from: &Path, to: &Path) -> Result<usize> {
    fs::create_dir_all(to)?;
    let mut copied = 0;
    for entry in fs::read_dir(from)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name() {
            fs::copy(&path, to.join(name))?;
            if is_record(&path) {
                copied += 1;
            }
        }
    }
    Ok(copied)
}

fn clear_records(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if is_record(&path) {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

//! File-per-record JSON store
//!
//! Records live at `<data_dir>/<kind>/<id>.json`. Every successful write or
//! delete is handed to a [`ChangeRecorder`] so it gets committed (and pushed
//! when enabled); the store only ever inspects the resulting status.

pub mod backup;

pub use backup::{BackupCreated, BackupInfo, BackupManager, BackupMetadata, Restored};

use crate::config::StoreSettings;
use crate::errors::{Result, VaultError};
use crate::git::VersionControlClient;
use crate::sync::{SyncOutcome, SyncRequest, SyncStatus, Synchronizer};
use crate::utils::atomic_file;
use crate::utils::path_validation::validate_id;
use chrono::Local;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A schemaless record: one JSON object with a string `id`.
pub type Record = Map<String, Value>;

const ID_FORMAT: &str = "%Y%m%d%H%M%S";
const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];
const TIME_BLOCKS: [&str; 7] = ["8-10", "10-12", "12-14", "14-16", "16-18", "18-20", "20-22"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Caregivers,
    Categories,
    Activities,
    Templates,
    Calendars,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Caregivers,
        RecordKind::Categories,
        RecordKind::Activities,
        RecordKind::Templates,
        RecordKind::Calendars,
    ];

    /// Directory name under the data dir
    pub fn dir_name(self) -> &'static str {
        match self {
            RecordKind::Caregivers => "caregivers",
            RecordKind::Categories => "categories",
            RecordKind::Activities => "activities",
            RecordKind::Templates => "templates",
            RecordKind::Calendars => "calendars",
        }
    }

    /// Label used in commit messages
    pub fn singular(self) -> &'static str {
        match self {
            RecordKind::Caregivers => "caregiver",
            RecordKind::Categories => "category",
            RecordKind::Activities => "activity",
            RecordKind::Templates => "template",
            RecordKind::Calendars => "calendar",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Receives every saved change. Implemented by the synchronizer.
pub trait ChangeRecorder: Send + Sync {
    fn record_change(&self, request: &SyncRequest) -> SyncOutcome;
}

impl<C: VersionControlClient> ChangeRecorder for Synchronizer<C> {
    fn record_change(&self, request: &SyncRequest) -> SyncOutcome {
        self.synchronize(request)
    }
}

/// Hands changes to the recorder when git is enabled for this environment.
#[derive(Clone, Default)]
pub(crate) struct SyncHook {
    recorder: Option<Arc<dyn ChangeRecorder>>,
    enabled: bool,
}

impl SyncHook {
    pub(crate) fn new(recorder: Option<Arc<dyn ChangeRecorder>>, settings: &StoreSettings) -> Self {
        Self {
            recorder,
            enabled: settings.git_enabled(),
        }
    }

    pub(crate) fn record(&self, message: String, files: Vec<PathBuf>) -> Option<SyncStatus> {
        if !self.enabled {
            debug!("Git disabled for this environment, not recording '{}'", message);
            return None;
        }
        let recorder = self.recorder.as_ref()?;

        let outcome = recorder.record_change(&SyncRequest::auto(message).with_files(files));
        if outcome.status == SyncStatus::Failed {
            warn!("Change saved locally but not synchronized: {}", outcome.detail);
        }
        Some(outcome.status)
    }
}

/// A write plus the synchronization status it produced (`None` when git is
/// disabled or no recorder is attached).
#[derive(Debug, Clone, Serialize)]
pub struct Saved {
    pub record: Record,
    pub sync: Option<SyncStatus>,
}

pub struct RecordStore {
    data_dir: PathBuf,
    hook: SyncHook,
}

impl RecordStore {
    /// A store without synchronization.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            hook: SyncHook::default(),
        }
    }

    /// A store that records changes through `recorder`, gated by the
    /// environment settings.
    pub fn with_recorder(
        data_dir: impl Into<PathBuf>,
        recorder: Arc<dyn ChangeRecorder>,
        settings: &StoreSettings,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            hook: SyncHook::new(Some(recorder), settings),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Create every kind directory with a `.gitkeep` so empty kinds are tracked.
    pub fn ensure_layout(data_dir: &Path) -> Result<()> {
        for kind in RecordKind::ALL {
            let dir = data_dir.join(kind.dir_name());
            fs::create_dir_all(&dir)?;
            let keep = dir.join(".gitkeep");
            if !keep.exists() {
                fs::write(&keep, "")?;
            }
        }
        Ok(())
    }

    fn kind_dir(&self, kind: RecordKind) -> PathBuf {
        self.data_dir.join(kind.dir_name())
    }

    fn record_path(&self, kind: RecordKind, id: &str) -> Result<PathBuf> {
        let id = validate_id(id)?;
        Ok(self.kind_dir(kind).join(format!("{id}.json")))
    }

    /// All records of a kind, sorted by id. `category_id` filters activities.
    pub fn list(&self, kind: RecordKind, category_id: Option<&str>) -> Result<Vec<Record>> {
        let dir = self.kind_dir(kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let record = read_record(&path)?;
            if let (RecordKind::Activities, Some(filter)) = (kind, category_id) {
                if record.get("category_id").and_then(Value::as_str) != Some(filter) {
                    continue;
                }
            }
            records.push(record);
        }

        records.sort_by(|a, b| record_id(a).cmp(record_id(b)));
        Ok(records)
    }

    pub fn get(&self, kind: RecordKind, id: &str) -> Result<Record> {
        let path = self.record_path(kind, id)?;
        if !path.exists() {
            return Err(VaultError::not_found(format!(
                "{} {id} not found",
                kind.singular()
            )));
        }
        read_record(&path)
    }

    /// Store a new record under a fresh timestamp id.
    pub fn create(&self, kind: RecordKind, mut record: Record) -> Result<Saved> {
        let id = self.next_id(kind)?;
        record.insert("id".to_string(), Value::String(id.clone()));
        self.prepare(kind, &mut record)?;

        let path = self.record_path(kind, &id)?;
        atomic_file::write_json(&path, &record)?;
        info!("Created {} {}", kind.singular(), id);

        let message = format!("Added {} {}", kind.singular(), display_name(&record));
        let sync = self.hook.record(message, vec![path]);
        Ok(Saved { record, sync })
    }

    /// Replace an existing record wholesale.
    pub fn update(&self, kind: RecordKind, id: &str, mut record: Record) -> Result<Saved> {
        let path = self.record_path(kind, id)?;
        if !path.exists() {
            return Err(VaultError::not_found(format!(
                "{} {id} not found",
                kind.singular()
            )));
        }

        record.insert("id".to_string(), Value::String(id.to_string()));
        if kind == RecordKind::Caregivers {
            copy_default_rate(&mut record);
        }
        atomic_file::write_json(&path, &record)?;
        info!("Updated {} {}", kind.singular(), id);

        let message = format!("Updated {} {}", kind.singular(), display_name(&record));
        let sync = self.hook.record(message, vec![path]);
        Ok(Saved { record, sync })
    }

    /// Remove a record, returning what was deleted.
    pub fn delete(&self, kind: RecordKind, id: &str) -> Result<Saved> {
        let record = self.get(kind, id)?;
        let path = self.record_path(kind, id)?;
        fs::remove_file(&path)?;
        info!("Deleted {} {}", kind.singular(), id);

        let message = format!("Deleted {} {}", kind.singular(), display_name(&record));
        let sync = self.hook.record(message, vec![path]);
        Ok(Saved { record, sync })
    }

    fn next_id(&self, kind: RecordKind) -> Result<String> {
        let base = Local::now().format(ID_FORMAT).to_string();
        let dir = self.kind_dir(kind);
        fs::create_dir_all(&dir)?;

        if !dir.join(format!("{base}.json")).exists() {
            return Ok(base);
        }
        (2u32..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !dir.join(format!("{candidate}.json")).exists())
            .ok_or_else(|| VaultError::record("Could not allocate a record id"))
    }

    fn prepare(&self, kind: RecordKind, record: &mut Record) -> Result<()> {
        match kind {
            RecordKind::Caregivers => copy_default_rate(record),
            RecordKind::Templates => {
                if !record.contains_key("schedule") {
                    record.insert("schedule".to_string(), empty_schedule());
                }
            }
            RecordKind::Calendars => {
                let template_id = record
                    .get("template_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if let Some(template_id) = template_id {
                    match self.get(RecordKind::Templates, &template_id) {
                        Ok(template) => {
                            let schedule = template
                                .get("schedule")
                                .cloned()
                                .unwrap_or_else(|| Value::Object(Map::new()));
                            record.insert("schedule".to_string(), schedule);
                        }
                        Err(VaultError::NotFound(_)) => {
                            debug!("Template {} not found, calendar keeps its schedule", template_id);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            RecordKind::Categories | RecordKind::Activities => {}
        }
        Ok(())
    }
}

/// Weekly grid of two-hour blocks, every slot empty.
pub fn empty_schedule() -> Value {
    let days = WEEKDAYS
        .iter()
        .map(|day| {
            let blocks = TIME_BLOCKS
                .iter()
                .map(|block| (block.to_string(), Value::Object(Map::new())))
                .collect::<Map<_, _>>();
            (day.to_string(), Value::Object(blocks))
        })
        .collect::<Map<_, _>>();
    Value::Object(days)
}

fn copy_default_rate(record: &mut Record) {
    if let Some(rate) = record.get("default_hourly_rate").cloned() {
        record.insert("hourly_rate".to_string(), rate);
    }
}

fn read_record(path: &Path) -> Result<Record> {
    let content = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&content)? {
        Value::Object(map) => Ok(map),
        _ => Err(VaultError::record(format!(
            "{} does not contain a JSON object",
            path.display()
        ))),
    }
}

fn record_id(record: &Record) -> &str {
    record.get("id").and_then(Value::as_str).unwrap_or_default()
}

fn display_name(record: &Record) -> String {
    record
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| record_id(record))
        .to_string()
}

use super::test_helpers::*;
use roster_vault::store::{BackupManager, Record, RecordKind, RecordStore};
use roster_vault::sync::SyncStatus;
use serde_json::json;
use std::sync::Arc;

fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap()
}

/// Every store write becomes one commit named after the record
#[test]
fn test_store_writes_are_committed() {
    let (_vault_dir, vault) = create_vault();
    let settings = settings(None, false);
    let store_settings = settings.store.clone();
    let sync = Arc::new(synchronizer(&vault, settings));
    let store = RecordStore::with_recorder(vault.join("data"), sync, &store_settings);

    let created = store
        .create(RecordKind::Caregivers, record(json!({"name": "Ana", "default_hourly_rate": 20})))
        .unwrap();
    assert_eq!(created.sync, Some(SyncStatus::Committed));
    assert_eq!(git(&vault, &["log", "-1", "--format=%s"]), "Added caregiver Ana");

    let id = created.record["id"].as_str().unwrap().to_string();
    store
        .update(RecordKind::Caregivers, &id, record(json!({"name": "Ana Maria"})))
        .unwrap();
    assert_eq!(git(&vault, &["log", "-1", "--format=%s"]), "Updated caregiver Ana Maria");

    let deleted = store.delete(RecordKind::Caregivers, &id).unwrap();
    assert_eq!(deleted.sync, Some(SyncStatus::Committed));
    assert_eq!(git(&vault, &["log", "-1", "--format=%s"]), "Deleted caregiver Ana Maria");
    assert_eq!(git(&vault, &["status", "--porcelain"]), "");
}

/// Only the touched record is staged; unrelated edits stay uncommitted
#[test]
fn test_store_stages_only_its_own_file() {
    let (_vault_dir, vault) = create_vault();
    let settings = settings(None, false);
    let store_settings = settings.store.clone();
    let sync = Arc::new(synchronizer(&vault, settings));
    let store = RecordStore::with_recorder(vault.join("data"), sync, &store_settings);

    write_file(&vault, "notes.txt", "scratch");
    store
        .create(RecordKind::Categories, record(json!({"name": "Meals"})))
        .unwrap();

    assert_eq!(git(&vault, &["status", "--porcelain"]), "?? notes.txt");
}

/// Production environments save locally without touching git
#[test]
fn test_production_store_leaves_git_alone() {
    let (_vault_dir, vault) = create_vault();
    let mut settings = settings(None, false);
    settings.store.environment = "production".to_string();
    let store_settings = settings.store.clone();
    let before = head(&vault);
    let sync = Arc::new(synchronizer(&vault, settings));
    let store = RecordStore::with_recorder(vault.join("data"), sync, &store_settings);

    let saved = store
        .create(RecordKind::Activities, record(json!({"name": "Walk"})))
        .unwrap();

    assert_eq!(saved.sync, None);
    assert_eq!(head(&vault), before);
    assert!(!git(&vault, &["status", "--porcelain"]).is_empty());
}

/// Restoring a backup brings records back and commits the restore
#[test]
fn test_backup_restore_round_trip_is_committed() {
    let (_vault_dir, vault) = create_vault();
    let settings = settings(None, false);
    let store_settings = settings.store.clone();
    let sync = Arc::new(synchronizer(&vault, settings));
    let store = RecordStore::with_recorder(vault.join("data"), sync.clone(), &store_settings);
    let backups = BackupManager::with_recorder(
        vault.join("data"),
        vault.join("backups"),
        sync,
        &store_settings,
    );

    let created = store
        .create(RecordKind::Templates, record(json!({"name": "Week"})))
        .unwrap();
    let id = created.record["id"].as_str().unwrap().to_string();
    let snapshot = backups.create(Some("before cleanup")).unwrap();
    assert_eq!(snapshot.sync, Some(SyncStatus::Committed));

    store.delete(RecordKind::Templates, &id).unwrap();
    let restored = backups.restore(&snapshot.info.id).unwrap();

    assert_eq!(restored.sync, Some(SyncStatus::Committed));
    assert_eq!(
        git(&vault, &["log", "-1", "--format=%s"]),
        format!("Restored from backup {}", snapshot.info.id)
    );
    assert_eq!(store.get(RecordKind::Templates, &id).unwrap()["name"], "Week");
    assert_eq!(backups.list().unwrap().len(), 2);
}

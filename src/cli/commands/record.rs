use crate::cli::commands::{report_saved_sync, Workspace};
use crate::cli::output::Output;
use crate::cli::RecordAction;
use crate::errors::{Result, VaultError};
use crate::store::{Record, RecordKind};
use crate::utils::async_ops::run_blocking;
use dialoguer::Confirm;
use serde_json::Value;
use std::io::Read;

pub async fn run(kind: RecordKind, action: RecordAction) -> Result<()> {
    let workspace = Workspace::discover()?;
    let store = workspace.store()?;

    match action {
        RecordAction::List { category_id } => {
            let records = store.list(kind, category_id.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        RecordAction::Show { id } => {
            let record = store.get(kind, &id)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        RecordAction::Create { data } => {
            let record = parse_record(&data)?;
            let saved = run_blocking(move || store.create(kind, record)).await?;
            println!("{}", serde_json::to_string_pretty(&saved.record)?);
            report_saved_sync(saved.sync);
        }
        RecordAction::Update { id, data } => {
            let record = parse_record(&data)?;
            let saved = run_blocking(move || store.update(kind, &id, record)).await?;
            println!("{}", serde_json::to_string_pretty(&saved.record)?);
            report_saved_sync(saved.sync);
        }
        RecordAction::Delete { id, yes } => {
            if !yes && !confirm(&format!("Delete {} {id}?", kind.singular()))? {
                Output::info("Cancelled");
                return Ok(());
            }
            let saved = run_blocking(move || store.delete(kind, &id)).await?;
            Output::success(format!(
                "Deleted {} {}",
                kind.singular(),
                saved.record.get("id").and_then(Value::as_str).unwrap_or_default()
            ));
            report_saved_sync(saved.sync);
        }
    }
    Ok(())
}

/// Parse a JSON object argument; `-` reads it from stdin.
fn parse_record(data: &str) -> Result<Record> {
    let text = if data == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        data.to_string()
    };

    match serde_json::from_str::<Value>(&text)? {
        Value::Object(map) => Ok(map),
        _ => Err(VaultError::validation("Record data must be a JSON object")),
    }
}

pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| VaultError::validation(format!("Could not read confirmation: {e}")))
}

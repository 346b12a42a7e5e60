use crate::cli::output::Output;
use crate::cli::ConfigAction;
use crate::config::{is_repo_initialized, settings_path, Settings};
use crate::errors::{Result, VaultError};
use crate::git::current_repository_root;
use std::path::Path;

/// Handle configuration commands
pub async fn run(action: ConfigAction) -> Result<()> {
    let repo_root = current_repository_root()?;
    if !is_repo_initialized(&repo_root) {
        return Err(VaultError::config(
            "Repository is not initialized for Roster. Run 'roster init' first.",
        ));
    }
    let config_file = settings_path(&repo_root);

    match action {
        ConfigAction::Set { key, value } => set_config_value(&config_file, &key, &value),
        ConfigAction::Get { key } => {
            let settings = Settings::load_from_file(&config_file)?;
            println!("{}", settings.get_value(&key)?);
            Ok(())
        }
        ConfigAction::List => list_config_values(&repo_root, &config_file),
    }
}

fn set_config_value(config_file: &Path, key: &str, value: &str) -> Result<()> {
    let mut settings = Settings::load_from_file(config_file)?;
    settings.set_value(key, value)?;
    settings.validate()?;
    settings.save_to_file(config_file)?;

    Output::success(format!("Configuration updated: {key} = {value}"));

    match key {
        "git.auto_push" if value.trim().eq_ignore_ascii_case("true") => {
            Output::tip("Saves will now push; set ROSTER_GIT_TOKEN for authenticated remotes");
        }
        "git.remote_url" => Output::tip("Run 'roster fix remote' to apply it now"),
        "store.environment" => {
            if !settings.store.git_enabled() {
                Output::warning("Git is disabled for this environment; records save locally only");
            }
        }
        _ => {}
    }
    Ok(())
}

fn list_config_values(repo_root: &Path, config_file: &Path) -> Result<()> {
    let stored = Settings::load_from_file(config_file)?;
    let effective = Settings::load(repo_root)?;

    Output::section("Configuration");
    for key in Settings::keys() {
        let value = effective.get_value(key)?;
        if stored.get_value(key)? != value {
            Output::field(key, format!("{value} (from environment)"));
        } else {
            Output::field(key, value);
        }
    }

    Output::field(
        "token",
        effective
            .auth
            .masked_token()
            .unwrap_or_else(|| "not set".to_string()),
    );
    Ok(())
}

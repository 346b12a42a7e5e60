use crate::cli::commands::{report_outcome, Workspace};
use crate::cli::output::Output;
use crate::config::{get_repo_config_dir, initialize_repo, is_repo_initialized, GitSettings};
use crate::errors::{Result, VaultError};
use crate::git::{find_repository_root, is_git_repository, GitClient};
use crate::sync::SyncRequest;
use crate::utils::async_ops::run_blocking;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Initialize a vault, creating the git repository when needed
pub async fn run(remote_url: Option<String>, force: bool) -> Result<()> {
    let current_dir = env::current_dir()
        .map_err(|e| VaultError::config(format!("Could not get current directory: {e}")))?;

    let repo_root = run_blocking(move || prepare(&current_dir, remote_url, force)).await?;

    let workspace = Workspace::discover_at(&repo_root)?;
    let synchronizer = workspace.synchronizer()?;
    let files = vec![
        get_repo_config_dir(&repo_root),
        workspace.data_dir(),
    ];
    let outcome = run_blocking(move || {
        Ok(synchronizer.synchronize(
            &SyncRequest::auto("Initialize roster vault").with_files(files),
        ))
    })
    .await?;

    Output::success(format!(
        "Roster vault initialized at {}",
        repo_root.display()
    ));
    report_outcome(&outcome);

    Output::section("Next steps");
    if workspace.settings.git.remote_url.is_none() {
        Output::bullet("roster config set git.remote_url https://github.com/you/roster-data.git");
    }
    Output::bullet("export ROSTER_GIT_TOKEN=... to let pushes authenticate");
    Output::bullet("roster doctor");
    Ok(())
}

fn prepare(current_dir: &Path, remote_url: Option<String>, force: bool) -> Result<PathBuf> {
    let repo_root = if is_git_repository(current_dir) {
        find_repository_root(current_dir)?
    } else {
        let branch = GitSettings::default()
            .branch_candidates
            .first()
            .cloned()
            .unwrap_or_else(|| "main".to_string());
        GitClient::init(current_dir, &branch, Duration::from_secs(10))?;
        current_dir.to_path_buf()
    };
    tracing::debug!("Using git repository at {}", repo_root.display());

    if is_repo_initialized(&repo_root) && !force {
        return Err(VaultError::config(
            "Repository is already initialized for Roster. Use --force to reinitialize.",
        ));
    }
    if force && is_repo_initialized(&repo_root) {
        tracing::warn!("Reinitializing {}", repo_root.display());
    }

    initialize_repo(&repo_root, remote_url)?;
    Ok(repo_root)
}

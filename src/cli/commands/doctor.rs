use crate::cli::commands::Workspace;
use crate::cli::output::Output;
use crate::errors::{Result, VaultError};
use crate::git::github::{GitHubClient, GitHubRepo, TokenAccess, DEFAULT_API_URL};
use crate::git::{GitCommand, RemoteTarget, VersionControlClient};
use crate::sync::{classify_error, OperationLock};
use crate::utils::async_ops::run_blocking;
use crate::utils::spinner::Spinner;
use std::env;
use std::time::Duration;

/// Outcome of one diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Ok,
    Warning,
    Problem,
}

#[derive(Default)]
struct Tally {
    problems: u32,
    warnings: u32,
}

impl Tally {
    fn record(&mut self, health: Health) {
        match health {
            Health::Ok => {}
            Health::Warning => self.warnings += 1,
            Health::Problem => self.problems += 1,
        }
    }
}

/// Read-only health checks. Nothing here repairs anything.
pub async fn run() -> Result<()> {
    Output::section("Roster Doctor");
    let mut tally = Tally::default();

    Output::check_start("Checking git...");
    let cwd = env::current_dir()
        .map_err(|e| VaultError::config(format!("Could not get current directory: {e}")))?;
    let probe = GitCommand::new(&cwd, Duration::from_secs(10));
    match run_blocking(move || probe.run_local(&["--version"])).await {
        Ok(output) => Output::success(output.stdout.trim()),
        Err(e) => {
            Output::error(&e);
            Output::solution("Install git and make sure it is on PATH");
            print_summary(1, 0);
            return Ok(());
        }
    }

    Output::check_start("Checking vault...");
    let workspace = match Workspace::discover() {
        Ok(workspace) => workspace,
        Err(e) => {
            Output::error(&e);
            Output::solution("Run 'roster init' inside the data repository");
            print_summary(1, 0);
            return Ok(());
        }
    };
    Output::success(format!("Vault found at {}", workspace.root.display()));

    let synchronizer = workspace.synchronizer()?;
    let state = synchronizer.probe();
    let settings = workspace.settings.clone();

    Output::check_start("Checking repository state...");
    tally.record(match &state.current_branch {
        Some(branch) => {
            Output::success(format!("On branch {branch}"));
            Health::Ok
        }
        None if state.head_detached => {
            Output::warning("HEAD is detached");
            Output::solution("roster fix branch");
            Health::Warning
        }
        None => {
            Output::warning("No branch checked out");
            Health::Warning
        }
    });
    tally.record(if state.identity_configured {
        Output::success("Committer identity configured");
        Health::Ok
    } else {
        Output::warning("Committer identity missing");
        Output::solution("roster fix identity");
        Health::Warning
    });
    if state.remote_has_inline_credentials {
        Output::error("Remote URL embeds credentials");
        Output::solution("roster fix remote");
        tally.record(Health::Problem);
    }
    if !state.unpushed_commits.is_empty() {
        Output::warning(format!(
            "{} commit(s) not yet on the remote",
            state.unpushed_commits.len()
        ));
        Output::solution("roster sync --force");
        tally.record(Health::Warning);
    }
    if let Some(lock) = OperationLock::inspect(synchronizer.client().git_dir()) {
        Output::warning(format!(
            "Synchronization lock held by pid {} for {}s",
            lock.pid,
            lock.age().num_seconds()
        ));
        tally.record(Health::Warning);
    }

    Output::check_start("Checking remote...");
    let remote_name = settings.git.remote_name.clone();
    if !state.has_remote {
        Output::error(format!("Remote '{remote_name}' is not configured"));
        Output::solution("Set git.remote_url and run 'roster fix remote'");
        tally.record(Health::Problem);
    } else {
        let spinner = Spinner::new(format!("Contacting {remote_name}..."));
        let reach = run_blocking(move || {
            let client = synchronizer.client();
            Ok(client.ls_remote(&RemoteTarget::named(&remote_name)))
        })
        .await?;
        spinner.stop();

        tally.record(match reach {
            Ok(refs) => {
                Output::success(format!("Remote reachable ({refs} refs)"));
                Health::Ok
            }
            Err(e) => {
                let kind = classify_error(&e);
                Output::error(format!("Remote unreachable: {}", e.failure_text().trim()));
                Output::solution(kind.hint());
                Health::Problem
            }
        });
    }

    Output::check_start("Checking access token...");
    let remote_url = state
        .remote_url
        .clone()
        .or_else(|| settings.git.remote_url.clone());
    if !settings.auth.has_token() {
        Output::warning("No token configured (ROSTER_GIT_TOKEN or GITHUB_TOKEN)");
        tally.record(Health::Warning);
    } else if let Some(repo) = remote_url.as_deref().and_then(GitHubRepo::from_remote_url) {
        let api_base =
            env::var("ROSTER_GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        tally.record(
            match check_token(&api_base, &settings.auth, &repo, settings.sync.network_timeout())
                .await
            {
                Ok(health) => health,
                Err(e) => {
                    Output::warning(format!("Token check failed: {e}"));
                    Health::Warning
                }
            },
        );
    } else {
        Output::info(format!(
            "Token configured ({}); remote is not on github.com, skipping API check",
            settings.auth.masked_token().unwrap_or_default()
        ));
    }

    print_summary(tally.problems, tally.warnings);
    Ok(())
}

/// Verify the token against the GitHub API and report what it may do.
pub async fn check_token(
    api_base: &str,
    credentials: &crate::config::Credentials,
    repo: &GitHubRepo,
    timeout: Duration,
) -> Result<Health> {
    let client = GitHubClient::new(api_base, credentials, timeout)?;
    let health = match client.repository_access(repo).await? {
        TokenAccess::Push { full_name } => {
            Output::success(format!("Token can push to {full_name}"));
            Health::Ok
        }
        TokenAccess::ReadOnly { full_name } => {
            Output::warning(format!("Token can read {full_name} but cannot push"));
            Output::solution("Grant the token 'Contents: Read and write' permission");
            Health::Warning
        }
        TokenAccess::InvalidToken => {
            Output::error("GitHub rejected the token");
            Output::solution("Create a new token and update ROSTER_GIT_TOKEN");
            Health::Problem
        }
        TokenAccess::NotFound => {
            Output::error(format!(
                "Repository {}/{} not found or not visible to this token",
                repo.owner, repo.name
            ));
            Health::Problem
        }
    };
    Ok(health)
}

fn print_summary(problems: u32, warnings: u32) {
    Output::spacing();
    Output::divider();
    match (problems, warnings) {
        (0, 0) => Output::success("No issues found"),
        (0, w) => Output::warning(format!("{w} warning(s), no problems")),
        (p, w) => Output::error(format!("{p} problem(s), {w} warning(s)")),
    }
}

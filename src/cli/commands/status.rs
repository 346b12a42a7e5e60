use crate::cli::commands::Workspace;
use crate::cli::output::Output;
use crate::errors::Result;
use crate::sync::StatusReport;
use crate::utils::async_ops::run_blocking;
use console::style;

/// Show repository and synchronization state without changing anything
pub async fn run(json: bool) -> Result<()> {
    let workspace = Workspace::discover()?;
    let synchronizer = workspace.synchronizer()?;
    let report = run_blocking(move || Ok(synchronizer.status())).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &StatusReport) {
    let repo = &report.repository;

    Output::section("Repository");
    match (&repo.current_branch, repo.head_detached) {
        (Some(branch), _) => Output::field("Branch", style(branch).cyan()),
        (None, true) => Output::field("Branch", style("detached HEAD").yellow()),
        (None, false) => Output::field("Branch", style("none").dim()),
    }
    Output::field(
        "Remote",
        repo.remote_url
            .as_deref()
            .map(|url| format!("{} ({})", report.remote_name, url))
            .unwrap_or_else(|| format!("{} (not configured)", report.remote_name)),
    );
    if repo.remote_has_inline_credentials {
        Output::warning("Remote URL embeds credentials; run 'roster fix remote'");
    }
    Output::field(
        "Identity",
        if repo.identity_configured { "configured" } else { "missing" },
    );
    Output::field(
        "Token",
        if report.token_configured { "configured" } else { "not set" },
    );

    Output::section("Synchronization");
    Output::field("Environment", &report.environment);
    Output::field("Git enabled", report.git_enabled);
    Output::field("Auto push", report.auto_push);
    match &report.lock {
        Some(lock) => Output::field(
            "Lock",
            format!("held by pid {} since {}", lock.pid, lock.started_at.to_rfc3339()),
        ),
        None => Output::field("Lock", "free"),
    }

    Output::section("Changes");
    if report.changes.is_empty() {
        Output::info("Working tree clean");
    } else {
        for line in &report.changes {
            Output::bullet(line);
        }
    }

    if !repo.unpushed_commits.is_empty() {
        Output::section("Unpushed commits");
        for commit in &repo.unpushed_commits {
            Output::bullet(format!(
                "{} {}",
                style(commit.hash.get(..8).unwrap_or(&commit.hash)).yellow(),
                commit.message
            ));
        }
    }
}

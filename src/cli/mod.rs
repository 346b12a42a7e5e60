pub mod commands;
pub mod output;

use crate::errors::Result;
use crate::store::RecordKind;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Roster Vault - file-per-record storage kept in sync with git")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a vault in the current directory
    Init {
        /// Remote repository URL (no embedded credentials)
        #[arg(long)]
        remote_url: Option<String>,

        /// Re-initialize even if already initialized
        #[arg(long)]
        force: bool,
    },

    /// Commit local changes and publish them
    Sync {
        /// Commit message
        #[arg(long, short, default_value = "Manual sync")]
        message: String,

        /// Stage only these paths (repeatable)
        #[arg(long = "file")]
        files: Vec<PathBuf>,

        /// Allow force-push and best-effort repairs
        #[arg(long)]
        force: bool,
    },

    /// Show repository and synchronization state
    Status {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Read-only health checks
    Doctor,

    /// Run a targeted repair
    Fix {
        #[arg(value_enum)]
        target: FixTarget,
    },

    /// Settle a rejected push
    Resolve {
        #[arg(value_enum)]
        strategy: ResolveStrategy,
    },

    /// Manage records
    Record {
        #[arg(value_enum)]
        kind: RecordKind,

        #[command(subcommand)]
        action: RecordAction,
    },

    /// Back up and restore the data directory
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FixTarget {
    Identity,
    Branch,
    Remote,
    Credentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolveStrategy {
    KeepLocal,
    KeepRemote,
}

#[derive(Debug, Subcommand)]
pub enum RecordAction {
    /// List records
    List {
        /// Only activities in this category
        #[arg(long)]
        category_id: Option<String>,
    },

    /// Show one record
    Show { id: String },

    /// Create a record from a JSON object
    Create {
        /// JSON object, or `-` to read stdin
        data: String,
    },

    /// Replace a record with a JSON object
    Update {
        id: String,
        /// JSON object, or `-` to read stdin
        data: String,
    },

    /// Delete a record
    Delete {
        id: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum BackupAction {
    /// Snapshot the data directory
    Create {
        #[arg(long, short)]
        description: Option<String>,
    },

    /// List backups, newest first
    List,

    /// Replace current records with a backup
    Restore {
        id: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., git.auto_push)
        key: String,
        value: String,
    },

    /// Get a configuration value
    Get { key: String },

    /// List all configuration values
    List,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        self.setup_logging();

        match self.command {
            Commands::Init { remote_url, force } => commands::init::run(remote_url, force).await,
            Commands::Sync {
                message,
                files,
                force,
            } => commands::sync::run(message, files, force).await,
            Commands::Status { json } => commands::status::run(json).await,
            Commands::Doctor => commands::doctor::run().await,
            Commands::Fix { target } => commands::fix::run(target).await,
            Commands::Resolve { strategy } => commands::resolve::run(strategy).await,
            Commands::Record { kind, action } => commands::record::run(kind, action).await,
            Commands::Backup { action } => commands::backup::run(action).await,
            Commands::Config { action } => commands::config::run(action).await,
            Commands::Completions { shell } => commands::completions::generate_completions(shell),
        }
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr);

        if self.no_color {
            console::set_colors_enabled(false);
            subscriber.with_ansi(false).init();
        } else {
            subscriber.init();
        }
    }
}

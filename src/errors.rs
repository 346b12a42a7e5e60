use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Roster Vault Error Types
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Git library errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// A `git` invocation exited unsuccessfully
    #[error("git {command} failed: {stderr}")]
    Command {
        command: String,
        stderr: String,
        code: Option<i32>,
    },

    /// A network-bound `git` invocation ran past its deadline
    #[error("git {command} timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    /// The `git` executable could not be started at all
    #[error("git executable unavailable: {0}")]
    ClientMissing(String),

    /// Another synchronization holds the operation lock
    #[error("Synchronization already in progress (started {since}, pid {pid})")]
    Locked { since: DateTime<Utc>, pid: u32 },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Branch management errors
    #[error("Branch error: {0}")]
    Branch(String),

    /// Remote configuration errors
    #[error("Remote error: {0}")]
    Remote(String),

    /// Credential provisioning errors
    #[error("Credential error: {0}")]
    Credential(String),

    /// Record store errors
    #[error("Record error: {0}")]
    Record(String),

    /// Missing records, backups or refs
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl VaultError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        VaultError::Config(msg.into())
    }

    pub fn branch<S: Into<String>>(msg: S) -> Self {
        VaultError::Branch(msg.into())
    }

    pub fn remote<S: Into<String>>(msg: S) -> Self {
        VaultError::Remote(msg.into())
    }

    pub fn credential<S: Into<String>>(msg: S) -> Self {
        VaultError::Credential(msg.into())
    }

    pub fn record<S: Into<String>>(msg: S) -> Self {
        VaultError::Record(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        VaultError::NotFound(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        VaultError::Validation(msg.into())
    }

    /// Text the conflict classifier matches against.
    ///
    /// For command failures this is the captured stderr (already redacted);
    /// everything else falls back to the display form.
    pub fn failure_text(&self) -> String {
        match self {
            VaultError::Command { stderr, .. } => stderr.clone(),
            VaultError::Git(e) => e.message().to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;

/// Machine-readable discriminant attached to every failed synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Locked,
    ConfigurationError,
    BranchRepairFailed,
    RemoteConfigurationError,
    CredentialError,
    AuthError,
    RejectedPush,
    RemoteError,
    UnknownPushError,
}

/// Targeted corrective action a caller can offer for a failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Remediation {
    RetryLater,
    FixIdentity,
    RepairBranch,
    RepairRemote,
    ProvisionCredentials,
    ResolveConflict,
    InspectManually,
}

impl ErrorKind {
    pub fn remediation(self) -> Remediation {
        match self {
            ErrorKind::Locked => Remediation::RetryLater,
            ErrorKind::ConfigurationError => Remediation::FixIdentity,
            ErrorKind::BranchRepairFailed => Remediation::RepairBranch,
            ErrorKind::RemoteConfigurationError | ErrorKind::RemoteError => {
                Remediation::RepairRemote
            }
            ErrorKind::CredentialError | ErrorKind::AuthError => Remediation::ProvisionCredentials,
            ErrorKind::RejectedPush => Remediation::ResolveConflict,
            ErrorKind::UnknownPushError => Remediation::InspectManually,
        }
    }

    /// One-line hint suitable for showing next to the failure.
    pub fn hint(self) -> &'static str {
        match self {
            ErrorKind::Locked => "Another save is still running; try again in a moment.",
            ErrorKind::ConfigurationError => {
                "Set ROSTER_GIT_USER_NAME and ROSTER_GIT_USER_EMAIL, then run `roster fix identity`."
            }
            ErrorKind::BranchRepairFailed => {
                "The repository is not on a branch; run `roster fix branch`."
            }
            ErrorKind::RemoteConfigurationError => {
                "No remote is configured; set ROSTER_GIT_REPOSITORY_URL and run `roster fix remote`."
            }
            ErrorKind::CredentialError => {
                "No access token is configured; set ROSTER_GIT_TOKEN (or GITHUB_TOKEN)."
            }
            ErrorKind::AuthError => {
                "The remote rejected our credentials; check the token and run `roster fix credentials`."
            }
            ErrorKind::RejectedPush => {
                "The remote has changes we do not; run `roster resolve keep-local` or `keep-remote`."
            }
            ErrorKind::RemoteError => {
                "The remote repository could not be reached; check the URL with `roster doctor`."
            }
            ErrorKind::UnknownPushError => "Run `roster doctor` for a full diagnosis.",
        }
    }

    /// Map a local (non-push) engine error onto the outcome taxonomy.
    pub fn for_local_error(error: &VaultError) -> Self {
        match error {
            VaultError::Locked { .. } => ErrorKind::Locked,
            VaultError::Config(_) => ErrorKind::ConfigurationError,
            VaultError::Branch(_) => ErrorKind::BranchRepairFailed,
            VaultError::Remote(_) => ErrorKind::RemoteConfigurationError,
            VaultError::Credential(_) => ErrorKind::CredentialError,
            _ => ErrorKind::UnknownPushError,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Locked => "Locked",
            ErrorKind::ConfigurationError => "ConfigurationError",
            ErrorKind::BranchRepairFailed => "BranchRepairFailed",
            ErrorKind::RemoteConfigurationError => "RemoteConfigurationError",
            ErrorKind::CredentialError => "CredentialError",
            ErrorKind::AuthError => "AuthError",
            ErrorKind::RejectedPush => "RejectedPush",
            ErrorKind::RemoteError => "RemoteError",
            ErrorKind::UnknownPushError => "UnknownPushError",
        };
        f.write_str(name)
    }
}

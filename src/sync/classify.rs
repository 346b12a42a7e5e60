//! Failure classification for push, pull and fetch output.
//!
//! Every text rule lives here. Rules are matched case-insensitively against
//! the captured client output and checked in order; the first hit wins.

use crate::errors::{ErrorKind, VaultError};

const AUTH_PATTERNS: &[&str] = &[
    "could not read username",
    "could not read password",
    "authentication failed",
    "terminal prompts disabled",
    "permission denied",
    "403",
];

const REJECTED_PATTERNS: &[&str] = &["rejected", "non-fast-forward", "fetch first"];

const REMOTE_PATTERNS: &[&str] = &[
    "not a git repository",
    "does not appear to be a git repository",
    "repository not found",
    "not found",
    "404",
    "could not resolve host",
];

const DETACHED_PATTERNS: &[&str] = &["not currently on a branch", "detached head"];

const RULES: &[(&[&str], ErrorKind)] = &[
    (AUTH_PATTERNS, ErrorKind::AuthError),
    (REJECTED_PATTERNS, ErrorKind::RejectedPush),
    (REMOTE_PATTERNS, ErrorKind::RemoteError),
    (DETACHED_PATTERNS, ErrorKind::BranchRepairFailed),
];

/// Classify raw client output.
pub fn classify(text: &str) -> ErrorKind {
    let text = text.to_lowercase();

    RULES
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| text.contains(p)))
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::UnknownPushError)
}

/// Classify an error returned by a network-facing client call.
///
/// Timeouts and a missing binary carry no usable output and are never
/// matched against the rules.
pub fn classify_error(error: &VaultError) -> ErrorKind {
    match error {
        VaultError::Timeout { .. } | VaultError::ClientMissing(_) => ErrorKind::UnknownPushError,
        VaultError::Credential(_) => ErrorKind::CredentialError,
        other => classify(&other.failure_text()),
    }
}

//! Remote URL helpers: credential detection, stripping and redaction.
//!
//! Only `http`/`https` user-info counts as a credential. The `git` user in
//! `ssh://git@host/...` or scp-like `git@host:path` is an account name, not
//! a secret, and is left untouched.

use crate::config::Credentials;
use crate::errors::{Result, VaultError};
use std::fmt;
use url::Url;

fn parse_http(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Does this URL carry a user name or password inline?
pub fn has_inline_credentials(raw: &str) -> bool {
    parse_http(raw).is_some_and(|u| !u.username().is_empty() || u.password().is_some())
}

/// Remove any inline credentials, leaving other URLs untouched.
pub fn strip_credentials(raw: &str) -> String {
    match parse_http(raw) {
        Some(mut url) if !url.username().is_empty() || url.password().is_some() => {
            // Neither call can fail for http(s) URLs, which always have a host.
            let _ = url.set_password(None);
            let _ = url.set_username("");
            url.to_string()
        }
        _ => raw.trim().to_string(),
    }
}

/// Display-safe form of a URL.
pub fn redact(raw: &str) -> String {
    match parse_http(raw) {
        Some(mut url) if !url.username().is_empty() || url.password().is_some() => {
            let _ = url.set_password(None);
            let _ = url.set_username("***");
            url.to_string()
        }
        _ => raw.trim().to_string(),
    }
}

/// Whether two remote URLs point at the same place once credentials are ignored.
pub fn same_location(a: &str, b: &str) -> bool {
    let norm = |s: &str| strip_credentials(s).trim_end_matches('/').to_string();
    norm(a) == norm(b)
}

/// Replace the user-info part of every `scheme://user@host` in free text.
///
/// Git echoes the URL it was given in many error messages, so captured
/// output is scrubbed before it is logged or surfaced.
pub fn scrub_userinfo(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(idx) = rest.find("://") {
        let (head, tail) = rest.split_at(idx + 3);
        out.push_str(head);

        let authority_end = tail
            .find(|c: char| c == '/' || c == '\'' || c == '"' || c.is_whitespace())
            .unwrap_or(tail.len());
        let authority = &tail[..authority_end];

        match authority.rfind('@') {
            Some(at) => {
                out.push_str("***");
                out.push_str(&authority[at..]);
            }
            None => out.push_str(authority),
        }
        rest = &tail[authority_end..];
    }

    out.push_str(rest);
    out
}

/// A URL carrying a token, valid for a single invocation.
///
/// `Debug` and `Display` only ever show the redacted form.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretUrl(String);

impl SecretUrl {
    /// Build an authenticated URL from a credential-free base URL.
    pub fn authenticated(base: &str, credentials: &Credentials) -> Result<Self> {
        let token = credentials
            .token()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| VaultError::credential("No access token is configured"))?;

        let mut url = parse_http(base).ok_or_else(|| {
            VaultError::credential(format!(
                "Token authentication needs an http(s) remote, got {}",
                redact(base)
            ))
        })?;

        url.set_username(credentials.username())
            .map_err(|_| VaultError::credential("Remote URL cannot carry a user name"))?;
        url.set_password(Some(token))
            .map_err(|_| VaultError::credential("Remote URL cannot carry a password"))?;

        Ok(Self(url.to_string()))
    }

    /// The raw URL, for handing to the client. Never log this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `scheme://host` prefix used for credential-store lookups.
    pub fn origin_line(&self) -> String {
        match Url::parse(&self.0) {
            Ok(url) => {
                let host = url.host_str().unwrap_or_default();
                let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
                let password = url.password().unwrap_or_default();
                format!("{}://{}:{}@{}{}", url.scheme(), url.username(), password, host, port)
            }
            Err(_) => self.0.clone(),
        }
    }
}

impl fmt::Debug for SecretUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretUrl({})", redact(&self.0))
    }
}

impl fmt::Display for SecretUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&redact(&self.0))
    }
}

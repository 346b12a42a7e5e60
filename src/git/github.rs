use crate::config::Credentials;
use crate::errors::{Result, VaultError};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Owner and repository name of a `github.com` HTTPS remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepo {
    pub owner: String,
    pub name: String,
}

impl GitHubRepo {
    /// Parse `https://github.com/<owner>/<repo>[.git]`. Other hosts and
    /// schemes yield `None`.
    pub fn from_remote_url(remote_url: &str) -> Option<Self> {
        let url = Url::parse(remote_url).ok()?;
        if url.scheme() != "https" || url.host_str()? != "github.com" {
            return None;
        }

        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let owner = segments.next()?.to_string();
        let name = segments.next()?.trim_end_matches(".git").to_string();
        if name.is_empty() || segments.next().is_some() {
            return None;
        }
        Some(Self { owner, name })
    }
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    full_name: String,
    #[serde(default)]
    permissions: Option<Permissions>,
}

#[derive(Debug, Deserialize)]
struct Permissions {
    #[serde(default)]
    push: bool,
}

/// What the token is allowed to do with the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TokenAccess {
    /// Token can read and push
    Push { full_name: String },
    /// Token can read but not push
    ReadOnly { full_name: String },
    /// The API rejected the token
    InvalidToken,
    /// Repository missing or invisible to this token
    NotFound,
}

/// Minimal GitHub REST client used by diagnostics.
pub struct GitHubClient {
    client: Client,
    base_url: String,
}

impl GitHubClient {
    pub fn new(base_url: &str, credentials: &Credentials, timeout: Duration) -> Result<Self> {
        let token = credentials
            .token()
            .ok_or_else(|| VaultError::credential("No access token is configured"))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| VaultError::credential("Access token contains invalid characters"))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("roster-vault"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| VaultError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Check what the configured token may do with `repo`.
    pub async fn repository_access(&self, repo: &GitHubRepo) -> Result<TokenAccess> {
        let url = format!("{}/repos/{}/{}", self.base_url, repo.owner, repo.name);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::UNAUTHORIZED => Ok(TokenAccess::InvalidToken),
            StatusCode::NOT_FOUND => Ok(TokenAccess::NotFound),
            status if status.is_success() => {
                let body: RepositoryResponse = response.json().await?;
                let can_push = body.permissions.map(|p| p.push).unwrap_or(false);
                Ok(if can_push {
                    TokenAccess::Push {
                        full_name: body.full_name,
                    }
                } else {
                    TokenAccess::ReadOnly {
                        full_name: body.full_name,
                    }
                })
            }
            status => Err(VaultError::remote(format!(
                "GitHub API returned {status} for {}/{}",
                repo.owner, repo.name
            ))),
        }
    }
}

use std::fmt;

/// Access credentials for the remote.
///
/// Read-only to the engine and never persisted in repository state; the
/// token is only ever applied transiently to a push URL or to the credential
/// store file.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub(crate) token: Option<String>,
    pub(crate) username: Option<String>,
}

impl Credentials {
    pub fn new(token: Option<String>, username: Option<String>) -> Self {
        Self { token, username }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// User name presented alongside the token.
    ///
    /// GitHub accepts any non-empty user with a token as the password.
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or("x-access-token")
    }

    /// Short masked form for diagnostics (`ghp_...9xYz`).
    pub fn masked_token(&self) -> Option<String> {
        let token = self.token.as_deref()?;
        let chars: Vec<char> = token.chars().collect();
        if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            Some(format!("{head}...{tail}"))
        } else {
            Some("***".to_string())
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("username", &self.username)
            .finish()
    }
}

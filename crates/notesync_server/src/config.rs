//! Server configuration.

use std::time::Duration;

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Public base URL, used to build resource links.
    pub base_url: String,
    /// API version segment served.
    pub api_version: String,
    /// Maximum changes accepted in one update.
    pub max_changes_per_update: usize,
    /// Whether to require authentication.
    pub require_auth: bool,
    /// Secret key for token validation (if auth enabled).
    pub auth_secret: Option<Vec<u8>>,
    /// Lifetime of issued tokens.
    pub token_expiry: Duration,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: "1.0".to_string(),
            max_changes_per_update: 1000,
            require_auth: false,
            auth_secret: None,
            token_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the maximum changes per update.
    pub fn with_max_changes_per_update(mut self, max: usize) -> Self {
        self.max_changes_per_update = max;
        self
    }

    /// Enables authentication with the given secret.
    pub fn with_auth(mut self, secret: Vec<u8>) -> Self {
        self.require_auth = true;
        self.auth_secret = Some(secret);
        self
    }

    /// Sets the token lifetime.
    pub fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// Returns the URL of a user's notes resource.
    pub fn notes_url(&self, user_name: &str) -> String {
        format!(
            "{}/api/{}/{}/notes",
            self.base_url,
            self.api_version,
            urlencoding::encode(user_name)
        )
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8080")
    }
}

//! Configuration for sync sessions.

/// What `commit` does when the remote revision advanced since `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleRevisionPolicy {
    /// Fail the commit with a conflict error.
    #[default]
    Reject,
    /// Submit anyway; the last writer wins.
    LastWriterWins,
}

/// Configuration for a sync session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server URL. Doubles as the session identity.
    pub server_url: String,
    /// Remote user name, the principal the session acts for.
    pub user_name: String,
    /// Staleness handling at commit.
    pub stale_revision_policy: StaleRevisionPolicy,
}

impl SessionConfig {
    /// Creates a new session configuration.
    ///
    /// A trailing slash on the server URL is dropped so that the identity
    /// is stable however the URL was typed.
    pub fn new(server_url: impl Into<String>, user_name: impl Into<String>) -> Self {
        let server_url: String = server_url.into();
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            user_name: user_name.into(),
            stale_revision_policy: StaleRevisionPolicy::default(),
        }
    }

    /// Sets the staleness policy.
    pub fn with_stale_revision_policy(mut self, policy: StaleRevisionPolicy) -> Self {
        self.stale_revision_policy = policy;
        self
    }
}

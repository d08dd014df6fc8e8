//! Configuration for the HTTP store.

use std::time::Duration;

/// Default address of a local search engine node.
pub const DEFAULT_BASE_URL: &str = "http://localhost:9200";

/// Configuration for [`HttpStore`](crate::HttpStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStoreConfig {
    /// Base URL of the node (e.g., "http://localhost:9200").
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl HttpStoreConfig {
    /// Creates a configuration for the given node.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            user_agent: format!("elasticdata/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Joins the base URL and a request path.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

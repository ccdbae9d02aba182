use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

/// Remote service endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    #[serde(default = "default_host")]
    pub host: String,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Extra attempts after a transport-level failure. 0 preserves the
    /// one-shot reference semantics.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Disables TLS certificate validation. Testing only.
    #[serde(default)]
    pub danger_accept_invalid_certs: bool,
}

/// Query namespace configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Ceiling on cursor-paginated requests per GBT call. The server is
    /// expected to signal end-of-sequence well before this.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

/// Bulk download configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Concurrent per-entry fetches in the bulk workflow.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Extra attempts for entries that came back unavailable or failed
    /// the checksum gate. 0 skips them for the rest of the invocation.
    #[serde(default)]
    pub retries: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
            danger_accept_invalid_certs: false,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            retries: 0,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn default_host() -> String {
    "https://feed.feedlab.com".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    // Daily feed archives can be large
    300
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_user_agent() -> String {
    ["feedlab", "feed", "client", "rust", env!("CARGO_PKG_VERSION")].join("/")
}

fn default_max_pages() -> u32 {
    64
}

fn default_concurrency() -> usize {
    4
}

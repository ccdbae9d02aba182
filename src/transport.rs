//! HTTP request primitive shared by the query and download namespaces

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::HttpConfig;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Request body; absence means GET.
#[derive(Debug, Clone)]
pub enum Payload {
    /// JSON body, used by the current API generation
    Json(Value),
    /// Form-encoded body, used by the legacy API generation
    Form(BTreeMap<String, String>),
}

/// What came back from the service.
///
/// A 200 carries the payload; any other status is a definitive "no" and
/// carries the code so callers can decide whether to degrade or report.
/// Transport-level faults (DNS, refused connection, timeout) are `Err`
/// on [`Transport::send`] instead.
#[derive(Debug)]
pub enum Reply {
    Body(Bytes),
    Denied(StatusCode),
}

impl Reply {
    pub fn into_body(self) -> Option<Bytes> {
        match self {
            Reply::Body(bytes) => Some(bytes),
            Reply::Denied(_) => None,
        }
    }

    pub fn denied_status(&self) -> Option<StatusCode> {
        match self {
            Reply::Body(_) => None,
            Reply::Denied(status) => Some(*status),
        }
    }
}

/// HTTP client for the feed service
#[derive(Clone)]
pub struct Transport {
    client: Client,
    config: HttpConfig,
}

impl Transport {
    /// Create a new transport from HTTP configuration
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent);

        if config.danger_accept_invalid_certs {
            warn!("TLS certificate validation disabled; testing only");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Issue a request, retrying transport-level failures per config.
    ///
    /// An HTTP answer of any status, 200 or not, is returned on the
    /// first attempt that produces one; only connection faults are
    /// retried.
    pub async fn send(
        &self,
        url: &str,
        token: Option<&str>,
        payload: Option<&Payload>,
    ) -> Result<Reply> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.send_once(url, token, payload).await {
                Ok(reply) => {
                    if attempts > 1 {
                        debug!(url, attempts, "Request succeeded after retry");
                    }
                    return Ok(reply);
                }
                Err(e) => {
                    if attempts > self.config.max_retries {
                        if self.config.max_retries > 0 {
                            warn!(url, attempts, error = %e, "Request failed after retries");
                        }
                        return Err(e);
                    }

                    warn!(url, attempts, error = %e, "Request failed, retrying");

                    tokio::time::sleep(backoff_for(self.config.retry_backoff(), attempts)).await;
                }
            }
        }
    }

    /// Issue a request once (no retry)
    async fn send_once(
        &self,
        url: &str,
        token: Option<&str>,
        payload: Option<&Payload>,
    ) -> Result<Reply> {
        debug!(url, "Sending request");

        let mut request = match payload {
            None => self
                .client
                .get(url)
                .header(CONTENT_TYPE, "application/json"),
            Some(Payload::Json(body)) => self.client.post(url).json(body),
            Some(Payload::Form(fields)) => self.client.post(url).form(fields),
        };

        if let Some(token) = token {
            request = request.header("token", token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else if e.is_builder() {
                TransportError::InvalidUrl(e.to_string())
            } else {
                TransportError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!(url, status = status.as_u16(), "Service declined request");
            return Ok(Reply::Denied(status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::RequestFailed(format!("Failed to read body: {}", e)))?;

        debug!(url, size = bytes.len(), "Request completed");

        Ok(Reply::Body(bytes))
    }
}

/// Exponential backoff: base, 2x base, 4x base, ...
fn backoff_for(base: Duration, attempt: u32) -> Duration {
    base * 2u32.pow(attempt.saturating_sub(1))
}

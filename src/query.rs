//! Indicator lookup namespace.
//!
//! Covers the query side of the feed API: anonymous lookup, the
//! token-authenticated advanced and batch lookups, the APT actor
//! search, and the cursor-paginated GBT fetch.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::{
    ApiResult, CURSOR_BASE, CURSOR_DONE, CURSOR_START, GbtPage, Observation, decode_envelope,
};
use crate::transport::{Payload, Reply, Transport};

/// Envelope success code for this API generation.
const OK: i64 = 0;

/// Filter for the APT actor search. Unset fields are not sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AptFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Query client for the current API generation.
pub struct Query {
    transport: Transport,
    host: String,
    max_pages: u32,
    token: Option<String>,
}

impl Query {
    /// Create a query client. Anonymous lookups work without a token;
    /// everything else requires one.
    pub fn new(config: &Config, token: Option<String>) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(&config.http)?,
            host: config.endpoint.host.clone(),
            max_pages: config.query.max_pages,
            token,
        })
    }

    fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(Error::MissingToken)
    }

    async fn fetch(
        &self,
        url: &str,
        token: Option<&str>,
        payload: Option<Payload>,
    ) -> Result<ApiResult<Value>> {
        match self.transport.send(url, token, payload.as_ref()).await? {
            Reply::Body(bytes) => Ok(decode_envelope(&bytes, OK)?),
            Reply::Denied(status) => Ok(ApiResult::Empty {
                status: Some(status.as_u16()),
            }),
        }
    }

    /// Look up a single indicator without authentication.
    ///
    /// The indicator travels hex-encoded in the URL path.
    pub async fn anonymous(&self, data: &str) -> Result<ApiResult<Value>> {
        let url = format!("{}/api/query/v1/{}", self.host, hex::encode(data.as_bytes()));
        self.fetch(&url, None, None).await
    }

    /// Look up a single indicator with the full (authenticated) answer.
    pub async fn advanced(&self, data: &str) -> Result<ApiResult<Value>> {
        let token = self.require_token()?;

        let url = format!("{}/api/query/v1/advanced", self.host);
        let payload = Payload::Json(json!({ "token": token, "data": data }));
        self.fetch(&url, None, Some(payload)).await
    }

    /// Look up a batch of indicators in one round trip.
    pub async fn many(&self, data: &[&str]) -> Result<ApiResult<Value>> {
        let token = self.require_token()?;

        let url = format!("{}/api/query/v1/many", self.host);
        let payload = Payload::Json(json!(data));
        self.fetch(&url, Some(token), Some(payload)).await
    }

    /// Search APT actor notes by any combination of filter fields.
    pub async fn apt(&self, filter: &AptFilter) -> Result<ApiResult<Value>> {
        let token = self.require_token()?;

        let url = format!("{}/api/query/v1/aptnotes/advanced", self.host);
        let payload = Payload::Json(serde_json::to_value(filter)?);
        self.fetch(&url, Some(token), Some(payload)).await
    }

    /// Fetch an observable bundle by identifier, following the server's
    /// cursor until it signals end-of-sequence.
    ///
    /// The first page (cursor 1) carries the base observation; later
    /// pages append their `value` arrays into it. A failed or denied
    /// intermediate page terminates the sequence with whatever has been
    /// accumulated. A server that never terminates is cut off at the
    /// configured `query.max_pages` ceiling.
    pub async fn gbt(&self, identify: &str) -> Result<Observation> {
        let token = self.require_token()?;

        let url = format!("{}/api/query/v1/gbt", self.host);
        let mut cursor = CURSOR_START;
        let mut observation = Observation::default();
        let mut pages = 0u32;

        loop {
            if pages >= self.max_pages {
                return Err(Error::PaginationLimit {
                    pages: self.max_pages,
                });
            }
            pages += 1;

            let payload = Payload::Json(json!({
                "cursor": cursor,
                "type": "id",
                "data": identify,
            }));

            let reply = self.transport.send(&url, Some(token), Some(&payload)).await?;
            let Some(bytes) = reply.into_body() else {
                break;
            };

            let page = match decode_envelope::<GbtPage>(&bytes, OK)? {
                ApiResult::Success(page) => page,
                _ => break,
            };

            debug!(page = pages, cursor = page.cursor, "GBT page received");

            if page.cursor == CURSOR_DONE {
                break;
            }
            cursor = page.cursor;

            if page.cursor == CURSOR_BASE {
                if let Some(base) = page.observation {
                    observation = base;
                }
                continue;
            }

            if !observation.is_empty() {
                observation.absorb(page.value);
            }
        }

        Ok(observation)
    }

    /// One-shot GBT lookup by raw data instead of identifier; no
    /// pagination, decoded body returned as-is.
    pub async fn gbt_data(&self, data: &str) -> Result<ApiResult<Value>> {
        let token = self.require_token()?;

        let url = format!("{}/api/query/v1/gbt", self.host);
        let payload = Payload::Json(json!({
            "cursor": CURSOR_START,
            "type": "data",
            "data": data,
        }));
        self.fetch(&url, Some(token), Some(payload)).await
    }
}

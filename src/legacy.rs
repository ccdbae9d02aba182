//! Client for the original API generation.
//!
//! The older endpoints predate the `/v1` surface: query data travels
//! base64-encoded, bodies are form-encoded rather than JSON, the
//! envelope reports `status`/`message` with 1 as the success code, and
//! the manifest is a flat list. Retained for deployments still pinned
//! to the old surface; new integrations should use [`crate::Query`]
//! and [`crate::Download`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::checksum;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::{ApiResult, ManifestData, decode_envelope, feed_date};
use crate::transport::{Payload, Reply, Transport};

/// Envelope success code for the legacy generation.
const OK: i64 = 1;

/// Client for the pre-`/v1` API generation.
///
/// Tokens are passed per call here; the old surface had no notion of a
/// session-scoped credential.
pub struct Api {
    transport: Transport,
    host: String,
}

impl Api {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(&config.http)?,
            host: config.endpoint.host.clone(),
        })
    }

    fn check_token(token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(Error::MissingToken);
        }
        Ok(())
    }

    async fn fetch(&self, url: &str, payload: Option<Payload>) -> Result<ApiResult<Value>> {
        match self.transport.send(url, None, payload.as_ref()).await? {
            Reply::Body(bytes) => Ok(decode_envelope(&bytes, OK)?),
            Reply::Denied(status) => Ok(ApiResult::Empty {
                status: Some(status.as_u16()),
            }),
        }
    }

    /// Anonymous indicator lookup; data travels base64-encoded in the
    /// URL path.
    pub async fn query(&self, data: &str) -> Result<ApiResult<Value>> {
        let url = format!("{}/api/query/{}", self.host, BASE64.encode(data.as_bytes()));
        self.fetch(&url, None).await
    }

    /// Authenticated indicator lookup.
    pub async fn query_advanced(&self, token: &str, data: &str) -> Result<ApiResult<Value>> {
        Self::check_token(token)?;

        let url = format!("{}/api/query/advanced", self.host);
        let mut fields = BTreeMap::new();
        fields.insert("token".to_string(), token.to_string());
        fields.insert("data".to_string(), BASE64.encode(data.as_bytes()));

        self.fetch(&url, Some(Payload::Form(fields))).await
    }

    /// List the flat feed manifest for `today - days_back`.
    pub async fn download_list(
        &self,
        token: &str,
        days_back: u32,
    ) -> Result<ApiResult<ManifestData>> {
        Self::check_token(token)?;
        self.list_for_date(token, &feed_date(days_back)).await
    }

    async fn list_for_date(&self, token: &str, date: &str) -> Result<ApiResult<ManifestData>> {
        let url = format!("{}/api/download/advanced", self.host);
        let mut fields = BTreeMap::new();
        fields.insert("token".to_string(), token.to_string());
        fields.insert("type".to_string(), "all".to_string());
        fields.insert("cursor".to_string(), "0".to_string());
        fields.insert("date".to_string(), date.to_string());

        match self.transport.send(&url, None, Some(&Payload::Form(fields))).await? {
            Reply::Body(bytes) => Ok(decode_envelope(&bytes, OK)?),
            Reply::Denied(status) => Ok(ApiResult::Empty {
                status: Some(status.as_u16()),
            }),
        }
    }

    /// Download the full daily feed into `dir`, sequentially, returning
    /// the `(seen, written)` pair.
    ///
    /// Same discipline as the current generation: the manifest date is
    /// computed once, a payload is persisted only when its MD5 matches
    /// the manifest entry, and a mismatched or unavailable entry is
    /// skipped without aborting the walk.
    pub async fn download_advanced(
        &self,
        token: &str,
        dir: &Path,
        days_back: u32,
    ) -> Result<(usize, usize)> {
        Self::check_token(token)?;

        let metadata =
            std::fs::metadata(dir).map_err(|_| Error::NotADirectory(dir.to_path_buf()))?;
        if !metadata.is_dir() {
            return Err(Error::NotADirectory(dir.to_path_buf()));
        }
        if metadata.permissions().readonly() {
            return Err(Error::DirectoryNotWritable(dir.to_path_buf()));
        }

        let date = feed_date(days_back);

        let manifest = match self.list_for_date(token, &date).await? {
            ApiResult::Success(data) => data,
            ApiResult::ServiceError { code, message } => {
                return Err(Error::Service { code, message });
            }
            ApiResult::Empty { .. } => return Err(Error::ManifestUnavailable),
        };

        let url = format!("{}/api/download/advanced", self.host);
        let mut seen = 0usize;
        let mut written = 0usize;

        for file in manifest.files() {
            seen += 1;

            let mut fields = BTreeMap::new();
            fields.insert("token".to_string(), token.to_string());
            fields.insert("type".to_string(), file.entry.data_name.clone());
            fields.insert("cursor".to_string(), file.entry.cursor.to_string());
            fields.insert("date".to_string(), date.clone());

            let reply = self
                .transport
                .send(&url, None, Some(&Payload::Form(fields)))
                .await?;

            let Some(bytes) = reply.into_body() else {
                debug!(file = %file.file_name, "Entry unavailable, skipped");
                continue;
            };

            if !checksum::matches(&bytes, &file.entry.md5) {
                debug!(file = %file.file_name, "Checksum mismatch, file discarded");
                continue;
            }

            tokio::fs::write(dir.join(&file.file_name), &bytes).await?;
            written += 1;
            info!(file = %file.file_name, size = bytes.len(), "Feed file written");
        }

        Ok((seen, written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_token_rejected_before_network() {
        let config = Config::with_host("http://127.0.0.1:1").unwrap();
        let api = Api::new(&config).unwrap();

        assert!(matches!(
            api.query_advanced("", "198.51.100.7").await,
            Err(Error::MissingToken)
        ));
        assert!(matches!(
            api.download_list("", 1).await,
            Err(Error::MissingToken)
        ));
    }
}

//! Feed download namespace.
//!
//! Covers report PDF retrieval, the daily manifest listing, and the
//! bulk download workflow: list the manifest, fetch every entry on a
//! bounded worker pool, verify each payload against its declared MD5,
//! and persist verified files to a caller-supplied directory.

use bytes::Bytes;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::checksum;
use crate::config::{Config, DownloadConfig};
use crate::error::{Error, Result};
use crate::protocol::{ApiResult, CURSOR_START, FeedFile, ManifestData, decode_envelope, feed_date};
use crate::transport::{Payload, Reply, Transport};

/// Envelope success code for this API generation.
const OK: i64 = 0;

/// What happened to one manifest entry during a bulk download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    /// Verified and persisted
    Written,
    /// Payload digest did not match the manifest's declared MD5
    ChecksumMismatch { expected: String, actual: String },
    /// Service answered with a non-200 status
    Unavailable { status: u16 },
    /// Transport fault or filesystem write failure
    Failed { error: String },
    /// Skipped because the workflow was cancelled
    Cancelled,
}

/// Per-entry audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    pub data_name: String,
    pub file_name: String,
    pub status: EntryStatus,
}

/// Result of one bulk download invocation.
///
/// Every manifest entry appears exactly once in `outcomes`; the
/// headline `(seen, written)` pair is derived from them, so
/// `written <= seen` by construction.
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    outcomes: Vec<EntryOutcome>,
}

impl DownloadReport {
    fn from_outcomes(outcomes: Vec<EntryOutcome>) -> Self {
        Self { outcomes }
    }

    /// Manifest entries considered.
    pub fn seen(&self) -> usize {
        self.outcomes.len()
    }

    /// Files that passed the checksum gate and reached disk.
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == EntryStatus::Written)
            .count()
    }

    /// The reference `(seen, written)` pair.
    pub fn counts(&self) -> (usize, usize) {
        (self.seen(), self.written())
    }

    pub fn outcomes(&self) -> &[EntryOutcome] {
        &self.outcomes
    }
}

/// Download client for the current API generation.
pub struct Download {
    transport: Transport,
    host: String,
    config: DownloadConfig,
    token: Option<String>,
}

impl Download {
    pub fn new(config: &Config, token: Option<String>) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(&config.http)?,
            host: config.endpoint.host.clone(),
            config: config.download.clone(),
            token,
        })
    }

    fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(Error::MissingToken)
    }

    fn advanced_url(&self) -> String {
        format!("{}/api/download/v1/advanced", self.host)
    }

    /// Fetch an APT report PDF by its identifier.
    ///
    /// `None` means the service declined the request (unknown id,
    /// expired token); transport faults are errors.
    pub async fn pdf(&self, report: Uuid) -> Result<Option<Bytes>> {
        let token = self.require_token()?;

        let url = format!("{}/api/query/v1/aptnotes/pdf?uuid={}", self.host, report);
        match self.transport.send(&url, Some(token), None).await? {
            Reply::Body(bytes) => Ok(Some(bytes)),
            Reply::Denied(status) => {
                debug!(%report, status = status.as_u16(), "PDF not available");
                Ok(None)
            }
        }
    }

    /// List the feed manifest for `today - days_back`.
    pub async fn list(&self, days_back: u32) -> Result<ApiResult<ManifestData>> {
        let token = self.require_token()?.to_string();
        self.list_for_date(&token, &feed_date(days_back)).await
    }

    async fn list_for_date(&self, token: &str, date: &str) -> Result<ApiResult<ManifestData>> {
        let payload = Payload::Json(json!({
            "type": "all",
            "cursor": CURSOR_START,
            "token": token,
            "date": date,
        }));

        match self
            .transport
            .send(&self.advanced_url(), None, Some(&payload))
            .await?
        {
            Reply::Body(bytes) => Ok(decode_envelope(&bytes, OK)?),
            Reply::Denied(status) => Ok(ApiResult::Empty {
                status: Some(status.as_u16()),
            }),
        }
    }

    /// Download the full daily feed into `dir`.
    ///
    /// See [`Download::advanced_with`]; this variant runs without an
    /// external cancellation handle.
    pub async fn advanced(&self, dir: &Path, days_back: u32) -> Result<DownloadReport> {
        self.advanced_with(dir, days_back, CancellationToken::new())
            .await
    }

    /// Download the full daily feed into `dir`, stopping early if
    /// `cancel` fires.
    ///
    /// The manifest date is computed once and shared by the listing
    /// call and every per-entry fetch. Entries are fetched on a pool of
    /// `download.concurrency` workers; a mismatched, unavailable, or
    /// failed entry never aborts its siblings. Cancellation stops new
    /// fetches between entries; files already written stay on disk.
    pub async fn advanced_with(
        &self,
        dir: &Path,
        days_back: u32,
        cancel: CancellationToken,
    ) -> Result<DownloadReport> {
        let token = self.require_token()?.to_string();
        check_output_dir(dir)?;

        let date = feed_date(days_back);

        let manifest = match self.list_for_date(&token, &date).await? {
            ApiResult::Success(data) => data,
            ApiResult::ServiceError { code, message } => {
                return Err(Error::Service { code, message });
            }
            ApiResult::Empty { .. } => return Err(Error::ManifestUnavailable),
        };

        let files = manifest.files();
        info!(entries = files.len(), date = %date, "Feed manifest retrieved");

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks: JoinSet<(usize, EntryOutcome)> = JoinSet::new();
        let mut indexed: Vec<(usize, EntryOutcome)> = Vec::with_capacity(files.len());

        for (idx, file) in files.into_iter().enumerate() {
            if cancel.is_cancelled() {
                debug!(file = %file.file_name, "Cancelled before fetch");
                indexed.push((idx, cancelled_outcome(file)));
                continue;
            }

            let worker = EntryWorker {
                transport: self.transport.clone(),
                url: self.advanced_url(),
                token: token.clone(),
                date: date.clone(),
                dir: dir.to_path_buf(),
                retries: self.config.retries,
            };
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (idx, cancelled_outcome(file)),
                };
                if cancel.is_cancelled() {
                    return (idx, cancelled_outcome(file));
                }
                let outcome = worker.process(file).await;
                (idx, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => indexed.push(entry),
                Err(e) => error!(error = %e, "Download worker task failed"),
            }
        }

        indexed.sort_by_key(|(idx, _)| *idx);
        let report =
            DownloadReport::from_outcomes(indexed.into_iter().map(|(_, o)| o).collect());

        info!(
            seen = report.seen(),
            written = report.written(),
            "Bulk download finished"
        );

        Ok(report)
    }
}

fn cancelled_outcome(file: FeedFile) -> EntryOutcome {
    EntryOutcome {
        data_name: file.entry.data_name,
        file_name: file.file_name,
        status: EntryStatus::Cancelled,
    }
}

/// Everything one pooled task needs to fetch, verify, and persist a
/// single manifest entry.
struct EntryWorker {
    transport: Transport,
    url: String,
    token: String,
    date: String,
    dir: PathBuf,
    retries: u32,
}

impl EntryWorker {
    async fn process(&self, file: FeedFile) -> EntryOutcome {
        let mut attempts = 0;

        loop {
            attempts += 1;
            let status = self.attempt(&file).await;

            let retryable = matches!(
                status,
                EntryStatus::ChecksumMismatch { .. }
                    | EntryStatus::Unavailable { .. }
                    | EntryStatus::Failed { .. }
            );

            if retryable && attempts <= self.retries {
                debug!(file = %file.file_name, attempts, "Retrying entry");
                continue;
            }

            return EntryOutcome {
                data_name: file.entry.data_name,
                file_name: file.file_name,
                status,
            };
        }
    }

    async fn attempt(&self, file: &FeedFile) -> EntryStatus {
        let payload = Payload::Json(json!({
            "type": file.entry.data_name,
            "cursor": file.entry.cursor,
            "token": self.token,
            "date": self.date,
        }));

        let reply = match self.transport.send(&self.url, None, Some(&payload)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(file = %file.file_name, error = %e, "Entry fetch failed");
                return EntryStatus::Failed {
                    error: e.to_string(),
                };
            }
        };

        let bytes = match reply {
            Reply::Body(bytes) => bytes,
            Reply::Denied(status) => {
                debug!(file = %file.file_name, status = status.as_u16(), "Entry unavailable");
                return EntryStatus::Unavailable {
                    status: status.as_u16(),
                };
            }
        };

        let actual = checksum::md5_hex(&bytes);
        if !actual.eq_ignore_ascii_case(file.entry.md5.trim()) {
            debug!(
                file = %file.file_name,
                expected = %file.entry.md5,
                actual = %actual,
                "Checksum mismatch, file discarded"
            );
            return EntryStatus::ChecksumMismatch {
                expected: file.entry.md5.clone(),
                actual,
            };
        }

        let path = self.dir.join(&file.file_name);
        match tokio::fs::write(&path, &bytes).await {
            Ok(()) => {
                info!(file = %file.file_name, size = bytes.len(), "Feed file written");
                EntryStatus::Written
            }
            Err(e) => {
                warn!(file = %file.file_name, error = %e, "Write failed");
                EntryStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

/// The output directory must exist and be writable before any network
/// activity starts.
fn check_output_dir(dir: &Path) -> Result<()> {
    let metadata =
        std::fs::metadata(dir).map_err(|_| Error::NotADirectory(dir.to_path_buf()))?;

    if !metadata.is_dir() {
        return Err(Error::NotADirectory(dir.to_path_buf()));
    }

    if metadata.permissions().readonly() {
        return Err(Error::DirectoryNotWritable(dir.to_path_buf()));
    }

    Ok(())
}

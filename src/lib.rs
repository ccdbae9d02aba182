//! Client library for the Feedlab threat intelligence feed service.
//!
//! Two namespaces cover the API surface, sharing one HTTP primitive:
//!
//! - [`Query`] - indicator lookups: anonymous, token-authenticated,
//!   batch, APT actor search, and the cursor-paginated GBT fetch
//! - [`Download`] - report PDFs, the daily feed manifest, and the bulk
//!   verified download workflow
//!
//! The older API generation (base64 paths, form-encoded bodies) lives
//! in [`legacy`].
//!
//! # Example
//!
//! ```no_run
//! use feedlab::{Config, Download};
//!
//! # async fn run() -> Result<(), feedlab::Error> {
//! let config = Config::load()?;
//! let download = Download::new(&config, Some("my-token".into()))?;
//! let report = download.advanced("feeds/".as_ref(), 1).await?;
//! println!("{}/{} files written", report.written(), report.seen());
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod config;
pub mod download;
pub mod error;
pub mod legacy;
pub mod protocol;
pub mod query;
pub mod transport;

pub use config::Config;
pub use download::{Download, DownloadReport, EntryOutcome, EntryStatus};
pub use error::{Error, Result};
pub use protocol::{ApiResult, ManifestData, ManifestEntry, Observation};
pub use query::{AptFilter, Query};
pub use transport::Transport;

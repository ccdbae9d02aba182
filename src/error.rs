//! Crate-level error type.

use std::path::PathBuf;
use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum Error {
    /// Authenticated calls need a token before any network activity.
    #[error("this call requires an API token; request one from the feed service")]
    MissingToken,

    /// Bulk download target must be an existing directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Bulk download target must be writable.
    #[error("directory is not writable: {}", .0.display())]
    DirectoryNotWritable(PathBuf),

    /// The service answered but reported a logical failure.
    #[error("feed service error {code}: {message}")]
    Service { code: i64, message: String },

    /// The manifest listing produced no usable data at all.
    #[error("could not retrieve the feed manifest")]
    ManifestUnavailable,

    /// Cursor pagination exceeded the configured ceiling.
    #[error("pagination did not terminate within {pages} pages")]
    PaginationLimit { pages: u32 },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to load configuration: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

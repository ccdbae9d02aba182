use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Endpoint host must be an http(s) URL, got '{host}'")]
    InvalidHostScheme { host: String },

    #[error("Endpoint host must not end with '/': '{host}'")]
    TrailingSlashInHost { host: String },

    #[error("download.concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("query.max_pages must be at least 1")]
    ZeroMaxPages,

    #[error("http.request_timeout_secs must be positive")]
    ZeroRequestTimeout,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_endpoint(config)?;
    validate_limits(config)?;
    Ok(())
}

/// Endpoint URLs are joined with path segments, so the host must be a
/// bare scheme://authority prefix.
fn validate_endpoint(config: &Config) -> Result<(), ValidationError> {
    let host = &config.endpoint.host;

    if !host.starts_with("https://") && !host.starts_with("http://") {
        return Err(ValidationError::InvalidHostScheme { host: host.clone() });
    }

    if host.ends_with('/') {
        return Err(ValidationError::TrailingSlashInHost { host: host.clone() });
    }

    Ok(())
}

fn validate_limits(config: &Config) -> Result<(), ValidationError> {
    if config.download.concurrency == 0 {
        return Err(ValidationError::ZeroConcurrency);
    }

    if config.query.max_pages == 0 {
        return Err(ValidationError::ZeroMaxPages);
    }

    if config.http.request_timeout_secs == 0 {
        return Err(ValidationError::ZeroRequestTimeout);
    }

    Ok(())
}

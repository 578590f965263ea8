//! Unified error types for shellcache.
//!
//! Every variant renders with a stable upper-case code prefix so that hosts
//! can match on the kind of failure without parsing the message.

use tokio_rusqlite::rusqlite;

/// Unified error types for the caching worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty bucket name).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Only GET requests can be stored in a bucket.
    #[error("UNSUPPORTED_METHOD: {0}")]
    UnsupportedMethod(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored snapshot could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// Transport-level fetch failure (no response at all).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// HTTP response with a status that the caller refuses to accept.
    #[error("HTTP_ERROR: {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    /// Pre-population of the static bucket failed.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(Box<Error>),

    /// Navigation failed offline and neither the request nor the fallback document is cached.
    #[error("OFFLINE_NO_FALLBACK: {0}")]
    OfflineNoFallback(String),

    /// Lifecycle transition not allowed from the current state.
    #[error("INVALID_STATE: cannot {action} while {state}")]
    InvalidState { action: &'static str, state: String },
}

impl Error {
    /// Stable code prefix for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::UnsupportedMethod(_) => "UNSUPPORTED_METHOD",
            Error::Database(_) | Error::MigrationFailed(_) | Error::CorruptEntry(_) => "CACHE_ERROR",
            Error::Network(_) => "NETWORK_ERROR",
            Error::HttpStatus { .. } => "HTTP_ERROR",
            Error::InstallFailed(_) => "INSTALL_FAILED",
            Error::OfflineNoFallback(_) => "OFFLINE_NO_FALLBACK",
            Error::InvalidState { .. } => "INVALID_STATE",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptEntry(err.to_string())
    }
}

//! Error types for the edge-mirror proxy core

use thiserror::Error;

/// Result type alias for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Error types that can occur while handling a proxied request
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unmappable request path: {0}")]
    Mapping(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Range not satisfiable: start {start} beyond resource length {resource_len}")]
    RangeUnsatisfiable { start: u64, resource_len: u64 },

    #[error("Origin fetch failed: {status} - {message}")]
    Origin { status: u16, message: String },

    #[error("Origin fetch timed out after {0} seconds")]
    Timeout(u64),

    #[error("Cache write skipped: {0}")]
    CacheWriteSkipped(String),

    #[error("Cache read failed: {0}")]
    CacheReadError(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// Convert an error to the HTTP status code it surfaces as.
    ///
    /// Cache-layer errors never reach a client; they map to 500 here only as
    /// a backstop for callers that fail to absorb them.
    pub fn to_http_status(&self) -> u16 {
        match self {
            ProxyError::Mapping(_) => 404,
            ProxyError::UnknownPlatform(_) => 404,
            ProxyError::Parse(_) => 400,
            ProxyError::RangeUnsatisfiable { .. } => 416,
            ProxyError::Origin { .. } => 502,
            ProxyError::Timeout(_) => 504,
            ProxyError::Config(_) => 500,
            ProxyError::CacheWriteSkipped(_) => 500,
            ProxyError::CacheReadError(_) => 500,
            ProxyError::Internal(_) => 500,
        }
    }

    /// Whether this error is allowed to surface to the client.
    ///
    /// Only mapping, range, and origin failures are user-visible. Cache-layer
    /// failures must be absorbed by the coordinator (serve without caching)
    /// and reported through metrics instead.
    pub fn is_user_visible(&self) -> bool {
        match self {
            ProxyError::Mapping(_) => true,
            ProxyError::UnknownPlatform(_) => true,
            ProxyError::Parse(_) => true,
            ProxyError::RangeUnsatisfiable { .. } => true,
            ProxyError::Origin { .. } => true,
            ProxyError::Timeout(_) => true,

            ProxyError::CacheWriteSkipped(_) => false,
            ProxyError::CacheReadError(_) => false,

            ProxyError::Config(_) => false,
            ProxyError::Internal(_) => false,
        }
    }

    /// Create an Origin error from a status code and message
    pub fn origin(status: u16, message: impl Into<String>) -> Self {
        ProxyError::Origin {
            status,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Internal(err.to_string())
    }
}

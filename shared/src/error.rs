//! Error types for Copilot Demo API Lambda functions.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Copilot Demo API Lambda functions.
///
/// Every variant carries owned strings so a single failure can be handed to
/// several waiters of the same token refresh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Credentials rejected by the identity provider, or the directory API
    /// still rejects the token after one refresh.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Directory API throttled the request.
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<u64>,
    },

    /// Directory API failed (5xx, unexpected status, or timed out).
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The request could not complete; retryable by the caller.
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// A 2xx response whose body could not be decoded.
    #[error("Response format error: {0}")]
    ResponseFormat(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested feature is not available on this host.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Authentication(_) => 401,
            Error::NotFound(_) => 404,
            Error::RateLimited { .. } => 429,
            Error::Unsupported(_) => 501,
            Error::Upstream(_) | Error::ResponseFormat(_) => 502,
            Error::TransientNetwork(_) => 503,
            Error::Config(_) | Error::Aws(_) | Error::Io(_) => 500,
        }
    }

    /// Stable name of the error category, used as the `error` field of JSON
    /// error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Authentication(_) => "AuthenticationError",
            Error::NotFound(_) => "NotFound",
            Error::RateLimited { .. } => "RateLimited",
            Error::Upstream(_) => "UpstreamError",
            Error::TransientNetwork(_) => "TransientNetworkError",
            Error::ResponseFormat(_) => "ResponseFormatError",
            Error::Validation(_) => "ValidationError",
            Error::Unsupported(_) => "Unsupported",
            Error::Config(_) | Error::Aws(_) | Error::Io(_) => "InternalError",
        }
    }

    /// Seconds the caller should wait before retrying, when the upstream said so.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Error::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Human-readable message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            Error::RateLimited { message, .. } => message.clone(),
            Error::Authentication(m)
            | Error::NotFound(m)
            | Error::Upstream(m)
            | Error::TransientNetwork(m)
            | Error::ResponseFormat(m)
            | Error::Validation(m)
            | Error::Unsupported(m)
            | Error::Config(m)
            | Error::Aws(m)
            | Error::Io(m) => m.clone(),
        }
    }
}

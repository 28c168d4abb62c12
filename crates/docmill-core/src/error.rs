//! Error types for docmill.

use thiserror::Error;

/// Result type alias using docmill's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for conversion operations.
///
/// Every variant maps to a stable wire code via [`Error::code`]. Failures
/// that occur after a job is admitted become terminal job states; failures
/// detected before admission are returned to the caller directly.
#[derive(Error, Debug)]
pub enum Error {
    /// Out-of-range or contradictory conversion options
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Classifier could not resolve a document kind
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Payload exceeds the configured size ceiling
    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    /// Corrupt/malformed input or an internal extractor failure
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Required extractor capability is not present
    #[error("Extractor unavailable: {0}")]
    ExtractorUnavailable(String),

    /// Admission denied by the per-key rate limiter
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// Job exceeded its overall deadline
    #[error("Job exceeded deadline of {deadline_secs}s")]
    Timeout { deadline_secs: u64 },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (logged, never exposing detail to the caller)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code carried in every error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            Error::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Error::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Error::ExtractionFailed(_) => "PROCESSING_ERROR",
            Error::ExtractorUnavailable(_) => "EXTRACTOR_UNAVAILABLE",
            Error::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Error::Timeout { .. } => "TIMEOUT",
            Error::Serialization(_) => "PROCESSING_ERROR",
            Error::Io(_) => "INTERNAL_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Seconds the caller should wait before retrying, for rate-limit errors.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Error::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

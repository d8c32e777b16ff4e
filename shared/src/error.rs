//! Error types for the studio edge functions.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling an edge function request.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller exceeded its request budget for the current window
    #[error("Too many requests, retry in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// Request body failed schema validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Exchange-rate provider or object storage failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Target currency missing from the provider's rate table
    #[error("Currency {0} is not supported")]
    UnsupportedCurrency(String),

    /// Decoded payload exceeds the upload ceiling
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Payload is not valid base64
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RateLimited { .. } => 429,
            Error::Validation(_) | Error::UnsupportedCurrency(_) | Error::InvalidEncoding(_) => 400,
            Error::NotFound(_) => 404,
            Error::PayloadTooLarge(_) => 413,
            _ => 500,
        }
    }

    /// Whether the failure was caused by the caller rather than by us or an upstream.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Upstream(error.to_string())
    }
}

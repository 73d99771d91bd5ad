//! Error types for the catalog client.

use std::time::Duration;

/// Errors that can occur when talking to the catalog.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error raised by the retry middleware stack
    #[error("HTTP request error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// Entity or tag not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication failed (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Permission denied (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Rate limited (429)
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Optional retry-after duration from server
        retry_after: Option<Duration>,
    },

    /// Conflict (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other 4xx, e.g. a malformed patch document (400)
    #[error("Request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Error message from server
        message: String,
    },

    /// Server error (5xx)
    #[error("Server error ({status}): {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Error message from server
        message: String,
    },

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// URL parsing or host resolution error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::RateLimited { .. } => true,
            ClientError::ServerError { status, .. } => *status >= 500,
            ClientError::Http(e) => e.is_timeout() || e.is_connect(),
            ClientError::HttpMiddleware(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns true for a 404 response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::NotFound(_) => Some(404),
            ClientError::Unauthorized(_) => Some(401),
            ClientError::Forbidden(_) => Some(403),
            ClientError::Conflict(_) => Some(409),
            ClientError::RateLimited { .. } => Some(429),
            ClientError::Rejected { status, .. } | ClientError::ServerError { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

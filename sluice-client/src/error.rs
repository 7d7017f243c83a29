//! Error types for the sluice clients

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error codes the services use to signal rate limiting
const THROTTLING_CODES: &[&str] = &[
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "SlowDown",
];

/// Errors that can occur when talking to the control plane or object store
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed")]
    RequestFailed(#[from] reqwest::Error),

    /// Service returned an error status code
    #[error("API error (status {status}, code {code}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Service error code, e.g. `ValidationException`
        code: String,
        /// Error message from the service
        message: String,
    },

    /// Service asked us to slow down
    #[error("request throttled: {message}")]
    Throttled { message: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Classifies an error response by status and service error code
    pub fn from_response(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();

        if status == 429 || THROTTLING_CODES.contains(&code.as_str()) {
            return Self::Throttled { message };
        }
        if status == 404 {
            return Self::NotFound(message);
        }

        Self::ApiError {
            status,
            code,
            message,
        }
    }

    /// Check if this error means the caller should back off and retry
    pub fn is_throttling(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self, Self::ApiError { status: 404, .. })
    }
}

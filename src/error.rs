// Error handling module
// Defines the client-side error taxonomy

use thiserror::Error;

/// Errors that can occur while talking to the LexMedica API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (bad login, malformed token)
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Token refresh failed terminally; credentials have been evicted
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Error response from the LexMedica API
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[allow(dead_code)]
    ConfigError(String),

    /// Internal client error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// HTTP status of the failure, when one was received
    #[allow(dead_code)]
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;

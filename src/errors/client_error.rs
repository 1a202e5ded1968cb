use thiserror::Error;

use super::api_error::{ApiError, ValidationError};
use crate::config::ConfigError;

/// Errors produced by the client, both for streaming sessions and unary requests.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Dialing the socket or the opening handshake failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A deadline elapsed (connect, request)
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// A socket read or write failed mid-session
    #[error("Transport error: {0}")]
    Transport(String),

    /// An inbound frame could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The caller's audio sink rejected a write
    #[error("Audio sink error: {0}")]
    AudioSink(String),

    /// An outbound message could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid client or request configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// 400/401 response with a structured body
    #[error("API error: {0}")]
    Api(ApiError),

    /// 422 response with a structured body
    #[error("Validation error: {0}")]
    Validation(ValidationError),

    /// Any other non-200 response
    #[error("Unexpected HTTP status {status} {reason}")]
    HttpStatus { status: u16, reason: String },

    /// The HTTP client failed before a response was received
    #[error("HTTP error: {0}")]
    Http(String),
}

impl ClientError {
    /// Returns true for faults raised by the socket itself rather than by the
    /// payload or the caller's sinks.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::Transport(_) | Self::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfiguration(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

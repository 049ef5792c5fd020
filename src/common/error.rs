//! Error types for the station simulator
//!
//! Scenario verdicts are not errors: a reply that fails validation is a
//! [`Rejection`](crate::usecases::Rejection). The variants here cover the
//! things that stop the simulator from talking to the CSMS at all.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the station simulator
#[derive(Error, Debug)]
pub enum Error {
    // === Catalog Errors ===
    #[error("Use case '{0}' not found. Use 'station-sim list' to see registered use cases")]
    UseCaseNotFound(String),

    #[error("Use case '{0}' is already registered")]
    DuplicateUseCase(String),

    #[error("{failed} of {total} use cases did not pass")]
    ScenariosFailed { failed: usize, total: usize },

    // === Connection Errors ===
    #[error("Failed to connect to CSMS at {url}: {error}")]
    ConnectionFailed { url: String, error: String },

    #[error("Invalid CSMS URL: {0}")]
    InvalidUrl(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection closed by CSMS")]
    ConnectionClosed,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    // === Protocol Errors ===
    #[error("Malformed OCPP message: {0}")]
    MalformedMessage(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a connection failed error
    pub fn connection_failed(url: &str, error: impl ToString) -> Self {
        Self::ConnectionFailed {
            url: url.to_string(),
            error: error.to_string(),
        }
    }

    /// Create a malformed message error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage(reason.into())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match e {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Error::ConnectionClosed,
            other => Error::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_code() {
        let e = Error::UseCaseNotFound("Z99".to_string());
        assert!(e.to_string().contains("Z99"));
    }

    #[test]
    fn test_closed_websocket_maps_to_connection_closed() {
        let e: Error = tokio_tungstenite::tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(e, Error::ConnectionClosed));
    }
}

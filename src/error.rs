//! Error types for the congestion monitor

use thiserror::Error;

/// Errors that can occur while configuring or running the monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Malformed detection: {0}")]
    MalformedDetection(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse observation: {0}")]
    ParseError(String),

    #[error("Notification transport failed: {0}")]
    Transport(String),
}

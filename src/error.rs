//! Error types for eventlink.

use thiserror::Error;

use crate::protocol::ParseError;
use crate::transport::WriteError;

/// Main error type for all eventlink operations.
#[derive(Debug, Error)]
pub enum EventLinkError {
    /// Event name or payload exceeds its wire capacity (caller bug).
    #[error("{field} is {len} bytes, maximum is {max}")]
    FrameTooLarge {
        /// Which segment overflowed (`"event name"` or `"payload"`).
        field: &'static str,
        /// Actual byte length before stuffing.
        len: usize,
        /// Maximum allowed byte length.
        max: usize,
    },

    /// Malformed inbound bytes.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Transport rejected a chunk of an outbound buffer.
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    /// A registered handler reported failure.
    #[error("Handler error: {0}")]
    Handler(String),

    /// No transport connection is available.
    #[error("Not connected")]
    NotConnected,

    /// JSON serialization/deserialization error (payload codec and config).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Config error: {0}")]
    Config(String),
}

impl EventLinkError {
    /// Convenience constructor for handler failures.
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }
}

/// Result type alias using EventLinkError.
pub type Result<T> = std::result::Result<T, EventLinkError>;

//! Error types for Dax
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::protocol::ProtocolError;

/// Result type alias using DaxError
pub type Result<T> = std::result::Result<T, DaxError>;

/// Unified error type for Dax operations
#[derive(Debug, Error)]
pub enum DaxError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("Connection to server lost")]
    Disconnected,

    #[error("Gave up reconnecting after {attempts} attempts")]
    GaveUp { attempts: u32 },

    #[error("Client is no longer running")]
    ClientStopped,

    #[error("Timed out waiting for a response")]
    TimedOut,

    // -------------------------------------------------------------------------
    // Response Errors
    // -------------------------------------------------------------------------
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Server error: {0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DaxError {
    /// Whether the error came from the peer hanging up rather than a fault.
    pub fn is_disconnect(&self) -> bool {
        match self {
            DaxError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            DaxError::Disconnected => true,
            _ => false,
        }
    }
}

//! Error handling module
//!
//! This module defines the error types and result type aliases used in the relay.

use thiserror::Error;
use std::io;

use crate::relay::{ConnId, Role};

/// Rendezvous relay error type
#[derive(Error, Debug)]
pub enum RelayError {
    /// IO error on a connection or the listener
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Identifier or role token missing, truncated, over-long or unrecognized
    #[error("Malformed handshake: {0}")]
    MalformedHandshake(String),

    /// The role slot for this identifier already holds a connection
    #[error("Slot occupied: {role} for {id}")]
    SlotOccupied {
        /// Identifier whose slot was taken
        id: ConnId,
        /// Role that was requested
        role: Role,
    },

    /// Registration against an identifier that has no pairing record
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(ConnId),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

impl RelayError {
    /// Whether the error was caused by the client rather than the relay
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedHandshake(_) | Self::SlotOccupied { .. })
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `RelayError`.
pub type Result<T> = std::result::Result<T, RelayError>;

//! Error types for the IMAP client.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Host name is not usable for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// A server response could not be parsed.
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Byte offset into the response line.
        position: usize,
        /// What was expected.
        message: String,
    },

    /// Server answered a command with NO.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server answered a command with BAD.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Server closed the session with BYE.
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Connect, read or write took too long.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Command not allowed in the current protocol state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Server sent something the client cannot handle.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns `true` if the server rejected the command but the
    /// connection is still usable.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::No(_) | Self::Bad(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

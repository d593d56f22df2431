//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Host name is not usable for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Malformed reply.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Credentials were rejected.
    #[error("Authentication failed ({code}): {message}")]
    Auth {
        /// Reply code, usually 535.
        code: u16,
        /// Server text.
        message: String,
    },

    /// Server refused a command.
    #[error("SMTP error {code}: {message}")]
    Rejected {
        /// Reply code (e.g. 550).
        code: u16,
        /// Server text.
        message: String,
    },

    /// Connect, read or write took too long.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Feature not offered by the server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),
}

impl Error {
    /// Creates a rejection from a reply code and message.
    #[must_use]
    pub fn rejected(code: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    /// Returns the reply code for server-side failures.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Rejected { code, .. } | Self::Auth { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self.code(), Some(500..=599))
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.code(), Some(400..=499))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::rejected(550, "no such user").is_permanent());
        assert!(Error::rejected(451, "try later").is_transient());
        let auth = Error::Auth {
            code: 535,
            message: "bad credentials".to_string(),
        };
        assert_eq!(auth.code(), Some(535));
        assert!(!Error::Parse("x".to_string()).is_permanent());
    }
}

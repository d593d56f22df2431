//! Error types for the core library.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by sessions, mailbox operations and the service API.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field is missing or malformed. Reported before any I/O.
    #[error("{field}: {message}")]
    Validation {
        /// Offending request field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The caller has no session.
    #[error("Not authenticated: {0}")]
    Auth(String),

    /// Establishing a connection failed (DNS, TLS, credentials).
    #[error("Connection failed: {0}")]
    Connection(String),

    /// An operation on an established connection failed.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An operation did not finish in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Creates a "field is required" validation error.
    #[must_use]
    pub fn missing(field: &'static str) -> Self {
        Self::validation(field, "is required")
    }

    /// HTTP-style status for the service envelope.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Auth(_) => 401,
            Self::Connection(_) | Self::Protocol(_) | Self::Timeout(_) => 502,
        }
    }

    /// Re-labels a failure that happened while connecting.
    #[must_use]
    pub fn into_connection(self) -> Self {
        match self {
            Self::Protocol(message) => Self::Connection(message),
            Self::Timeout(limit) => Self::Connection(format!("timed out after {limit:?}")),
            other => other,
        }
    }
}

impl From<mailbridge_imap::Error> for Error {
    fn from(error: mailbridge_imap::Error) -> Self {
        match error {
            mailbridge_imap::Error::Timeout(limit) => Self::Timeout(limit),
            other => Self::Protocol(other.to_string()),
        }
    }
}

impl From<mailbridge_smtp::Error> for Error {
    fn from(error: mailbridge_smtp::Error) -> Self {
        match error {
            mailbridge_smtp::Error::Timeout(limit) => Self::Timeout(limit),
            mailbridge_smtp::Error::InvalidAddress(message) => Self::validation("to", message),
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    fn test_status_codes() {
        assert_eq!(Error::missing("email").status_code(), 400);
        assert_eq!(Error::Auth("no session".to_string()).status_code(), 401);
        assert_eq!(Error::Connection("refused".to_string()).status_code(), 502);
        assert_eq!(Error::Timeout(Duration::from_secs(1)).status_code(), 502);
    }

    #[test]
    fn test_adapter_conversions() {
        let imap: Error = mailbridge_imap::Error::No("no such mailbox".to_string()).into();
        assert!(matches!(imap, Error::Protocol(ref m) if m.contains("no such mailbox")));

        let timeout: Error = mailbridge_imap::Error::Timeout(Duration::from_secs(60)).into();
        assert!(matches!(timeout, Error::Timeout(_)));
        assert!(matches!(timeout.into_connection(), Error::Connection(_)));

        let smtp: Error = mailbridge_smtp::Error::rejected(550, "no such user").into();
        assert_eq!(smtp.status_code(), 502);
    }

    #[test]
    fn test_display() {
        assert_eq!(Error::missing("password").to_string(), "password: is required");
    }
}

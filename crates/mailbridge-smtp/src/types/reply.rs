//! SMTP reply types.

use crate::error::Error;

/// SMTP reply from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Text of each reply line without code and separator.
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(code: ReplyCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns true for 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns the text as one string.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Converts a non-2xx reply into [`Error::Rejected`].
    ///
    /// # Errors
    ///
    /// Returns the rejection when the reply is not a success.
    pub fn into_success(self) -> Result<Self, Error> {
        self.expect_code(|code| code.is_success())
    }

    /// Converts a reply whose code fails `accept` into [`Error::Rejected`].
    ///
    /// # Errors
    ///
    /// Returns the rejection when `accept` returns `false`.
    pub fn expect_code(self, accept: impl FnOnce(ReplyCode) -> bool) -> Result<Self, Error> {
        if accept(self.code) {
            Ok(self)
        } else {
            Err(Error::rejected(self.code.as_u16(), self.text()))
        }
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 Service ready.
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Closing channel.
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded.
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 250 Completed.
    pub const OK: Self = Self(250);
    /// 354 Start mail input.
    pub const START_DATA: Self = Self(354);
    /// 535 Credentials invalid.
    pub const AUTH_FAILED: Self = Self(535);

    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// 2xx.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// 4xx.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// 5xx.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
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
    fn test_into_success() {
        let ok = Reply::new(ReplyCode::OK, vec!["done".to_string()]);
        assert!(ok.into_success().is_ok());

        let rejected = Reply::new(
            ReplyCode::new(550),
            vec!["5.1.1 no such".to_string(), "user".to_string()],
        );
        match rejected.into_success() {
            Err(Error::Rejected { code, message }) => {
                assert_eq!(code, 550);
                assert_eq!(message, "5.1.1 no such\nuser");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_expect_code() {
        let reply = Reply::new(ReplyCode::START_DATA, vec!["go ahead".to_string()]);
        assert!(reply.clone().into_success().is_err());
        assert!(reply.expect_code(|c| c == ReplyCode::START_DATA).is_ok());
    }

    #[test]
    fn test_classes() {
        assert!(ReplyCode::new(421).is_transient());
        assert!(ReplyCode::AUTH_FAILED.is_permanent());
        assert_eq!(ReplyCode::CLOSING.to_string(), "221");
    }
}

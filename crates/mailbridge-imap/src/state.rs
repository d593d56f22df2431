//! Protocol state tracking (RFC 9051 section 3).
//!
//! The client keeps one [`ProtocolState`] and checks it before each
//! command, so a mailbox operation issued before login or after logout
//! fails locally with [`Error::InvalidState`] instead of reaching the
//! server.

use crate::{Error, Result};

/// Connection state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProtocolState {
    /// Greeting received, credentials not yet accepted.
    #[default]
    NotAuthenticated,
    /// Logged in, no mailbox open.
    Authenticated,
    /// A mailbox is open.
    Selected(SelectedState),
    /// BYE received or LOGOUT completed.
    Logout,
}

/// The mailbox opened by SELECT or EXAMINE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedState {
    /// Mailbox name as sent to the server.
    pub mailbox: String,
    /// `true` after EXAMINE or a READ-ONLY response code.
    pub read_only: bool,
}

impl ProtocolState {
    /// Returns `true` when logged in, with or without an open mailbox.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected(_))
    }

    /// Returns the open mailbox, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&SelectedState> {
        match self {
            Self::Selected(state) => Some(state),
            _ => None,
        }
    }

    /// Fails unless the connection is waiting for credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] in any other state.
    pub fn require_not_authenticated(&self) -> Result<()> {
        match self {
            Self::NotAuthenticated => Ok(()),
            other => Err(Error::InvalidState(format!("already past login ({other:?})"))),
        }
    }

    /// Fails unless logged in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] before login or after logout.
    pub fn require_authenticated(&self) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(Error::InvalidState(format!("not logged in ({self:?})")))
        }
    }

    /// Fails unless a mailbox is open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when no mailbox is selected.
    pub fn require_selected(&self) -> Result<&SelectedState> {
        self.selected()
            .ok_or_else(|| Error::InvalidState(format!("no mailbox selected ({self:?})")))
    }

    /// Fails unless the open mailbox accepts changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when nothing is selected or the
    /// mailbox was opened read-only.
    pub fn require_writable(&self) -> Result<&SelectedState> {
        let selected = self.require_selected()?;
        if selected.read_only {
            return Err(Error::InvalidState(format!(
                "mailbox {} is open read-only",
                selected.mailbox
            )));
        }
        Ok(selected)
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

    fn selected(read_only: bool) -> ProtocolState {
        ProtocolState::Selected(SelectedState {
            mailbox: "INBOX".to_string(),
            read_only,
        })
    }

    #[test]
    fn test_default_is_not_authenticated() {
        let state = ProtocolState::default();
        assert!(state.require_not_authenticated().is_ok());
        assert!(state.require_authenticated().is_err());
    }

    #[test]
    fn test_selected_is_authenticated() {
        assert!(selected(false).is_authenticated());
        assert!(!ProtocolState::Logout.is_authenticated());
        assert_eq!(selected(true).selected().unwrap().mailbox, "INBOX");
    }

    #[test]
    fn test_require_writable() {
        assert!(selected(false).require_writable().is_ok());
        assert!(matches!(
            selected(true).require_writable(),
            Err(Error::InvalidState(_))
        ));
        assert!(ProtocolState::Authenticated.require_writable().is_err());
    }
}

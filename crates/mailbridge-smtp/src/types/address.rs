//! Envelope addresses.

use crate::error::{Error, Result};

/// Bare address as used in MAIL FROM and RCPT TO.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Validates and wraps an address. Surrounding whitespace and angle
    /// brackets are removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] unless the address has exactly one
    /// `@` with non-empty sides and no whitespace or control characters.
    pub fn new(addr: impl AsRef<str>) -> Result<Self> {
        let addr = addr.as_ref().trim();
        let addr = addr
            .strip_prefix('<')
            .and_then(|a| a.strip_suffix('>'))
            .unwrap_or(addr);

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress(format!("{addr:?} has no @")));
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(Error::InvalidAddress(format!("{addr:?} is malformed")));
        }
        if addr
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>')
        {
            return Err(Error::InvalidAddress(format!(
                "{addr:?} contains forbidden characters"
            )));
        }
        Ok(Self(addr.to_string()))
    }

    /// Returns the address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Domain part.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, d)| d)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sender and recipients of one mail transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// MAIL FROM.
    pub from: Address,
    /// RCPT TO, in order.
    pub to: Vec<Address>,
}

impl Envelope {
    /// Builds an envelope from raw address strings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] for any malformed address or an
    /// empty recipient list.
    pub fn new<I, S>(from: &str, to: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let to = to.into_iter().map(Address::new).collect::<Result<Vec<_>>>()?;
        if to.is_empty() {
            return Err(Error::InvalidAddress("no recipients".to_string()));
        }
        Ok(Self {
            from: Address::new(from)?,
            to,
        })
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
    fn test_valid_addresses() {
        assert_eq!(Address::new("a@b.c").unwrap().as_str(), "a@b.c");
        assert_eq!(Address::new(" <a@b.c> ").unwrap().as_str(), "a@b.c");
        assert_eq!(Address::new("a@b.c").unwrap().domain(), "b.c");
    }

    #[test]
    fn test_invalid_addresses() {
        for bad in ["", "nobody", "@b.c", "a@", "a@b@c", "a b@c.d", "a@c.d\r\nRCPT"] {
            assert!(Address::new(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn test_envelope() {
        let envelope = Envelope::new("me@x.org", ["a@y.org", "b@y.org"]).unwrap();
        assert_eq!(envelope.to.len(), 2);
        assert!(Envelope::new("me@x.org", Vec::<String>::new()).is_err());
    }
}

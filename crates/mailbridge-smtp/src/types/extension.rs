//! EHLO extensions.

/// Extension announced in the EHLO reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS.
    StartTls,
    /// AUTH with the offered mechanisms.
    Auth(Vec<AuthMechanism>),
    /// SIZE with the optional limit.
    Size(Option<usize>),
    /// 8BITMIME.
    EightBitMime,
    /// PIPELINING.
    Pipelining,
    /// SMTPUTF8.
    SmtpUtf8,
    /// Anything else, verbatim.
    Unknown(String),
}

impl Extension {
    /// Parses one EHLO line after the greeting line.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(words.filter_map(AuthMechanism::parse).collect()),
            "SIZE" => Self::Size(words.next().and_then(|s| s.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// SASL mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN.
    Plain,
    /// LOGIN.
    Login,
    /// `XOAUTH2`.
    XOAuth2,
}

impl AuthMechanism {
    /// Parses a mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "XOAUTH2" => Some(Self::XOAuth2),
            _ => None,
        }
    }

    /// Mechanism name on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::XOAuth2 => "XOAUTH2",
        }
    }
}

/// Extensions from the last EHLO.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    /// First word of the EHLO reply.
    pub hostname: String,
    /// Announced extensions.
    pub extensions: Vec<Extension>,
}

impl ServerInfo {
    /// Builds server info from EHLO reply lines.
    #[must_use]
    pub fn from_ehlo(lines: &[String]) -> Self {
        let hostname = lines
            .first()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        Self {
            hostname,
            extensions: lines.iter().skip(1).map(|l| Extension::parse(l)).collect(),
        }
    }

    /// Returns true if STARTTLS was announced.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.extensions.contains(&Extension::StartTls)
    }

    /// Offered SASL mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> &[AuthMechanism] {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Announced message size limit.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
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
    fn test_parse_extensions() {
        assert_eq!(Extension::parse("starttls"), Extension::StartTls);
        assert_eq!(
            Extension::parse("AUTH PLAIN LOGIN CRAM-MD5"),
            Extension::Auth(vec![AuthMechanism::Plain, AuthMechanism::Login])
        );
        assert_eq!(Extension::parse("SIZE 35882577"), Extension::Size(Some(35_882_577)));
        assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
        assert_eq!(
            Extension::parse("X-CUSTOM a"),
            Extension::Unknown("X-CUSTOM a".to_string())
        );
    }

    #[test]
    fn test_server_info() {
        let lines: Vec<String> = [
            "smtp.example.com at your service",
            "SIZE 1000",
            "STARTTLS",
            "AUTH PLAIN",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        let info = ServerInfo::from_ehlo(&lines);
        assert_eq!(info.hostname, "smtp.example.com");
        assert!(info.supports_starttls());
        assert_eq!(info.auth_mechanisms(), &[AuthMechanism::Plain]);
        assert_eq!(info.max_message_size(), Some(1000));
    }
}

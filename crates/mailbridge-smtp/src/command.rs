//! SMTP commands.

use crate::types::{Address, AuthMechanism};

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO.
    Ehlo {
        /// Client host name.
        hostname: String,
    },
    /// STARTTLS.
    StartTls,
    /// AUTH with an optional initial response (SASL-IR).
    Auth {
        /// Mechanism.
        mechanism: AuthMechanism,
        /// Base64 initial response.
        initial_response: Option<String>,
    },
    /// MAIL FROM.
    MailFrom {
        /// Sender.
        from: Address,
        /// SIZE parameter.
        size: Option<usize>,
    },
    /// RCPT TO.
    RcptTo {
        /// Recipient.
        to: Address,
    },
    /// DATA.
    Data,
    /// RSET.
    Rset,
    /// NOOP.
    Noop,
    /// QUIT.
    Quit,
}

impl Command {
    /// Serializes the command, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let line = match self {
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".to_string(),
            Self::Auth {
                mechanism,
                initial_response: Some(response),
            } => format!("AUTH {} {response}", mechanism.as_str()),
            Self::Auth {
                mechanism,
                initial_response: None,
            } => format!("AUTH {}", mechanism.as_str()),
            Self::MailFrom {
                from,
                size: Some(size),
            } => format!("MAIL FROM:<{from}> SIZE={size}"),
            Self::MailFrom { from, size: None } => format!("MAIL FROM:<{from}>"),
            Self::RcptTo { to } => format!("RCPT TO:<{to}>"),
            Self::Data => "DATA".to_string(),
            Self::Rset => "RSET".to_string(),
            Self::Noop => "NOOP".to_string(),
            Self::Quit => "QUIT".to_string(),
        };
        let mut buf = line.into_bytes();
        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Command verb for logging; AUTH payloads never appear.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } => "AUTH",
            Self::MailFrom { .. } => "MAIL",
            Self::RcptTo { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
        }
    }
}

/// Prepares message content for DATA: normalizes line endings to CRLF,
/// doubles leading dots and appends the terminating `.` line.
#[must_use]
pub fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 64);
    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);

    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }
    out.extend_from_slice(b".\r\n");
    out
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

    fn wire(command: &Command) -> String {
        String::from_utf8(command.serialize()).unwrap()
    }

    #[test]
    fn test_serialize() {
        let from = Address::new("me@x.org").unwrap();
        assert_eq!(
            wire(&Command::MailFrom {
                from: from.clone(),
                size: None
            }),
            "MAIL FROM:<me@x.org>\r\n"
        );
        assert_eq!(
            wire(&Command::MailFrom {
                from,
                size: Some(120)
            }),
            "MAIL FROM:<me@x.org> SIZE=120\r\n"
        );
        assert_eq!(
            wire(&Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some("AGEAYg==".to_string())
            }),
            "AUTH PLAIN AGEAYg==\r\n"
        );
        assert_eq!(wire(&Command::Quit), "QUIT\r\n");
    }

    #[test]
    fn test_name_hides_credentials() {
        let auth = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some("c2VjcmV0".to_string()),
        };
        assert_eq!(auth.name(), "AUTH");
    }

    #[test]
    fn test_dot_stuff() {
        assert_eq!(
            dot_stuff(b"Subject: x\n\n.hidden\r\nend\n"),
            b"Subject: x\r\n\r\n..hidden\r\nend\r\n.\r\n"
        );
        assert_eq!(dot_stuff(b""), b".\r\n");
        assert_eq!(dot_stuff(b"."), b"..\r\n.\r\n");
    }
}

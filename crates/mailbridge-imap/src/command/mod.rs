//! IMAP commands and their wire serialization.

mod tag;

use std::fmt;

use crate::types::{Flag, SequenceSet};

pub use tag::TagGenerator;

/// A FETCH data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `UID`.
    Uid,
    /// `FLAGS`.
    Flags,
    /// `INTERNALDATE`.
    InternalDate,
    /// `RFC822.SIZE`.
    Rfc822Size,
    /// `BODY.PEEK[section]<start.length>`, which does not set `\Seen`.
    BodyPeek {
        /// Section specifier, empty for the whole message.
        section: String,
        /// Optional `(start, length)` partial range.
        partial: Option<(u32, u32)>,
    },
}

impl FetchAttribute {
    /// `BODY.PEEK[section]` without a partial range.
    #[must_use]
    pub fn body_peek(section: impl Into<String>) -> Self {
        Self::BodyPeek {
            section: section.into(),
            partial: None,
        }
    }

    /// `BODY.PEEK[HEADER.FIELDS (...)]` for the given header names.
    #[must_use]
    pub fn header_fields(names: &[&str]) -> Self {
        Self::body_peek(format!("HEADER.FIELDS ({})", names.join(" ").to_uppercase()))
    }
}

impl fmt::Display for FetchAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uid => f.write_str("UID"),
            Self::Flags => f.write_str("FLAGS"),
            Self::InternalDate => f.write_str("INTERNALDATE"),
            Self::Rfc822Size => f.write_str("RFC822.SIZE"),
            Self::BodyPeek { section, partial } => {
                write!(f, "BODY.PEEK[{section}]")?;
                if let Some((start, length)) = partial {
                    write!(f, "<{start}.{length}>")?;
                }
                Ok(())
            }
        }
    }
}

/// How STORE changes the flags of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// `+FLAGS`.
    Add(Vec<Flag>),
    /// `-FLAGS`.
    Remove(Vec<Flag>),
    /// `FLAGS`.
    Replace(Vec<Flag>),
}

impl StoreAction {
    fn keyword(&self) -> &'static str {
        match self {
            Self::Add(_) => "+FLAGS",
            Self::Remove(_) => "-FLAGS",
            Self::Replace(_) => "FLAGS",
        }
    }

    fn flags(&self) -> &[Flag] {
        match self {
            Self::Add(flags) | Self::Remove(flags) | Self::Replace(flags) => flags,
        }
    }
}

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY.
    Capability,
    /// NOOP.
    Noop,
    /// LOGOUT.
    Logout,
    /// STARTTLS.
    StartTls,
    /// LOGIN.
    Login {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// LIST.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// SELECT.
    Select {
        /// Mailbox to open read-write.
        mailbox: String,
    },
    /// EXAMINE.
    Examine {
        /// Mailbox to open read-only.
        mailbox: String,
    },
    /// FETCH or UID FETCH.
    Fetch {
        /// Messages to fetch.
        sequence: SequenceSet,
        /// Data items.
        items: Vec<FetchAttribute>,
        /// Interpret `sequence` as UIDs.
        uid: bool,
    },
    /// STORE or UID STORE.
    Store {
        /// Messages to change.
        sequence: SequenceSet,
        /// Flag change.
        action: StoreAction,
        /// Interpret `sequence` as UIDs.
        uid: bool,
        /// Suppress the untagged FETCH echo.
        silent: bool,
    },
    /// COPY or UID COPY.
    Copy {
        /// Messages to copy.
        sequence: SequenceSet,
        /// Destination mailbox.
        mailbox: String,
        /// Interpret `sequence` as UIDs.
        uid: bool,
    },
    /// MOVE or UID MOVE (RFC 6851).
    Move {
        /// Messages to move.
        sequence: SequenceSet,
        /// Destination mailbox.
        mailbox: String,
        /// Interpret `sequence` as UIDs.
        uid: bool,
    },
    /// EXPUNGE.
    Expunge,
    /// CLOSE.
    Close,
}

impl Command {
    /// Serializes the command with the given tag, CRLF included.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Capability => buf.extend_from_slice(b"CAPABILITY"),
            Self::Noop => buf.extend_from_slice(b"NOOP"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
            Self::StartTls => buf.extend_from_slice(b"STARTTLS"),
            Self::Expunge => buf.extend_from_slice(b"EXPUNGE"),
            Self::Close => buf.extend_from_slice(b"CLOSE"),
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }
            Self::List { reference, pattern } => {
                buf.extend_from_slice(b"LIST ");
                write_astring(&mut buf, reference);
                buf.push(b' ');
                write_astring(&mut buf, pattern);
            }
            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_astring(&mut buf, mailbox);
            }
            Self::Examine { mailbox } => {
                buf.extend_from_slice(b"EXAMINE ");
                write_astring(&mut buf, mailbox);
            }
            Self::Fetch {
                sequence,
                items,
                uid,
            } => {
                write_uid_prefix(&mut buf, *uid);
                buf.extend_from_slice(format!("FETCH {sequence} ").as_bytes());
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                if items.len() == 1 {
                    buf.extend_from_slice(items[0].as_bytes());
                } else {
                    buf.extend_from_slice(format!("({})", items.join(" ")).as_bytes());
                }
            }
            Self::Store {
                sequence,
                action,
                uid,
                silent,
            } => {
                write_uid_prefix(&mut buf, *uid);
                let silent = if *silent { ".SILENT" } else { "" };
                let flags: Vec<&str> = action.flags().iter().map(Flag::as_str).collect();
                buf.extend_from_slice(
                    format!(
                        "STORE {sequence} {}{silent} ({})",
                        action.keyword(),
                        flags.join(" ")
                    )
                    .as_bytes(),
                );
            }
            Self::Copy {
                sequence,
                mailbox,
                uid,
            } => {
                write_uid_prefix(&mut buf, *uid);
                buf.extend_from_slice(format!("COPY {sequence} ").as_bytes());
                write_astring(&mut buf, mailbox);
            }
            Self::Move {
                sequence,
                mailbox,
                uid,
            } => {
                write_uid_prefix(&mut buf, *uid);
                buf.extend_from_slice(format!("MOVE {sequence} ").as_bytes());
                write_astring(&mut buf, mailbox);
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Returns the command name for logging; credentials never appear.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::List { .. } => "LIST",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
            Self::Copy { .. } => "COPY",
            Self::Move { .. } => "MOVE",
            Self::Expunge => "EXPUNGE",
            Self::Close => "CLOSE",
        }
    }
}

fn write_uid_prefix(buf: &mut Vec<u8>, uid: bool) {
    if uid {
        buf.extend_from_slice(b"UID ");
    }
}

/// Writes an atom when possible, a quoted string otherwise.
fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b >= 0x7F
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
        String::from_utf8(command.serialize("A0001")).unwrap()
    }

    #[test]
    fn test_login_quotes_when_needed() {
        let command = Command::Login {
            username: "user@example.com".to_string(),
            password: "p\"a ss".to_string(),
        };
        assert_eq!(wire(&command), "A0001 LOGIN user@example.com \"p\\\"a ss\"\r\n");
        assert_eq!(command.name(), "LOGIN");
    }

    #[test]
    fn test_list_and_select() {
        let list = Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
        };
        assert_eq!(wire(&list), "A0001 LIST \"\" \"*\"\r\n");

        let select = Command::Examine {
            mailbox: "Sent Items".to_string(),
        };
        assert_eq!(wire(&select), "A0001 EXAMINE \"Sent Items\"\r\n");
    }

    #[test]
    fn test_fetch_items() {
        let command = Command::Fetch {
            sequence: SequenceSet::starting_at(71),
            items: vec![
                FetchAttribute::Uid,
                FetchAttribute::Flags,
                FetchAttribute::header_fields(&["From", "Subject"]),
                FetchAttribute::BodyPeek {
                    section: "1".to_string(),
                    partial: Some((0, 2048)),
                },
            ],
            uid: false,
        };
        assert_eq!(
            wire(&command),
            "A0001 FETCH 71:* (UID FLAGS BODY.PEEK[HEADER.FIELDS (FROM SUBJECT)] BODY.PEEK[1]<0.2048>)\r\n"
        );

        let single = Command::Fetch {
            sequence: SequenceSet::single(9),
            items: vec![FetchAttribute::body_peek("")],
            uid: true,
        };
        assert_eq!(wire(&single), "A0001 UID FETCH 9 BODY.PEEK[]\r\n");
    }

    #[test]
    fn test_store() {
        let command = Command::Store {
            sequence: SequenceSet::single(42),
            action: StoreAction::Add(vec![Flag::Flagged]),
            uid: true,
            silent: true,
        };
        assert_eq!(wire(&command), "A0001 UID STORE 42 +FLAGS.SILENT (\\Flagged)\r\n");

        let command = Command::Store {
            sequence: SequenceSet::single(42),
            action: StoreAction::Remove(vec![Flag::Seen]),
            uid: true,
            silent: false,
        };
        assert_eq!(wire(&command), "A0001 UID STORE 42 -FLAGS (\\Seen)\r\n");
    }

    #[test]
    fn test_copy_and_move() {
        let copy = Command::Copy {
            sequence: SequenceSet::single(3),
            mailbox: "Archive".to_string(),
            uid: true,
        };
        assert_eq!(wire(&copy), "A0001 UID COPY 3 Archive\r\n");

        let moved = Command::Move {
            sequence: SequenceSet::single(3),
            mailbox: "Trash".to_string(),
            uid: true,
        };
        assert_eq!(wire(&moved), "A0001 UID MOVE 3 Trash\r\n");
    }
}

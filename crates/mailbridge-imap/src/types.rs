//! Core IMAP data types.

use std::fmt;

/// Message sequence number.
pub type SeqNum = u32;

/// Message unique identifier.
pub type Uid = u32;

/// Message flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message has been answered.
    Answered,
    /// Message is flagged for special attention.
    Flagged,
    /// Message is marked for deletion.
    Deleted,
    /// Message is a draft.
    Draft,
    /// Message is recent.
    Recent,
    /// Keyword or any other flag, verbatim.
    Keyword(String),
}

impl Flag {
    /// Parses a flag atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\SEEN" => Self::Seen,
            "\\ANSWERED" => Self::Answered,
            "\\FLAGGED" => Self::Flagged,
            "\\DELETED" => Self::Deleted,
            "\\DRAFT" => Self::Draft,
            "\\RECENT" => Self::Recent,
            _ => Self::Keyword(s.to_string()),
        }
    }

    /// Returns the wire form of the flag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::Keyword(k) => k,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `a`, `a:b` or `a:*` element of a sequence set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SequenceRange {
    start: u32,
    end: Option<u32>,
}

/// Set of sequence numbers or UIDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSet {
    ranges: Vec<SequenceRange>,
}

impl SequenceSet {
    /// A single number.
    #[must_use]
    pub fn single(n: u32) -> Self {
        Self {
            ranges: vec![SequenceRange {
                start: n,
                end: Some(n),
            }],
        }
    }

    /// An inclusive range.
    #[must_use]
    pub fn range(start: u32, end: u32) -> Self {
        Self {
            ranges: vec![SequenceRange {
                start: start.min(end),
                end: Some(start.max(end)),
            }],
        }
    }

    /// From `start` to the last message (`start:*`).
    #[must_use]
    pub fn starting_at(start: u32) -> Self {
        Self {
            ranges: vec![SequenceRange { start, end: None }],
        }
    }

    /// A list of single numbers.
    #[must_use]
    pub fn list(numbers: &[u32]) -> Self {
        Self {
            ranges: numbers
                .iter()
                .map(|&n| SequenceRange {
                    start: n,
                    end: Some(n),
                })
                .collect(),
        }
    }

    /// Returns `true` if the set contains no numbers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match range.end {
                Some(end) if end == range.start => write!(f, "{}", range.start)?,
                Some(end) => write!(f, "{}:{end}", range.start)?,
                None => write!(f, "{}:*", range.start)?,
            }
        }
        Ok(())
    }
}

/// Mailbox attribute from a LIST response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// `\Noselect`: the name exists only as a hierarchy level.
    NoSelect,
    /// `\HasChildren`.
    HasChildren,
    /// `\HasNoChildren`.
    HasNoChildren,
    /// Any other attribute, including special-use ones like `\Sent`.
    Other(String),
}

impl MailboxAttribute {
    /// Parses an attribute atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "\\noselect" | "\\nonexistent" => Self::NoSelect,
            "\\haschildren" => Self::HasChildren,
            "\\hasnochildren" => Self::HasNoChildren,
            _ => Self::Other(s.to_string()),
        }
    }
}

/// One LIST response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Mailbox attributes.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter, `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// Full mailbox name.
    pub name: String,
}

impl ListResponse {
    /// Returns `true` if the mailbox can be selected.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self.attributes.contains(&MailboxAttribute::NoSelect)
    }
}

/// Mailbox state reported by SELECT or EXAMINE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// `UIDVALIDITY` response code.
    pub uid_validity: Option<u32>,
    /// `UIDNEXT` response code.
    pub uid_next: Option<Uid>,
    /// Flags defined in the mailbox.
    pub flags: Vec<Flag>,
    /// Whether the mailbox was opened read-only.
    pub read_only: bool,
}

/// One body section returned by FETCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodySection {
    /// Section specifier as echoed by the server (`""` for the whole
    /// message, `TEXT`, `1`, `HEADER.FIELDS (...)`).
    pub section: String,
    /// Start offset of a partial fetch.
    pub origin: Option<u32>,
    /// Section content; empty when the server returned NIL.
    pub data: Vec<u8>,
}

/// Data returned for one message by FETCH.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedMessage {
    /// Sequence number.
    pub seq: SeqNum,
    /// UID, when requested.
    pub uid: Option<Uid>,
    /// Flags, when requested.
    pub flags: Option<Vec<Flag>>,
    /// `INTERNALDATE` as sent by the server.
    pub internal_date: Option<String>,
    /// `RFC822.SIZE`.
    pub size: Option<u32>,
    /// Body sections in response order.
    pub sections: Vec<BodySection>,
}

impl FetchedMessage {
    /// Returns the first section whose specifier starts with `prefix`,
    /// ignoring case.
    #[must_use]
    pub fn section(&self, prefix: &str) -> Option<&BodySection> {
        self.sections.iter().find(|s| {
            s.section
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
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
    fn test_flag_parse() {
        assert_eq!(Flag::parse("\\seen"), Flag::Seen);
        assert_eq!(Flag::parse("\\FLAGGED"), Flag::Flagged);
        assert_eq!(Flag::parse("$Important"), Flag::Keyword("$Important".to_string()));
        assert_eq!(Flag::Deleted.to_string(), "\\Deleted");
    }

    #[test]
    fn test_sequence_set_display() {
        assert_eq!(SequenceSet::single(7).to_string(), "7");
        assert_eq!(SequenceSet::range(5, 2).to_string(), "2:5");
        assert_eq!(SequenceSet::starting_at(71).to_string(), "71:*");
        assert_eq!(SequenceSet::list(&[1, 4, 9]).to_string(), "1,4,9");
        assert!(SequenceSet::list(&[]).is_empty());
    }

    #[test]
    fn test_mailbox_attribute() {
        assert_eq!(MailboxAttribute::parse("\\NoSelect"), MailboxAttribute::NoSelect);
        assert_eq!(
            MailboxAttribute::parse("\\Sent"),
            MailboxAttribute::Other("\\Sent".to_string())
        );
    }

    #[test]
    fn test_fetched_message_section_lookup() {
        let message = FetchedMessage {
            sections: vec![
                BodySection {
                    section: "HEADER.FIELDS (FROM SUBJECT)".to_string(),
                    origin: None,
                    data: b"Subject: x\r\n\r\n".to_vec(),
                },
                BodySection {
                    section: "1".to_string(),
                    origin: Some(0),
                    data: b"hello".to_vec(),
                },
            ],
            ..FetchedMessage::default()
        };
        assert!(message.section("header.fields").is_some());
        assert_eq!(message.section("1").unwrap().data, b"hello");
        assert!(message.section("TEXT").is_none());
    }
}

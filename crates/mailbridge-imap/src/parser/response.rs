//! Parsing of complete server responses.

use tracing::trace;

use super::lexer::{Lexer, Token};
use crate::types::{BodySection, FetchedMessage, Flag, ListResponse, MailboxAttribute, SeqNum};
use crate::{Error, Result};

/// Status keyword of a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `OK`.
    Ok,
    /// `NO`.
    No,
    /// `BAD`.
    Bad,
    /// `PREAUTH` (greeting only).
    PreAuth,
    /// `BYE`.
    Bye,
}

impl Status {
    fn parse(atom: &str) -> Option<Self> {
        match atom.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }
}

/// Status, optional bracketed response code and human-readable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    /// Status keyword.
    pub status: Status,
    /// Response code without brackets, e.g. `UIDVALIDITY 3857529045`.
    pub code: Option<String>,
    /// Trailing text.
    pub text: String,
}

impl StatusResponse {
    /// Returns the argument of a response code like `UIDNEXT 4392`.
    #[must_use]
    pub fn code_value(&self, name: &str) -> Option<&str> {
        let code = self.code.as_deref()?;
        let (key, value) = code.split_once(' ').unwrap_or((code, ""));
        key.eq_ignore_ascii_case(name).then_some(value.trim())
    }

    /// Returns `true` if the response code is exactly `name`.
    #[must_use]
    pub fn has_code(&self, name: &str) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| code.split(' ').next().is_some_and(|k| k.eq_ignore_ascii_case(name)))
    }
}

/// Untagged (`*`) server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `OK`, `NO`, `BAD`, `PREAUTH` or `BYE`.
    Status(StatusResponse),
    /// `CAPABILITY`.
    Capability(Vec<String>),
    /// `FLAGS`.
    Flags(Vec<Flag>),
    /// `LIST`.
    List(ListResponse),
    /// `n EXISTS`.
    Exists(u32),
    /// `n RECENT`.
    Recent(u32),
    /// `n EXPUNGE`.
    Expunge(SeqNum),
    /// `n FETCH (...)`.
    Fetch(FetchedMessage),
    /// `SEARCH`.
    Search(Vec<u32>),
    /// Anything else, verbatim.
    Other(String),
}

/// One complete server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Completion of a command.
    Tagged {
        /// Tag of the completed command.
        tag: String,
        /// Outcome.
        status: StatusResponse,
    },
    /// Server data.
    Untagged(UntaggedResponse),
    /// Continuation request (`+`).
    Continuation(String),
}

/// Parser for complete responses as read by the framed stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the response does not follow the
    /// grammar.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => {
                lexer.expect(b' ')?;
                parse_untagged(&mut lexer).map(Response::Untagged)
            }
            Token::Plus => {
                lexer.eat(b' ');
                Ok(Response::Continuation(text(lexer.rest_of_line())))
            }
            Token::Atom(tag) => {
                let tag = tag.to_string();
                lexer.expect(b' ')?;
                let keyword = expect_atom(&mut lexer)?;
                let status = Status::parse(keyword)
                    .filter(|s| matches!(s, Status::Ok | Status::No | Status::Bad))
                    .ok_or_else(|| lexer.error("expected OK, NO or BAD"))?;
                Ok(Response::Tagged {
                    tag,
                    status: parse_status_tail(&mut lexer, status)?,
                })
            }
            other => Err(lexer.error(&format!("unexpected response start {other:?}"))),
        }
    }
}

fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
    match lexer.next_token()? {
        Token::Number(n) => {
            let n = to_u32(lexer, n)?;
            lexer.expect(b' ')?;
            let keyword = expect_atom(lexer)?.to_ascii_uppercase();
            match keyword.as_str() {
                "EXISTS" => Ok(UntaggedResponse::Exists(n)),
                "RECENT" => Ok(UntaggedResponse::Recent(n)),
                "EXPUNGE" => Ok(UntaggedResponse::Expunge(n)),
                "FETCH" => {
                    lexer.expect(b' ')?;
                    parse_fetch(lexer, n).map(UntaggedResponse::Fetch)
                }
                _ => Ok(UntaggedResponse::Other(format!(
                    "{n} {keyword}{}",
                    text(lexer.rest_of_line())
                ))),
            }
        }
        Token::Atom(keyword) => {
            if let Some(status) = Status::parse(keyword) {
                return parse_status_tail(lexer, status).map(UntaggedResponse::Status);
            }
            match keyword.to_ascii_uppercase().as_str() {
                "CAPABILITY" => Ok(UntaggedResponse::Capability(words(lexer.rest_of_line()))),
                "FLAGS" => {
                    lexer.expect(b' ')?;
                    parse_flag_list(lexer).map(UntaggedResponse::Flags)
                }
                "LIST" | "LSUB" => {
                    lexer.expect(b' ')?;
                    parse_list(lexer).map(UntaggedResponse::List)
                }
                "SEARCH" => Ok(UntaggedResponse::Search(
                    words(lexer.rest_of_line())
                        .iter()
                        .filter_map(|w| w.parse().ok())
                        .collect(),
                )),
                _ => Ok(UntaggedResponse::Other(format!(
                    "{keyword}{}",
                    text(lexer.rest_of_line())
                ))),
            }
        }
        other => Err(lexer.error(&format!("unexpected untagged data {other:?}"))),
    }
}

fn parse_status_tail(lexer: &mut Lexer<'_>, status: Status) -> Result<StatusResponse> {
    lexer.eat(b' ');
    let code = if lexer.eat(b'[') {
        let code = text(lexer.take_until(b']')?);
        lexer.eat(b' ');
        Some(code)
    } else {
        None
    };
    Ok(StatusResponse {
        status,
        code,
        text: text(lexer.rest_of_line()),
    })
}

fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Vec<Flag>> {
    lexer.expect(b'(')?;
    let mut flags = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => return Ok(flags),
            Token::Space => {}
            Token::Atom(atom) => flags.push(Flag::parse(atom)),
            other => return Err(lexer.error(&format!("unexpected {other:?} in flag list"))),
        }
    }
}

fn parse_list(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    let attributes = parse_flag_list(lexer)?
        .iter()
        .map(|flag| MailboxAttribute::parse(flag.as_str()))
        .collect();
    lexer.expect(b' ')?;

    let delimiter = match lexer.next_token()? {
        Token::Quoted(s) => s.chars().next(),
        Token::Nil => None,
        other => return Err(lexer.error(&format!("expected delimiter, got {other:?}"))),
    };
    lexer.expect(b' ')?;

    let name = match lexer.next_token()? {
        Token::Atom(atom) => atom.to_string(),
        Token::Quoted(s) => s,
        Token::Number(n) => n.to_string(),
        Token::Literal(data) => String::from_utf8_lossy(data).into_owned(),
        other => return Err(lexer.error(&format!("expected mailbox name, got {other:?}"))),
    };

    Ok(ListResponse {
        attributes,
        delimiter,
        name,
    })
}

fn parse_fetch(lexer: &mut Lexer<'_>, seq: SeqNum) -> Result<FetchedMessage> {
    lexer.expect(b'(')?;
    let mut message = FetchedMessage {
        seq,
        ..FetchedMessage::default()
    };

    loop {
        let name = match lexer.next_token()? {
            Token::RParen => return Ok(message),
            Token::Space => continue,
            Token::Atom(name) => name.to_ascii_uppercase(),
            other => return Err(lexer.error(&format!("unexpected {other:?} in FETCH"))),
        };

        match name.as_str() {
            "UID" => {
                lexer.expect(b' ')?;
                message.uid = Some(expect_number(lexer)?);
            }
            "FLAGS" => {
                lexer.expect(b' ')?;
                message.flags = Some(parse_flag_list(lexer)?);
            }
            "INTERNALDATE" => {
                lexer.expect(b' ')?;
                message.internal_date =
                    nstring(lexer)?.map(|d| String::from_utf8_lossy(&d).into_owned());
            }
            "RFC822.SIZE" => {
                lexer.expect(b' ')?;
                message.size = Some(expect_number(lexer)?);
            }
            "BODY" | "BINARY" if lexer.peek() == Some(b'[') => {
                lexer.expect(b'[')?;
                let section = text(lexer.take_until(b']')?);
                let origin = if lexer.eat(b'<') {
                    let digits = text(lexer.take_until(b'>')?);
                    Some(digits.parse().map_err(|_| lexer.error("invalid origin"))?)
                } else {
                    None
                };
                lexer.expect(b' ')?;
                let data = nstring(lexer)?.unwrap_or_default();
                message.sections.push(BodySection {
                    section,
                    origin,
                    data,
                });
            }
            "RFC822" | "RFC822.HEADER" | "RFC822.TEXT" => {
                lexer.expect(b' ')?;
                let section = name.strip_prefix("RFC822").unwrap_or_default();
                let section = section.strip_prefix('.').unwrap_or(section).to_string();
                let data = nstring(lexer)?.unwrap_or_default();
                message.sections.push(BodySection {
                    section,
                    origin: None,
                    data,
                });
            }
            _ => {
                trace!(item = %name, "skipping FETCH item");
                lexer.expect(b' ')?;
                skip_value(lexer)?;
            }
        }
    }
}

/// Reads a string, literal or NIL.
fn nstring(lexer: &mut Lexer<'_>) -> Result<Option<Vec<u8>>> {
    match lexer.next_token()? {
        Token::Quoted(s) => Ok(Some(s.into_bytes())),
        Token::Literal(data) => Ok(Some(data.to_vec())),
        Token::Atom(atom) => Ok(Some(atom.as_bytes().to_vec())),
        Token::Nil => Ok(None),
        other => Err(lexer.error(&format!("expected string, got {other:?}"))),
    }
}

/// Skips one value, including nested parenthesized lists.
fn skip_value(lexer: &mut Lexer<'_>) -> Result<()> {
    let mut depth = 0usize;
    loop {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen if depth > 0 => depth -= 1,
            Token::Eof | Token::Crlf | Token::RParen => {
                return Err(lexer.error("unterminated FETCH value"));
            }
            Token::LBracket => {
                lexer.take_until(b']')?;
            }
            _ => {}
        }
        if depth == 0 {
            return Ok(());
        }
    }
}

fn expect_atom<'a>(lexer: &mut Lexer<'a>) -> Result<&'a str> {
    match lexer.next_token()? {
        Token::Atom(atom) => Ok(atom),
        other => Err(lexer.error(&format!("expected atom, got {other:?}"))),
    }
}

fn expect_number(lexer: &mut Lexer<'_>) -> Result<u32> {
    match lexer.next_token()? {
        Token::Number(n) => to_u32(lexer, n),
        other => Err(lexer.error(&format!("expected number, got {other:?}"))),
    }
}

fn to_u32(lexer: &Lexer<'_>, n: u64) -> Result<u32> {
    u32::try_from(n).map_err(|_| lexer.error("number exceeds 32 bits"))
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn words(bytes: &[u8]) -> Vec<String> {
    text(bytes).split_whitespace().map(str::to_string).collect()
}

impl From<StatusResponse> for Error {
    fn from(response: StatusResponse) -> Self {
        match response.status {
            Status::No => Self::No(response.text),
            Status::Bad => Self::Bad(response.text),
            Status::Bye => Self::Bye(response.text),
            Status::Ok | Status::PreAuth => {
                Self::Protocol(format!("unexpected {:?}: {}", response.status, response.text))
            }
        }
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

    fn untagged(input: &[u8]) -> UntaggedResponse {
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(response) => response,
            other => panic!("expected untagged, got {other:?}"),
        }
    }

    #[test]
    fn test_tagged_ok_with_code() {
        let response = ResponseParser::parse(b"A0003 OK [READ-ONLY] EXAMINE completed\r\n").unwrap();
        let Response::Tagged { tag, status } = response else {
            panic!("expected tagged");
        };
        assert_eq!(tag, "A0003");
        assert_eq!(status.status, Status::Ok);
        assert!(status.has_code("READ-ONLY"));
        assert_eq!(status.text, "EXAMINE completed");
    }

    #[test]
    fn test_tagged_no() {
        let response = ResponseParser::parse(b"A0002 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n").unwrap();
        let Response::Tagged { status, .. } = response else {
            panic!("expected tagged");
        };
        assert_eq!(status.status, Status::No);
        assert!(matches!(Error::from(status), Error::No(text) if text == "Invalid credentials"));
    }

    #[test]
    fn test_greeting_and_codes() {
        let UntaggedResponse::Status(status) =
            untagged(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n")
        else {
            panic!("expected status");
        };
        assert_eq!(status.code_value("uidvalidity"), Some("3857529045"));
        assert_eq!(status.code_value("UIDNEXT"), None);
    }

    #[test]
    fn test_capability() {
        assert_eq!(
            untagged(b"* CAPABILITY IMAP4rev1 MOVE IDLE\r\n"),
            UntaggedResponse::Capability(vec![
                "IMAP4rev1".to_string(),
                "MOVE".to_string(),
                "IDLE".to_string()
            ])
        );
    }

    #[test]
    fn test_counts() {
        assert_eq!(untagged(b"* 172 EXISTS\r\n"), UntaggedResponse::Exists(172));
        assert_eq!(untagged(b"* 1 RECENT\r\n"), UntaggedResponse::Recent(1));
        assert_eq!(untagged(b"* 44 EXPUNGE\r\n"), UntaggedResponse::Expunge(44));
    }

    #[test]
    fn test_flags() {
        assert_eq!(
            untagged(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n"),
            UntaggedResponse::Flags(vec![
                Flag::Answered,
                Flag::Flagged,
                Flag::Deleted,
                Flag::Seen,
                Flag::Draft
            ])
        );
    }

    #[test]
    fn test_list() {
        let UntaggedResponse::List(list) =
            untagged(b"* LIST (\\HasChildren \\Noselect) \"/\" \"Work Stuff\"\r\n")
        else {
            panic!("expected list");
        };
        assert_eq!(list.delimiter, Some('/'));
        assert_eq!(list.name, "Work Stuff");
        assert!(!list.is_selectable());

        let UntaggedResponse::List(list) = untagged(b"* LIST () NIL INBOX\r\n") else {
            panic!("expected list");
        };
        assert_eq!(list.delimiter, None);
        assert_eq!(list.name, "INBOX");
        assert!(list.is_selectable());
    }

    #[test]
    fn test_fetch_summary_items() {
        let input = b"* 12 FETCH (UID 4827 FLAGS (\\Seen) INTERNALDATE \"17-Jul-1996 02:44:25 -0700\" RFC822.SIZE 4286 BODY[HEADER.FIELDS (FROM SUBJECT)] {15}\r\nSubject: hi\r\n\r\n BODY[1]<0> {5}\r\nhello)\r\n";
        let UntaggedResponse::Fetch(message) = untagged(input) else {
            panic!("expected fetch");
        };
        assert_eq!(message.seq, 12);
        assert_eq!(message.uid, Some(4827));
        assert_eq!(message.flags, Some(vec![Flag::Seen]));
        assert_eq!(
            message.internal_date.as_deref(),
            Some("17-Jul-1996 02:44:25 -0700")
        );
        assert_eq!(message.size, Some(4286));
        assert_eq!(message.sections.len(), 2);
        assert_eq!(message.sections[0].section, "HEADER.FIELDS (FROM SUBJECT)");
        assert_eq!(message.sections[0].data, b"Subject: hi\r\n\r\n");
        assert_eq!(message.sections[1].section, "1");
        assert_eq!(message.sections[1].origin, Some(0));
        assert_eq!(message.sections[1].data, b"hello");
    }

    #[test]
    fn test_fetch_skips_unknown_items() {
        let input = b"* 3 FETCH (MODSEQ (624140003) ENVELOPE (\"date\" \"subj\" NIL NIL) UID 9 BODY[] NIL)\r\n";
        let UntaggedResponse::Fetch(message) = untagged(input) else {
            panic!("expected fetch");
        };
        assert_eq!(message.uid, Some(9));
        assert_eq!(message.sections[0].section, "");
        assert!(message.sections[0].data.is_empty());
    }

    #[test]
    fn test_continuation() {
        assert_eq!(
            ResponseParser::parse(b"+ Ready for additional command text\r\n").unwrap(),
            Response::Continuation("Ready for additional command text".to_string())
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(ResponseParser::parse(b"A0001 MAYBE done\r\n").is_err());
        assert!(ResponseParser::parse(b")\r\n").is_err());
    }
}

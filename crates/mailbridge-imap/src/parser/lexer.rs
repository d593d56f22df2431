//! Tokenizer for server responses.
//!
//! Works on one complete response as returned by
//! [`FramedStream::read_response`](crate::connection::FramedStream::read_response),
//! so literal data is already in the buffer.

use crate::{Error, Result};

/// Response token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// CRLF.
    Crlf,
    /// Single space.
    Space,
    /// `(`.
    LParen,
    /// `)`.
    RParen,
    /// `[`.
    LBracket,
    /// `]`.
    RBracket,
    /// `*` at token start.
    Asterisk,
    /// `+` at token start.
    Plus,
    /// Unsigned number.
    Number(u64),
    /// Atom, including flags like `\Seen`.
    Atom(&'a str),
    /// Quoted string with escapes resolved.
    Quoted(String),
    /// Literal data.
    Literal(&'a [u8]),
    /// `NIL`.
    Nil,
    /// End of input.
    Eof,
}

/// Response tokenizer.
#[derive(Debug)]
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over one response.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Peeks at the next byte.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Consumes `byte` if it is next.
    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consumes `byte` or fails.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the next byte differs.
    pub fn expect(&mut self, byte: u8) -> Result<()> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", char::from(byte))))
        }
    }

    /// Returns the raw bytes up to (not including) the next `byte` and
    /// consumes them together with `byte`.
    ///
    /// # Errors
    ///
    /// Returns a parse error if `byte` does not occur.
    pub fn take_until(&mut self, byte: u8) -> Result<&'a [u8]> {
        let input = self.input;
        let rest = &input[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == byte)
            .ok_or_else(|| self.error(&format!("missing '{}'", char::from(byte))))?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }

    /// Returns the rest of the current line without its line ending and
    /// consumes the line ending.
    pub fn rest_of_line(&mut self) -> &'a [u8] {
        let input = self.input;
        let rest = &input[self.pos..];
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        self.pos += (end + 1).min(rest.len());
        let line = &rest[..end];
        line.strip_suffix(b"\r").unwrap_or(line)
    }

    /// Reads the next token.
    ///
    /// # Errors
    ///
    /// Returns a parse error on malformed strings or literals.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let token = match byte {
            b'\r' if self.input.get(self.pos + 1) == Some(&b'\n') => {
                self.pos += 2;
                Token::Crlf
            }
            b'\n' => {
                self.pos += 1;
                Token::Crlf
            }
            b' ' => self.single(Token::Space),
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b'[' => self.single(Token::LBracket),
            b']' => self.single(Token::RBracket),
            b'*' => self.single(Token::Asterisk),
            b'+' => self.single(Token::Plus),
            b'"' => self.quoted()?,
            b'{' => self.literal()?,
            _ if is_atom_char(byte) => self.atom()?,
            _ => return Err(self.error(&format!("unexpected byte {byte:#04x}"))),
        };
        Ok(token)
    }

    fn single(&mut self, token: Token<'a>) -> Token<'a> {
        self.pos += 1;
        token
    }

    fn quoted(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let mut value = Vec::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = self
                        .peek()
                        .ok_or_else(|| self.error("unterminated quoted string"))?;
                    value.push(escaped);
                    self.pos += 1;
                }
                Some(b'\r' | b'\n') | None => {
                    return Err(self.error("unterminated quoted string"));
                }
                Some(b) => {
                    value.push(b);
                    self.pos += 1;
                }
            }
        }
        Ok(Token::Quoted(String::from_utf8_lossy(&value).into_owned()))
    }

    fn literal(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let digits = self.take_until(b'}')?;
        let digits = digits.strip_suffix(b"+").unwrap_or(digits);
        let length: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| self.error("invalid literal length"))?;

        if !self.eat(b'\r') {
            return Err(self.error("expected CRLF after literal length"));
        }
        self.expect(b'\n')?;

        let input = self.input;
        let data = input
            .get(self.pos..self.pos.saturating_add(length))
            .ok_or_else(|| self.error("literal shorter than announced"))?;
        self.pos += length;
        Ok(Token::Literal(data))
    }

    fn atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.pos += 1;
        }
        let input = self.input;
        let raw = &input[start..self.pos];
        let text = std::str::from_utf8(raw).map_err(|_| self.error("atom is not UTF-8"))?;

        if raw.iter().all(u8::is_ascii_digit) {
            return text
                .parse()
                .map(Token::Number)
                .map_err(|_| self.error("number out of range"));
        }
        if text.eq_ignore_ascii_case("NIL") {
            return Ok(Token::Nil);
        }
        Ok(Token::Atom(text))
    }

    /// Builds a parse error at the current position.
    #[must_use]
    pub fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }
}

/// Bytes allowed inside an atom. `\`, `*` and `%` are accepted so that
/// flags and LIST patterns lex as one atom.
const fn is_atom_char(b: u8) -> bool {
    b > 0x20 && b != 0x7F && !matches!(b, b'(' | b')' | b'{' | b'"' | b'[' | b']')
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

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn test_untagged_status() {
        assert_eq!(
            tokens(b"* 12 EXISTS\r\n"),
            vec![
                Token::Asterisk,
                Token::Space,
                Token::Number(12),
                Token::Space,
                Token::Atom("EXISTS"),
                Token::Crlf
            ]
        );
    }

    #[test]
    fn test_flags_and_nil() {
        assert_eq!(
            tokens(b"(\\Seen \\*) NIL"),
            vec![
                Token::LParen,
                Token::Atom("\\Seen"),
                Token::Space,
                Token::Atom("\\*"),
                Token::RParen,
                Token::Space,
                Token::Nil
            ]
        );
    }

    #[test]
    fn test_quoted_with_escapes() {
        assert_eq!(
            tokens(br#""a \"b\" \\c""#),
            vec![Token::Quoted("a \"b\" \\c".to_string())]
        );
    }

    #[test]
    fn test_literal() {
        assert_eq!(
            tokens(b"{5}\r\nhello)"),
            vec![Token::Literal(b"hello"), Token::RParen]
        );
        assert!(Lexer::new(b"{9}\r\nshort").next_token().is_err());
    }

    #[test]
    fn test_rest_of_line_and_take_until() {
        let mut lexer = Lexer::new(b"[UIDVALIDITY 7] Ok done\r\nnext");
        assert!(lexer.eat(b'['));
        assert_eq!(lexer.take_until(b']').unwrap(), b"UIDVALIDITY 7");
        assert_eq!(lexer.rest_of_line(), b" Ok done");
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("next"));
    }
}

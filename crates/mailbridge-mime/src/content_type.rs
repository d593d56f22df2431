//! `Content-Type` and `Content-Disposition` handling.

use std::collections::BTreeMap;
use std::fmt;

use crate::encoding::decode_quoted_printable;
use crate::error::{Error, Result};

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters with lowercase names.
    pub parameters: BTreeMap<String, String>,
}

impl Default for ContentType {
    /// `text/plain`, the RFC 2045 default.
    fn default() -> Self {
        Self::new("text", "plain")
    }
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Returns the lowercase `type/subtype` string.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary").map(String::as_str)
    }

    /// Returns the `name` parameter if present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameters.get("name").map(String::as_str)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type == "multipart"
    }

    /// Checks for an exact `type/subtype` match.
    #[must_use]
    pub fn is(&self, main_type: &str, sub_type: &str) -> bool {
        self.main_type == main_type && self.sub_type == sub_type
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="value 2"`
    ///
    /// # Errors
    ///
    /// Returns an error if the type or subtype is missing.
    pub fn parse(s: &str) -> Result<Self> {
        let (type_str, params) = s.split_once(';').unwrap_or((s, ""));

        let (main_type, sub_type) = type_str
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(s.trim().to_string()))?;
        let main_type = main_type.trim().to_ascii_lowercase();
        let sub_type = sub_type.trim().to_ascii_lowercase();
        if main_type.is_empty() || sub_type.is_empty() {
            return Err(Error::InvalidContentType(s.trim().to_string()));
        }

        Ok(Self {
            main_type,
            sub_type,
            parameters: parse_parameters(params),
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        write_parameters(f, &self.parameters)
    }
}

/// Disposition of a body part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispositionKind {
    /// Displayed as part of the message.
    Inline,
    /// Offered as a separate download.
    Attachment,
}

/// Parsed `Content-Disposition` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type.
    pub kind: DispositionKind,
    /// Parameters with lowercase names.
    pub parameters: BTreeMap<String, String>,
}

impl ContentDisposition {
    /// Creates an attachment disposition with a filename.
    #[must_use]
    pub fn attachment(filename: impl Into<String>) -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert("filename".to_string(), filename.into());
        Self {
            kind: DispositionKind::Attachment,
            parameters,
        }
    }

    /// Parses a disposition header. Unknown disposition types are treated
    /// as attachments (RFC 2183).
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let (kind, params) = s.split_once(';').unwrap_or((s, ""));
        let kind = if kind.trim().eq_ignore_ascii_case("inline") {
            DispositionKind::Inline
        } else {
            DispositionKind::Attachment
        };
        Self {
            kind,
            parameters: parse_parameters(params),
        }
    }

    /// Returns the filename parameter if present.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.parameters.get("filename").map(String::as_str)
    }

    /// Returns `true` for `attachment` dispositions.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == DispositionKind::Attachment
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DispositionKind::Inline => f.write_str("inline")?,
            DispositionKind::Attachment => f.write_str("attachment")?,
        }
        write_parameters(f, &self.parameters)
    }
}

fn write_parameters(f: &mut fmt::Formatter<'_>, parameters: &BTreeMap<String, String>) -> fmt::Result {
    for (key, value) in parameters {
        if value.is_empty()
            || value.contains(|c: char| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c))
        {
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            write!(f, "; {key}=\"{escaped}\"")?;
        } else {
            write!(f, "; {key}={value}")?;
        }
    }
    Ok(())
}

/// Parses `; key=value` parameter lists.
///
/// Quoted values may contain `;`. RFC 2231 extended values
/// (`key*=charset''percent-encoded`) and continuations (`key*0`, `key*1*`)
/// are reassembled into a plain `key` entry.
fn parse_parameters(input: &str) -> BTreeMap<String, String> {
    let mut plain = BTreeMap::new();
    // key -> (index, extended, raw value)
    let mut continued: BTreeMap<String, Vec<(u32, bool, String)>> = BTreeMap::new();

    for (key, value) in split_parameters(input) {
        if let Some(base) = key.strip_suffix('*')
            && !base.contains('*')
        {
            plain.insert(base.to_string(), decode_extended(&value));
            continue;
        }

        if let Some((base, index)) = key.split_once('*') {
            let extended = index.ends_with('*');
            if let Ok(index) = index.trim_end_matches('*').parse::<u32>() {
                continued
                    .entry(base.to_string())
                    .or_default()
                    .push((index, extended, value));
                continue;
            }
        }

        plain.entry(key).or_insert(value);
    }

    for (key, mut pieces) in continued {
        pieces.sort_by_key(|(index, _, _)| *index);
        let first_extended = pieces.first().is_some_and(|(_, extended, _)| *extended);
        let joined: String = pieces
            .iter()
            .map(|(_, _, value)| value.as_str())
            .collect();
        let value = if first_extended {
            decode_extended(&joined)
        } else {
            joined
        };
        plain.insert(key, value);
    }

    plain
}

fn split_parameters(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ';') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ';' {
                break;
            }
            key.push(c);
            chars.next();
        }

        let mut value = String::new();
        if chars.peek() == Some(&'=') {
            chars.next();
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            if chars.peek() == Some(&'"') {
                chars.next();
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        _ => value.push(c),
                    }
                }
                // Skip anything between the closing quote and the next ';'.
                while chars.peek().is_some_and(|c| *c != ';') {
                    chars.next();
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c == ';' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                value = value.trim().to_string();
            }
        }

        let key = key.trim().to_ascii_lowercase();
        if !key.is_empty() {
            params.push((key, value));
        }
    }

    params
}

/// Decodes an RFC 2231 `charset'language'percent-encoded` value.
///
/// Only UTF-8, ASCII and Latin-1 payloads are recognized; other charsets
/// are decoded as UTF-8 lossily.
fn decode_extended(value: &str) -> String {
    let mut pieces = value.splitn(3, '\'');
    let (charset, encoded) = match (pieces.next(), pieces.next(), pieces.next()) {
        (Some(charset), Some(_language), Some(encoded)) => (charset, encoded),
        _ => ("utf-8", value),
    };

    let bytes = decode_quoted_printable(encoded.replace('%', "=").as_bytes());
    let converted = crate::charset::CharsetConverter::default()
        .convert(&bytes, Some(if charset.is_empty() { "utf-8" } else { charset }));
    converted.text
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
    fn test_content_type_parse() {
        let ct = ContentType::parse("Text/Plain; charset=UTF-8").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.charset(), Some("UTF-8"));
        assert!(ct.is("text", "plain"));
    }

    #[test]
    fn test_content_type_parse_quoted() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part_1;2\"").unwrap();
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("----=_Part_1;2"));
    }

    #[test]
    fn test_content_type_parse_invalid() {
        assert!(ContentType::parse("garbage").is_err());
        assert!(ContentType::parse("text/").is_err());
    }

    #[test]
    fn test_content_type_display() {
        let ct = ContentType::new("text", "plain").with_parameter("charset", "utf-8");
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8");

        let ct = ContentType::new("multipart", "mixed").with_parameter("boundary", "a b");
        assert_eq!(ct.to_string(), "multipart/mixed; boundary=\"a b\"");
    }

    #[test]
    fn test_disposition_parse() {
        let cd = ContentDisposition::parse("attachment; filename=\"report final.pdf\"");
        assert!(cd.is_attachment());
        assert_eq!(cd.filename(), Some("report final.pdf"));

        let cd = ContentDisposition::parse("INLINE");
        assert_eq!(cd.kind, DispositionKind::Inline);
        assert!(cd.filename().is_none());
    }

    #[test]
    fn test_disposition_unknown_kind_is_attachment() {
        assert!(ContentDisposition::parse("x-weird").is_attachment());
    }

    #[test]
    fn test_rfc2231_extended_value() {
        let cd = ContentDisposition::parse("attachment; filename*=UTF-8''na%C3%AFve%20file.txt");
        assert_eq!(cd.filename(), Some("naïve file.txt"));
    }

    #[test]
    fn test_rfc2231_continuations() {
        let cd = ContentDisposition::parse(
            "attachment; filename*1=\"part.txt\"; filename*0=\"long-name-\"",
        );
        assert_eq!(cd.filename(), Some("long-name-part.txt"));

        let cd = ContentDisposition::parse(
            "attachment; filename*0*=utf-8''%C3%A9t%C3%A9; filename*1*=.txt",
        );
        assert_eq!(cd.filename(), Some("été.txt"));
    }

    #[test]
    fn test_disposition_display() {
        let cd = ContentDisposition::attachment("a.txt");
        assert_eq!(cd.to_string(), "attachment; filename=a.txt");
    }
}

//! MIME entity tree.
//!
//! Parsing is structural only: headers are unfolded, multipart bodies are
//! split on their boundary and each part is parsed recursively. Transfer
//! decoding happens on demand through [`Part::decode_body`].

use std::fmt;

use tracing::warn;

use crate::charset::CharsetConverter;
use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::{Headers, split_header_body};

/// Deepest multipart nesting accepted before parts are treated as opaque.
pub const MAX_DEPTH: usize = 32;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string. Unknown values are treated as
    /// 7bit, which passes content through unchanged.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// A parsed MIME entity: either a leaf with a body or a multipart
/// container with children.
#[derive(Debug, Clone, Default)]
pub struct Part {
    /// Part headers, already charset-decoded.
    pub headers: Headers,
    /// Parsed content type (defaults to `text/plain`).
    pub content_type: ContentType,
    /// Raw, still transfer-encoded body. Empty for multipart containers.
    pub body: Vec<u8>,
    /// Child parts of a multipart container.
    pub children: Vec<Self>,
    /// Problems found while parsing this part.
    pub warnings: Vec<String>,
}

impl Part {
    /// Parses a raw entity (a full message or one body part).
    #[must_use]
    pub fn parse(raw: &[u8], converter: &CharsetConverter) -> Self {
        Self::parse_at_depth(raw, converter, 0)
    }

    fn parse_at_depth(raw: &[u8], converter: &CharsetConverter, depth: usize) -> Self {
        let (head, body) = split_header_body(raw);
        let head_text = converter.convert(head, Some("utf-8")).text;
        let headers = Headers::parse(&head_text);
        let mut warnings = Vec::new();

        let content_type = match headers.get("content-type") {
            Some(value) => ContentType::parse(value).unwrap_or_else(|e| {
                warnings.push(format!("{e}; treating part as text/plain"));
                ContentType::default()
            }),
            None => ContentType::default(),
        };

        if !content_type.is_multipart() {
            return Self {
                headers,
                content_type,
                body: body.to_vec(),
                children: Vec::new(),
                warnings,
            };
        }

        if depth >= MAX_DEPTH {
            warn!(depth, "multipart nesting too deep, keeping part opaque");
            warnings.push(Error::TooDeep(MAX_DEPTH).to_string());
            return Self {
                headers,
                content_type,
                body: body.to_vec(),
                children: Vec::new(),
                warnings,
            };
        }

        let Some(boundary) = content_type.boundary().map(str::to_string) else {
            warnings.push(format!("{}; showing part as text", Error::MissingBoundary));
            return Self {
                headers,
                content_type: ContentType::default(),
                body: body.to_vec(),
                children: Vec::new(),
                warnings,
            };
        };

        let children: Vec<Self> = split_multipart(body, &boundary)
            .into_iter()
            .map(|part| Self::parse_at_depth(part, converter, depth + 1))
            .collect();
        if children.is_empty() {
            warnings.push(format!("No parts found for boundary {boundary}"));
        }

        Self {
            headers,
            content_type,
            body: Vec::new(),
            children,
            warnings,
        }
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Gets the content disposition, if declared.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
    }

    /// Gets the Content-ID without angle brackets.
    #[must_use]
    pub fn content_id(&self) -> Option<String> {
        self.headers
            .get("content-id")
            .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>').to_string())
            .filter(|id| !id.is_empty())
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if a base64 body contains characters outside the
    /// base64 alphabet.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&self.body),
            TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable(&self.body)),
            _ => Ok(self.body.clone()),
        }
    }

    /// Returns `true` for multipart containers.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        !self.children.is_empty()
    }

    /// Iterates over leaf parts depth-first.
    pub fn leaves(&self) -> Box<dyn Iterator<Item = &Self> + '_> {
        if self.children.is_empty() {
            Box::new(std::iter::once(self))
        } else {
            Box::new(self.children.iter().flat_map(|child| child.leaves()))
        }
    }
}

/// Splits a multipart body into its raw parts.
///
/// The line break before each delimiter belongs to the delimiter. Text
/// before the first delimiter (the preamble) and after the closing
/// delimiter (the epilogue) is ignored. A body without a closing
/// delimiter keeps its last part.
#[must_use]
pub fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i + 1);
        let line = &body[pos..line_end];

        if let Some(rest) = line.strip_prefix(delimiter) {
            let closing = rest.starts_with(b"--");
            if closing || rest.iter().all(u8::is_ascii_whitespace) {
                if let Some(start) = current.take() {
                    parts.push(strip_trailing_newline(&body[start..pos]));
                }
                if closing {
                    return parts;
                }
                current = Some(line_end);
            }
        }

        pos = line_end;
    }

    if let Some(start) = current
        && start < body.len()
    {
        parts.push(&body[start..]);
    }
    parts
}

fn strip_trailing_newline(part: &[u8]) -> &[u8] {
    part.strip_suffix(b"\r\n")
        .or_else(|| part.strip_suffix(b"\n"))
        .unwrap_or(part)
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

    fn parse(raw: &[u8]) -> Part {
        Part::parse(raw, &CharsetConverter::default())
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse(" quoted-printable "),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-uuencode"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_single_part() {
        let part = parse(b"Content-Type: text/html; charset=utf-8\r\n\r\n<p>Hi</p>");
        assert!(part.content_type.is("text", "html"));
        assert_eq!(part.body, b"<p>Hi</p>");
        assert!(!part.is_multipart());
    }

    #[test]
    fn test_split_multipart() {
        let body = b"preamble\r\n--b\r\nA\r\n--b\r\nB\r\n--b--\r\nepilogue";
        let parts = split_multipart(body, "b");
        assert_eq!(parts, vec![&b"A"[..], &b"B"[..]]);
    }

    #[test]
    fn test_split_multipart_ignores_lookalike_lines() {
        let body = b"--b\r\n--bx is not a delimiter\r\n--b--";
        let parts = split_multipart(body, "b");
        assert_eq!(parts, vec![&b"--bx is not a delimiter"[..]]);
    }

    #[test]
    fn test_split_multipart_unterminated() {
        let parts = split_multipart(b"--b\nA\n--b\nB", "b");
        assert_eq!(parts, vec![&b"A"[..], &b"B"[..]]);
    }

    #[test]
    fn test_nested_multipart() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=outer\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=inner\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Hi\r\n",
            "--inner\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>Hi</p>\r\n",
            "--inner--\r\n",
            "--outer\r\n",
            "Content-Type: application/pdf\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "JVBERg==\r\n",
            "--outer--\r\n"
        );
        let part = parse(raw.as_bytes());
        assert_eq!(part.children.len(), 2);
        let leaves: Vec<_> = part.leaves().collect();
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[0].body, b"Hi");
        assert_eq!(leaves[1].body, b"<p>Hi</p>");
        assert_eq!(leaves[2].decode_body().unwrap(), b"%PDF");
    }

    #[test]
    fn test_missing_boundary_degrades_to_text() {
        let part = parse(b"Content-Type: multipart/mixed\r\n\r\nbody");
        assert!(part.content_type.is("text", "plain"));
        assert_eq!(part.body, b"body");
        assert_eq!(part.warnings.len(), 1);
    }

    #[test]
    fn test_invalid_content_type_defaults() {
        let part = parse(b"Content-Type: nonsense\r\n\r\nbody");
        assert!(part.content_type.is("text", "plain"));
        assert!(!part.warnings.is_empty());
    }

    #[test]
    fn test_content_id_and_disposition() {
        let part = parse(
            b"Content-Type: image/png\r\nContent-ID: <logo@x>\r\nContent-Disposition: inline; filename=logo.png\r\n\r\n",
        );
        assert_eq!(part.content_id().as_deref(), Some("logo@x"));
        assert_eq!(part.disposition().unwrap().filename(), Some("logo.png"));
    }

    #[test]
    fn test_decode_body_quoted_printable() {
        let part = parse(b"Content-Transfer-Encoding: quoted-printable\r\n\r\nCaf=C3=A9");
        assert_eq!(part.decode_body().unwrap(), "Café".as_bytes());
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let mut raw = String::new();
        for i in 0..(MAX_DEPTH + 5) {
            raw.push_str(&format!("Content-Type: multipart/mixed; boundary=b{i}\r\n\r\n--b{i}\r\n"));
        }
        raw.push_str("Content-Type: text/plain\r\n\r\nleaf");
        let part = parse(raw.as_bytes());
        let mut depth = 0;
        let mut node = &part;
        while let Some(child) = node.children.first() {
            node = child;
            depth += 1;
        }
        assert_eq!(depth, MAX_DEPTH);
        assert!(!node.warnings.is_empty());
    }
}

//! Raw message and legacy-field decoding.
//!
//! [`Decoder::decode`] turns raw message bytes into a [`DecodedMessage`];
//! [`Decoder::render`] additionally sanitizes the HTML and attaches
//! security warnings, which is what callers displaying a message want.
//!
//! Neither ever fails. Every problem becomes an entry in
//! [`DecodedMessage::warnings`] and the content degrades to the preview
//! text, then to [`NO_CONTENT_PLACEHOLDER`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::analyze::analyze;
use crate::charset::{CharsetConverter, DEFAULT_FALLBACKS, repair_mojibake};
use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{decode_base64, decode_encoded_words, decode_quoted_printable, encode_base64};
use crate::header::{Headers, split_header_body};
use crate::message::{MAX_DEPTH, Part, TransferEncoding};
use crate::sanitize::HtmlSanitizer;
use crate::text::{html_to_text, looks_like_html, preview_text, text_to_html};

/// Text shown when a message has nothing displayable.
pub const NO_CONTENT_PLACEHOLDER: &str = "(This message has no displayable content)";

/// Attachment extracted from a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct EmailAttachment {
    /// File name, RFC 2047/2231 decoded.
    pub name: String,
    /// Decoded size.
    pub size_bytes: usize,
    /// Lowercase `type/subtype`.
    pub mime_type: String,
    /// Content-ID without angle brackets.
    pub content_id: Option<String>,
    /// Decoded content, re-encoded as standard base64.
    pub content_base64: Option<String>,
}

/// Image referenced by a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct EmailImage {
    /// Content-ID of an embedded image.
    pub content_id: Option<String>,
    /// `cid:` reference, data URI or external URL.
    pub src: String,
    /// `true` for images carried inside the message.
    pub is_embedded: bool,
    /// Decoded size of an embedded image.
    pub size_bytes: Option<usize>,
    /// Lowercase `type/subtype` of an embedded image.
    pub mime_type: Option<String>,
}

/// Structured, display-ready message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DecodedMessage {
    /// Decoded `Subject`.
    pub subject: String,
    /// Decoded `From`.
    pub from: String,
    /// Decoded `To`.
    pub to: String,
    /// Decoded `Cc`.
    pub cc: Option<String>,
    /// Decoded `Bcc`.
    pub bcc: Option<String>,
    /// Parsed `Date`.
    pub date: Option<DateTime<Utc>>,
    /// Plain text body.
    pub text: String,
    /// HTML body.
    pub html: String,
    /// Embedded and external images.
    pub images: Vec<EmailImage>,
    /// Attachments, including the bytes of embedded images.
    pub attachments: Vec<EmailAttachment>,
    /// Problems found while decoding and security notes for the reader.
    pub warnings: Vec<String>,
    /// Undecoded header values by lowercase name.
    pub raw_headers: BTreeMap<String, String>,
}

/// Envelope headers of a header-only fetch, decoded for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MessageHeaders {
    /// Decoded `Subject`.
    pub subject: String,
    /// Decoded `From`.
    pub from: String,
    /// Decoded `To`.
    pub to: String,
    /// Parsed `Date`.
    pub date: Option<DateTime<Utc>>,
    /// `Message-ID` as sent.
    pub message_id: Option<String>,
}

/// Message content stored as plain fields instead of raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct LegacyMessage {
    /// Subject.
    pub subject: String,
    /// Sender.
    pub from: String,
    /// Recipients.
    pub to: String,
    /// Carbon copy recipients.
    pub cc: Option<String>,
    /// Blind carbon copy recipients.
    pub bcc: Option<String>,
    /// Date as stored.
    pub date: Option<String>,
    /// Body, either plain text or HTML.
    pub body: String,
    /// Short preview, used when the body is empty.
    pub preview: Option<String>,
    /// Attachment metadata.
    pub attachments: Vec<EmailAttachment>,
}

/// Decoder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Charset fallback order.
    pub charset_fallbacks: Vec<String>,
    /// Whether `<img>` elements with external URLs are blocked.
    pub block_external_images: bool,
    /// Whether attachment bytes are included as base64.
    pub include_attachment_content: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            charset_fallbacks: DEFAULT_FALLBACKS.iter().map(ToString::to_string).collect(),
            block_external_images: true,
            include_attachment_content: true,
        }
    }
}

/// Message decoder.
#[derive(Debug)]
pub struct Decoder {
    converter: CharsetConverter,
    sanitizer: HtmlSanitizer,
    include_attachment_content: bool,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(&DecoderConfig::default())
    }
}

impl Decoder {
    /// Creates a decoder from settings.
    #[must_use]
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            converter: CharsetConverter::new(&config.charset_fallbacks),
            sanitizer: HtmlSanitizer::new().block_external_images(config.block_external_images),
            include_attachment_content: config.include_attachment_content,
        }
    }

    /// Returns the charset converter used for bodies and headers.
    #[must_use]
    pub const fn converter(&self) -> &CharsetConverter {
        &self.converter
    }

    /// Decodes a raw message without sanitizing its HTML.
    ///
    /// `preview` is used as the body when no displayable part is found.
    #[must_use]
    pub fn decode(&self, raw: &[u8], preview: Option<&str>) -> DecodedMessage {
        self.decode_with_headers(raw, preview).0
    }

    /// Decodes a raw message, sanitizes its HTML and adds security
    /// warnings.
    #[must_use]
    pub fn render(&self, raw: &[u8], preview: Option<&str>) -> DecodedMessage {
        let (mut message, headers) = self.decode_with_headers(raw, preview);
        self.finish(&mut message, &headers);
        message
    }

    /// Builds a message from stored fields.
    ///
    /// HTML is detected by the presence of tag markup; the missing side is
    /// synthesized from the other.
    #[must_use]
    pub fn decode_legacy(&self, legacy: &LegacyMessage) -> DecodedMessage {
        let mut message = DecodedMessage {
            subject: repair_mojibake(&legacy.subject).into_owned(),
            from: legacy.from.clone(),
            to: legacy.to.clone(),
            cc: legacy.cc.clone(),
            bcc: legacy.bcc.clone(),
            date: legacy.date.as_deref().and_then(parse_date),
            attachments: legacy.attachments.clone(),
            ..DecodedMessage::default()
        };

        let body = repair_mojibake(&legacy.body);
        if body.trim().is_empty() {
            fill_fallback(&mut message, legacy.preview.as_deref());
        } else if looks_like_html(&body) {
            message.html = body.into_owned();
            message.text = html_to_text(&message.html);
        } else {
            message.text = body.into_owned();
            message.html = text_to_html(&message.text);
        }

        message
    }

    /// Builds a message from stored fields and sanitizes it.
    #[must_use]
    pub fn render_legacy(&self, legacy: &LegacyMessage) -> DecodedMessage {
        let mut message = self.decode_legacy(legacy);
        self.finish(&mut message, &Headers::new());
        message
    }

    /// Decodes a header block, such as the result of fetching selected
    /// header fields. Anything after the first empty line is ignored.
    #[must_use]
    pub fn decode_headers(&self, raw: &[u8]) -> MessageHeaders {
        let (head, _) = split_header_body(raw);
        let head = if head.is_empty() { raw } else { head };
        let headers = Headers::parse(&self.converter.convert(head, None).text);

        MessageHeaders {
            subject: self.header(&headers, "subject").unwrap_or_default(),
            from: self.header(&headers, "from").unwrap_or_default(),
            to: self.header(&headers, "to").unwrap_or_default(),
            date: headers.get("date").and_then(parse_date),
            message_id: headers.get("message-id").map(|id| id.trim().to_string()),
        }
    }

    /// Builds a one-line preview from the leading bytes of a body part.
    ///
    /// A part fetched on its own may open with multipart delimiters and
    /// part headers; those are skipped and the innermost part's transfer
    /// encoding and charset applied. Undeclared base64 and quoted-printable
    /// are recognized by their shape. HTML is reduced to text and
    /// whitespace is collapsed before truncating to `max_chars`.
    #[must_use]
    pub fn preview(&self, bytes: &[u8], max_chars: usize) -> String {
        let (headers, content) = skip_part_preamble(bytes);
        let content_type = headers
            .get("content-type")
            .and_then(|value| ContentType::parse(value).ok());
        let encoding = headers
            .get("content-transfer-encoding")
            .map(TransferEncoding::parse);

        let decoded = match encoding {
            Some(TransferEncoding::Base64) => decode_base64_prefix(content),
            Some(TransferEncoding::QuotedPrintable) => Some(decode_quoted_printable(content)),
            Some(_) => None,
            None if looks_like_base64(content) => decode_base64_prefix(content),
            None if has_soft_breaks(content) => Some(decode_quoted_printable(content)),
            None => None,
        };
        let decoded = decoded.unwrap_or_else(|| content.to_vec());

        let charset = content_type.as_ref().and_then(ContentType::charset);
        let text = self.converter.convert(&decoded, charset).text;
        let text = if looks_like_html(&text) {
            html_to_text(&text)
        } else {
            text
        };
        preview_text(&text, max_chars)
    }

    fn finish(&self, message: &mut DecodedMessage, headers: &Headers) {
        let security = analyze(headers, &message.html);
        let sanitized = self.sanitizer.sanitize(&message.html);

        message.html = sanitized.html;
        message
            .images
            .extend(sanitized.blocked_images.into_iter().map(|src| EmailImage {
                src,
                ..EmailImage::default()
            }));
        message.warnings.extend(sanitized.warnings);
        message.warnings.extend(security);
    }

    fn decode_with_headers(&self, raw: &[u8], preview: Option<&str>) -> (DecodedMessage, Headers) {
        let root = Part::parse(raw, &self.converter);
        let headers = root.headers.clone();

        let mut message = DecodedMessage {
            subject: self.header(&headers, "subject").unwrap_or_default(),
            from: self.header(&headers, "from").unwrap_or_default(),
            to: self.header(&headers, "to").unwrap_or_default(),
            cc: self.header(&headers, "cc"),
            bcc: self.header(&headers, "bcc"),
            date: headers.get("date").and_then(parse_date),
            raw_headers: headers.to_map(),
            ..DecodedMessage::default()
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            message.warnings.push("Message source was empty".to_string());
        }

        let mut collector = Collector {
            decoder: self,
            text: Vec::new(),
            html: Vec::new(),
            message: &mut message,
        };
        collector.visit(&root);
        let Collector { text, html, .. } = collector;

        message.text = text.join("\n");
        message.html = html.join("\n");

        match (message.text.is_empty(), message.html.is_empty()) {
            (true, true) => fill_fallback(&mut message, preview),
            (true, false) => message.text = html_to_text(&message.html),
            (false, true) => message.html = text_to_html(&message.text),
            (false, false) => {}
        }

        (message, headers)
    }

    fn header(&self, headers: &Headers, name: &str) -> Option<String> {
        headers
            .get(name)
            .map(|value| decode_encoded_words(value, &self.converter))
    }
}

/// Walks the MIME tree and sorts leaves into bodies, images and
/// attachments.
struct Collector<'a> {
    decoder: &'a Decoder,
    text: Vec<String>,
    html: Vec<String>,
    message: &'a mut DecodedMessage,
}

impl Collector<'_> {
    fn visit(&mut self, part: &Part) {
        self.message.warnings.extend(part.warnings.iter().cloned());
        if part.is_multipart() {
            for child in &part.children {
                self.visit(child);
            }
        } else {
            self.leaf(part);
        }
    }

    fn leaf(&mut self, part: &Part) {
        let content_type = &part.content_type;
        let disposition = part.disposition();
        let declared_attachment = disposition
            .as_ref()
            .is_some_and(ContentDisposition::is_attachment);
        let filename = disposition
            .as_ref()
            .and_then(|d| d.filename().map(str::to_string))
            .or_else(|| content_type.name().map(str::to_string))
            .map(|name| decode_encoded_words(&name, &self.decoder.converter));

        let bytes = match part.decode_body() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "part body could not be decoded");
                self.message.warnings.push(format!(
                    "Could not decode {} content ({e}); showing it undecoded",
                    part.transfer_encoding()
                ));
                part.body.clone()
            }
        };

        let is_body_text = content_type.main_type == "text"
            && matches!(content_type.sub_type.as_str(), "plain" | "html")
            && !declared_attachment
            && filename.is_none();

        if is_body_text {
            let converted = self.decoder.converter.convert(&bytes, content_type.charset());
            if let Some(warning) = converted.warning {
                self.message.warnings.push(warning);
            }
            if content_type.sub_type == "html" {
                self.html.push(converted.text);
            } else {
                self.text.push(converted.text);
            }
            return;
        }

        let mime_type = content_type.mime_type();
        let content_id = part.content_id();
        let inline_image = content_type.main_type == "image"
            && !declared_attachment
            && (content_id.is_some() || disposition.is_some());

        if inline_image {
            let src = content_id.as_ref().map_or_else(
                || format!("data:{mime_type};base64,{}", encode_base64(&bytes)),
                |id| format!("cid:{id}"),
            );
            self.message.images.push(EmailImage {
                content_id: content_id.clone(),
                src,
                is_embedded: true,
                size_bytes: Some(bytes.len()),
                mime_type: Some(mime_type.clone()),
            });
        }

        let name = filename.unwrap_or_else(|| {
            if content_type.is("message", "rfc822") {
                "message.eml".to_string()
            } else {
                format!("attachment-{}", self.message.attachments.len() + 1)
            }
        });
        debug!(%name, %mime_type, size = bytes.len(), "extracted attachment");

        self.message.attachments.push(EmailAttachment {
            name,
            size_bytes: bytes.len(),
            mime_type,
            content_id,
            content_base64: self
                .decoder
                .include_attachment_content
                .then(|| encode_base64(&bytes)),
        });
    }
}

fn fill_fallback(message: &mut DecodedMessage, preview: Option<&str>) {
    match preview.map(str::trim).filter(|p| !p.is_empty()) {
        Some(preview) => {
            message
                .warnings
                .push("Message body could not be displayed; showing the preview instead".to_string());
            message.text = preview.to_string();
        }
        None => {
            message
                .warnings
                .push("Message has no displayable content".to_string());
            message.text = NO_CONTENT_PLACEHOLDER.to_string();
        }
    }
    message.html = text_to_html(&message.text);
}

/// Shortest run of base64 symbols taken for an undeclared base64 body.
const MIN_BASE64_PREVIEW: usize = 16;

/// Skips delimiter and header lines at the start of a separately fetched
/// body part, descending into nested multiparts. Returns the innermost
/// part's headers and its content up to the next delimiter.
fn skip_part_preamble(bytes: &[u8]) -> (Headers, &[u8]) {
    let mut headers = Headers::new();
    let mut rest = bytes;
    let mut delimiter = None;
    let mut expected: Option<Vec<u8>> = None;

    for _ in 0..MAX_DEPTH {
        let Some((line, part)) = find_delimiter(rest, expected.as_deref()) else {
            break;
        };
        delimiter = Some(expected.take().unwrap_or_else(|| line.to_vec()));
        let (head, body) = split_header_body(part);
        headers = Headers::parse(&String::from_utf8_lossy(head));
        rest = body;
        expected = headers
            .get("content-type")
            .and_then(|value| ContentType::parse(value).ok())
            .filter(ContentType::is_multipart)
            .and_then(|ct| ct.boundary().map(|b| format!("--{b}").into_bytes()));
        if expected.is_none() {
            break;
        }
    }

    match delimiter {
        Some(delimiter) => (headers, cut_at_line(rest, &delimiter)),
        None => (headers, rest),
    }
}

/// Finds the first delimiter line. At the top level only blank lines may
/// precede it; inside a known multipart a preamble may.
fn find_delimiter<'a>(bytes: &'a [u8], expected: Option<&[u8]>) -> Option<(&'a [u8], &'a [u8])> {
    let mut cursor = bytes;
    while !cursor.is_empty() {
        let (line, next) = match cursor.iter().position(|&b| b == b'\n') {
            Some(end) => (&cursor[..end], &cursor[end + 1..]),
            None => (cursor, &cursor[cursor.len()..]),
        };
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let is_delimiter = match expected {
            Some(expected) => line.starts_with(expected),
            None => {
                line.len() > 2
                    && line.starts_with(b"--")
                    && !line.iter().any(u8::is_ascii_whitespace)
            }
        };
        if is_delimiter {
            return Some((line, next));
        }
        if expected.is_none() && !line.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        cursor = next;
    }
    None
}

fn cut_at_line<'a>(bytes: &'a [u8], delimiter: &[u8]) -> &'a [u8] {
    let mut needle = Vec::with_capacity(delimiter.len() + 1);
    needle.push(b'\n');
    needle.extend_from_slice(delimiter);
    bytes
        .windows(needle.len())
        .position(|window| window == needle.as_slice())
        .map_or(bytes, |end| &bytes[..end])
}

fn has_soft_breaks(bytes: &[u8]) -> bool {
    bytes.windows(2).any(|w| w == b"=\n") || bytes.windows(3).any(|w| w == b"=\r\n")
}

/// Whether `bytes` holds only base64 lines, too long to be a plain word.
fn looks_like_base64(bytes: &[u8]) -> bool {
    let mut symbols = 0;
    for &byte in bytes {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' | b'=' => symbols += 1,
            b'\r' | b'\n' => {}
            _ => return false,
        }
    }
    symbols >= MIN_BASE64_PREVIEW
}

/// Decodes base64 cut off at an arbitrary byte, dropping the incomplete
/// quantum and any UTF-8 sequence split by it.
fn decode_base64_prefix(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut cleaned: Vec<u8> = bytes
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    cleaned.truncate(cleaned.len() - cleaned.len() % 4);
    let mut decoded = decode_base64(&cleaned).ok()?;
    if let Err(e) = std::str::from_utf8(&decoded) {
        if e.error_len().is_none() {
            decoded.truncate(e.valid_up_to());
        }
    }
    Some(decoded)
}

/// Parses a `Date` header value.
///
/// Accepts RFC 2822 dates, with or without a trailing comment such as
/// `(UTC)`, and RFC 3339 timestamps.
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let without_comment = value
        .rfind('(')
        .filter(|_| value.ends_with(')'))
        .map_or(value, |open| value[..open].trim_end());

    DateTime::parse_from_rfc2822(without_comment)
        .or_else(|_| DateTime::parse_from_rfc3339(without_comment))
        .or_else(|_| {
            // Some senders put a day name chrono does not accept.
            let without_day = without_comment
                .split_once(',')
                .map_or(without_comment, |(_, rest)| rest.trim());
            DateTime::parse_from_rfc2822(without_day)
        })
        .map(|date| date.with_timezone(&Utc))
        .ok()
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
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_parse_date() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_date("Fri, 01 Mar 2024 13:00:00 +0100"), Some(expected));
        assert_eq!(parse_date("Fri, 01 Mar 2024 12:00:00 +0000 (UTC)"), Some(expected));
        assert_eq!(parse_date("01 Mar 2024 12:00:00 +0000"), Some(expected));
        assert_eq!(parse_date("2024-03-01T12:00:00Z"), Some(expected));
        assert_eq!(parse_date("Xyz, 01 Mar 2024 12:00:00 +0000"), Some(expected));
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn test_fill_fallback_prefers_preview() {
        let mut message = DecodedMessage::default();
        fill_fallback(&mut message, Some("  short preview "));
        assert_eq!(message.text, "short preview");
        assert_eq!(message.html, "short preview");
        assert_eq!(message.warnings.len(), 1);

        let mut message = DecodedMessage::default();
        fill_fallback(&mut message, Some("   "));
        assert_eq!(message.text, NO_CONTENT_PLACEHOLDER);
    }

    #[test]
    fn test_legacy_plain_text() {
        let legacy = LegacyMessage {
            subject: "Hi".to_string(),
            body: "line one\nline 2 < 3".to_string(),
            ..LegacyMessage::default()
        };
        let message = Decoder::default().decode_legacy(&legacy);
        assert_eq!(message.text, "line one\nline 2 < 3");
        assert_eq!(message.html, "line one<br>line 2 &lt; 3");
    }

    #[test]
    fn test_legacy_html() {
        let legacy = LegacyMessage {
            body: "<p>Hello &amp; welcome</p>".to_string(),
            date: Some("Fri, 01 Mar 2024 12:00:00 +0000".to_string()),
            ..LegacyMessage::default()
        };
        let message = Decoder::default().decode_legacy(&legacy);
        assert_eq!(message.html, "<p>Hello &amp; welcome</p>");
        assert_eq!(message.text, "Hello & welcome");
        assert!(message.date.is_some());
    }

    #[test]
    fn test_legacy_empty_body_uses_preview() {
        let legacy = LegacyMessage {
            preview: Some("from the list view".to_string()),
            ..LegacyMessage::default()
        };
        let message = Decoder::default().decode_legacy(&legacy);
        assert_eq!(message.text, "from the list view");
        assert!(!message.warnings.is_empty());
    }

    #[test]
    fn test_legacy_repairs_mojibake() {
        let legacy = LegacyMessage {
            subject: "CafÃ©".to_string(),
            body: "CafÃ© au lait".to_string(),
            ..LegacyMessage::default()
        };
        let message = Decoder::default().decode_legacy(&legacy);
        assert_eq!(message.subject, "Café");
        assert_eq!(message.text, "Café au lait");
    }

    #[test]
    fn test_render_legacy_sanitizes() {
        let legacy = LegacyMessage {
            body: "<p>ok</p><script>alert(1)</script>".to_string(),
            ..LegacyMessage::default()
        };
        let message = Decoder::default().render_legacy(&legacy);
        assert_eq!(message.html, "<p>ok</p>");
    }

    #[test]
    fn test_decode_headers() {
        let raw = b"Subject: =?UTF-8?B?SGVsbG8=?=\r\nFrom: Ann <ann@x.org>\r\n\
Date: Fri, 01 Mar 2024 12:00:00 +0000\r\nMessage-ID: <1@x.org>\r\n\r\n";
        let headers = Decoder::default().decode_headers(raw);
        assert_eq!(headers.subject, "Hello");
        assert_eq!(headers.from, "Ann <ann@x.org>");
        assert_eq!(headers.to, "");
        assert!(headers.date.is_some());
        assert_eq!(headers.message_id.as_deref(), Some("<1@x.org>"));
    }

    #[test]
    fn test_preview() {
        let decoder = Decoder::default();
        assert_eq!(decoder.preview(b"Hello   there\r\n\r\nfriend", 200), "Hello there friend");
        assert_eq!(decoder.preview(b"Caf=C3=A9 soft=\r\nbreak", 200), "Café softbreak");
        assert_eq!(decoder.preview(b"<p>Hi</p><p>you</p>", 200), "Hi you");
        assert_eq!(decoder.preview(b"abcdef", 3), "abc...");
    }

    #[test]
    fn test_preview_of_undeclared_base64() {
        let decoder = Decoder::default();
        let encoded = encode_base64("Quarterly numbers are attached, café included.".as_bytes());
        assert_eq!(
            decoder.preview(encoded.as_bytes(), 200),
            "Quarterly numbers are attached, café included."
        );

        // Cut mid-quantum, as a partial fetch does.
        let cut = &encoded.as_bytes()[..encoded.len() - 3];
        assert!(decoder.preview(cut, 200).starts_with("Quarterly numbers are attached"));

        assert_eq!(decoder.preview(b"Thanks", 200), "Thanks");
    }

    #[test]
    fn test_preview_skips_part_headers() {
        let decoder = Decoder::default();
        let part = b"--inner\r\n\
            Content-Type: text/plain; charset=utf-8\r\n\
            Content-Transfer-Encoding: quoted-printable\r\n\r\n\
            Caf=C3=A9 au lait\r\n\
            --inner\r\n\
            Content-Type: text/html\r\n\r\n\
            <p>Other</p>\r\n\
            --inner--\r\n";
        assert_eq!(decoder.preview(part, 200), "Café au lait");
    }

    #[test]
    fn test_preview_descends_into_nested_multipart() {
        let decoder = Decoder::default();
        let mut part = b"--outer\r\n\
            Content-Type: multipart/alternative; boundary=\"inner\"\r\n\r\n\
            This is a multi-part message.\r\n\
            --inner\r\n\
            Content-Type: text/plain\r\n\
            Content-Transfer-Encoding: base64\r\n\r\n"
            .to_vec();
        part.extend_from_slice(encode_base64(b"See you at noon").as_bytes());
        part.extend_from_slice(b"\r\n--inner--\r\n--outer--\r\n");
        assert_eq!(decoder.preview(&part, 200), "See you at noon");
    }

    #[test]
    fn test_preview_keeps_signature_dashes() {
        let decoder = Decoder::default();
        assert_eq!(decoder.preview(b"-- \r\nAlice", 200), "-- Alice");
    }
}

//! Building outgoing RFC 5322 messages.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{encode_base64_wrapped, encode_header_value, encode_quoted_printable};
use crate::error::{Error, Result};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// File attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingAttachment {
    /// File name shown to recipients.
    pub name: String,
    /// MIME type, `application/octet-stream` when unknown.
    pub mime_type: String,
    /// Raw content.
    pub content: Vec<u8>,
}

/// A message ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    /// `Message-ID` with angle brackets.
    pub message_id: String,
    /// Envelope sender address.
    pub sender: String,
    /// Envelope recipient addresses (To, Cc and Bcc).
    pub recipients: Vec<String>,
    /// Full message with CRLF line endings.
    pub content: String,
}

/// Builder for outgoing messages.
///
/// Produces `text/plain` or `text/html` for a single body,
/// `multipart/alternative` when both exist, wrapped in `multipart/mixed`
/// when there are attachments.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    subject: String,
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<OutgoingAttachment>,
    date: Option<DateTime<Utc>>,
    message_id: Option<String>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender.
    #[must_use]
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    /// Adds a `To` recipient.
    #[must_use]
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Adds a `Cc` recipient.
    #[must_use]
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    /// Adds a `Bcc` recipient. Bcc recipients get the message but are not
    /// written to the headers.
    #[must_use]
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the plain text body.
    #[must_use]
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: OutgoingAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Overrides the `Date` header (defaults to now).
    #[must_use]
    pub const fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Overrides the generated `Message-ID`.
    #[must_use]
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Builds the message.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no sender or no recipient.
    pub fn build(self) -> Result<ComposedMessage> {
        let from = self
            .from
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| Error::MissingHeader("From".to_string()))?;
        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(Error::MissingHeader("To".to_string()));
        }

        let date = self.date.unwrap_or_else(Utc::now);
        let message_id = self
            .message_id
            .unwrap_or_else(|| generate_message_id(&from, date));

        let mut out = String::new();
        let _ = write!(out, "From: {from}\r\n");
        if !self.to.is_empty() {
            let _ = write!(out, "To: {}\r\n", self.to.join(", "));
        }
        if !self.cc.is_empty() {
            let _ = write!(out, "Cc: {}\r\n", self.cc.join(", "));
        }
        let _ = write!(out, "Subject: {}\r\n", encode_header_value(&self.subject));
        let _ = write!(out, "Date: {}\r\n", date.to_rfc2822());
        let _ = write!(out, "Message-ID: {message_id}\r\n");
        out.push_str("MIME-Version: 1.0\r\n");

        let body = body_entity(self.text.as_deref(), self.html.as_deref());
        if self.attachments.is_empty() {
            out.push_str(&body);
        } else {
            let boundary = generate_boundary("mixed");
            let _ = write!(
                out,
                "Content-Type: {}\r\n\r\n",
                ContentType::new("multipart", "mixed").with_parameter("boundary", &boundary)
            );
            let _ = write!(out, "--{boundary}\r\n{body}\r\n");
            for attachment in &self.attachments {
                let _ = write!(out, "--{boundary}\r\n{}\r\n", attachment_entity(attachment));
            }
            let _ = write!(out, "--{boundary}--\r\n");
        }

        let mut recipients = self.to;
        recipients.extend(self.cc);
        recipients.extend(self.bcc);

        Ok(ComposedMessage {
            message_id,
            sender: bare_address(&from).to_string(),
            recipients: recipients
                .iter()
                .map(|r| bare_address(r).to_string())
                .collect(),
            content: out,
        })
    }
}

/// Headers plus body of the text/HTML entity, without a trailing CRLF.
fn body_entity(text: Option<&str>, html: Option<&str>) -> String {
    match (text, html) {
        (Some(text), Some(html)) => {
            let boundary = generate_boundary("alt");
            format!(
                "Content-Type: {}\r\n\r\n--{boundary}\r\n{}\r\n--{boundary}\r\n{}\r\n--{boundary}--",
                ContentType::new("multipart", "alternative").with_parameter("boundary", &boundary),
                text_entity("plain", text),
                text_entity("html", html),
            )
        }
        (None, Some(html)) => text_entity("html", html),
        (text, None) => text_entity("plain", text.unwrap_or_default()),
    }
}

fn text_entity(sub_type: &str, content: &str) -> String {
    format!(
        "Content-Type: {}\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\n{}",
        ContentType::new("text", sub_type).with_parameter("charset", "utf-8"),
        encode_quoted_printable(content)
    )
}

fn attachment_entity(attachment: &OutgoingAttachment) -> String {
    let content_type = ContentType::parse(&attachment.mime_type)
        .unwrap_or_else(|_| ContentType::new("application", "octet-stream"));
    let name = encode_header_value(&attachment.name);
    format!(
        "Content-Type: {}\r\nContent-Disposition: {}\r\nContent-Transfer-Encoding: base64\r\n\r\n{}",
        content_type.with_parameter("name", &name),
        ContentDisposition::attachment(name),
        encode_base64_wrapped(&attachment.content)
    )
}

fn generate_boundary(kind: &str) -> String {
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("=_mb_{kind}_{nanos:x}_{sequence}")
}

fn generate_message_id(from: &str, date: DateTime<Utc>) -> String {
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let domain = bare_address(from)
        .rsplit_once('@')
        .map_or("localhost", |(_, domain)| domain);
    format!(
        "<{}.{sequence}@{domain}>",
        date.timestamp_nanos_opt().unwrap_or_default()
    )
}

/// Extracts `user@host` from `Name <user@host>`.
#[must_use]
pub fn bare_address(address: &str) -> &str {
    match (address.rfind('<'), address.rfind('>')) {
        (Some(open), Some(close)) if open < close => address[open + 1..close].trim(),
        _ => address.trim(),
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
    use crate::decode::Decoder;

    #[test]
    fn test_missing_sender_or_recipients() {
        assert!(MessageBuilder::new().to("a@example.com").build().is_err());
        assert!(MessageBuilder::new().from("a@example.com").build().is_err());
    }

    #[test]
    fn test_plain_message() {
        let message = MessageBuilder::new()
            .from("Alice <alice@example.com>")
            .to("bob@example.com")
            .bcc("hidden@example.com")
            .subject("Hello")
            .text_body("Hi Bob")
            .message_id("<fixed@example.com>")
            .build()
            .unwrap();

        assert_eq!(message.message_id, "<fixed@example.com>");
        assert_eq!(message.sender, "alice@example.com");
        assert_eq!(message.recipients, vec!["bob@example.com", "hidden@example.com"]);
        assert!(message.content.contains("Subject: Hello\r\n"));
        assert!(!message.content.contains("hidden@example.com"));
        assert!(message.content.contains("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_generated_message_id_uses_sender_domain() {
        let message = MessageBuilder::new()
            .from("alice@example.org")
            .to("bob@example.com")
            .build()
            .unwrap();
        assert!(message.message_id.starts_with('<'));
        assert!(message.message_id.ends_with("@example.org>"));
    }

    #[test]
    fn test_round_trip_through_decoder() {
        let message = MessageBuilder::new()
            .from("alice@example.com")
            .to("bob@example.com")
            .subject("Grüße")
            .text_body("Plain café")
            .html_body("<p>Rich café</p>")
            .attach(OutgoingAttachment {
                name: "notes.txt".to_string(),
                mime_type: "text/plain".to_string(),
                content: b"attached notes".to_vec(),
            })
            .build()
            .unwrap();

        let decoded = Decoder::default().decode(message.content.as_bytes(), None);
        assert_eq!(decoded.subject, "Grüße");
        assert_eq!(decoded.text, "Plain café");
        assert_eq!(decoded.html, "<p>Rich café</p>");
        assert_eq!(decoded.attachments.len(), 1);
        assert_eq!(decoded.attachments[0].name, "notes.txt");
        assert_eq!(decoded.attachments[0].size_bytes, 14);
        assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
    }

    #[test]
    fn test_bare_address() {
        assert_eq!(bare_address("Alice <alice@example.com>"), "alice@example.com");
        assert_eq!(bare_address(" bob@example.com "), "bob@example.com");
    }
}

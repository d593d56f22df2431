//! # mailbridge-mime
//!
//! MIME decoding and HTML safety for webmail display.
//!
//! ## Features
//!
//! - **Decoding**: turn a raw RFC 5322 message into subject, addresses,
//!   date, text, HTML, inline images and attachments
//! - **Charsets**: declared charset first, then a fallback chain, then
//!   lossy decoding with mojibake repair
//! - **Sanitizing**: allowlist HTML cleaning with external image blocking
//! - **Analysis**: spam, phishing and tracking-link warnings
//! - **Composing**: build outgoing messages with alternatives and attachments
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailbridge_mime::Decoder;
//!
//! let raw = b"Subject: Hi\r\nContent-Type: text/html\r\n\r\n<p>Hello</p><script>x()</script>";
//! let message = Decoder::default().render(raw, None);
//! assert_eq!(message.html, "<p>Hello</p>");
//! ```
//!
//! ### Building Messages
//!
//! ```ignore
//! use mailbridge_mime::MessageBuilder;
//!
//! let message = MessageBuilder::new()
//!     .from("sender@example.com")
//!     .to("recipient@example.com")
//!     .subject("Test")
//!     .text_body("Plain text version")
//!     .html_body("<p>HTML version</p>")
//!     .build()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod analyze;
mod compose;
mod content_type;
mod decode;
mod error;
mod header;
mod message;
mod sanitize;

pub mod charset;
pub mod encoding;
pub mod text;

pub use analyze::{PHISHING_WARNING, SPAM_WARNING, TRACKING_WARNING, analyze, has_tracking_links};
pub use charset::CharsetConverter;
pub use compose::{ComposedMessage, MessageBuilder, OutgoingAttachment, bare_address};
pub use content_type::{ContentDisposition, ContentType, DispositionKind};
pub use decode::{
    DecodedMessage, Decoder, DecoderConfig, EmailAttachment, EmailImage, LegacyMessage,
    MessageHeaders, NO_CONTENT_PLACEHOLDER, parse_date,
};
pub use error::{Error, Result};
pub use header::{Headers, split_header_body};
pub use message::{MAX_DEPTH, Part, TransferEncoding, split_multipart};
pub use sanitize::{EXTERNAL_IMAGES_WARNING, HtmlSanitizer, Sanitized};

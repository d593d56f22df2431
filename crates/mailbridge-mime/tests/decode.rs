//! End-to-end decoding tests on complete messages.

use mailbridge_mime::{
    Decoder, DecoderConfig, EXTERNAL_IMAGES_WARNING, NO_CONTENT_PLACEHOLDER, PHISHING_WARNING,
    SPAM_WARNING, TRACKING_WARNING,
};
use proptest::prelude::*;

const ALTERNATIVE: &[u8] = b"From: Alice <alice@example.com>\r\n\
To: bob@example.com\r\n\
Subject: Greetings\r\n\
Date: Fri, 01 Mar 2024 12:00:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
This is a multi-part message.\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hi\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Hi</p>\r\n\
--b1--\r\n";

#[test]
fn test_multipart_alternative() {
    let message = Decoder::default().render(ALTERNATIVE, None);

    assert_eq!(message.subject, "Greetings");
    assert_eq!(message.from, "Alice <alice@example.com>");
    assert_eq!(message.to, "bob@example.com");
    assert_eq!(message.cc, None);
    assert_eq!(message.text, "Hi");
    assert_eq!(message.html, "<p>Hi</p>");
    assert!(message.attachments.is_empty());
    assert!(message.warnings.is_empty(), "{:?}", message.warnings);
    assert_eq!(
        message.date.map(|d| d.to_rfc3339()),
        Some("2024-03-01T12:00:00+00:00".to_string())
    );
    assert_eq!(
        message.raw_headers.get("subject").map(String::as_str),
        Some("Greetings")
    );
}

#[test]
fn test_quoted_printable_latin1_body() {
    let raw = b"Subject: =?UTF-8?B?SGVsbG8=?=\r\n\
Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Caf=E9 cr=E8me, a very long line that was wrapped =\r\n\
by the sender.";
    let message = Decoder::default().decode(raw, None);

    assert_eq!(message.subject, "Hello");
    assert_eq!(
        message.text,
        "Café crème, a very long line that was wrapped by the sender."
    );
    assert_eq!(
        message.html,
        "Café crème, a very long line that was wrapped by the sender."
    );
}

#[test]
fn test_quoted_printable_utf8_body() {
    let raw = b"Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Caf=C3=A9";
    let message = Decoder::default().decode(raw, None);
    assert_eq!(message.text, "Café");
}

#[test]
fn test_mislabelled_charset_falls_back() {
    let raw = b"Content-Type: text/plain; charset=utf-8\r\n\r\nna\xefve";
    let message = Decoder::default().decode(raw, None);
    assert_eq!(message.text, "na\u{ef}ve");
    assert_eq!(message.warnings.len(), 1);
}

#[test]
fn test_attachments_and_inline_images() {
    let raw = b"Subject: Report\r\n\
Content-Type: multipart/mixed; boundary=outer\r\n\
\r\n\
--outer\r\n\
Content-Type: multipart/related; boundary=inner\r\n\
\r\n\
--inner\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>Chart:</p><img src=\"cid:chart@example\">\r\n\
--inner\r\n\
Content-Type: image/png\r\n\
Content-ID: <chart@example>\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw0K\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/pdf; name=\"report.pdf\"\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
SGVsbG8gUERG\r\n\
--outer\r\n\
Content-Type: message/rfc822\r\n\
\r\n\
Subject: forwarded\r\n\
\r\n\
inner body\r\n\
--outer--\r\n";
    let message = Decoder::default().render(raw, None);

    assert!(message.html.contains("src=\"cid:chart@example\""));
    assert_eq!(message.images.len(), 1);
    let image = &message.images[0];
    assert!(image.is_embedded);
    assert_eq!(image.src, "cid:chart@example");
    assert_eq!(image.content_id.as_deref(), Some("chart@example"));
    assert_eq!(image.size_bytes, Some(6));
    assert_eq!(image.mime_type.as_deref(), Some("image/png"));

    let names: Vec<&str> = message.attachments.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["attachment-1", "report.pdf", "message.eml"]);
    let pdf = &message.attachments[1];
    assert_eq!(pdf.mime_type, "application/pdf");
    assert_eq!(pdf.size_bytes, 9);
    assert_eq!(pdf.content_base64.as_deref(), Some("SGVsbG8gUERG"));
}

#[test]
fn test_attachment_content_can_be_omitted() {
    let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\
\r\n\
--x\r\n\
Content-Type: text/plain\r\n\
\r\n\
body\r\n\
--x\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment; filename*=utf-8''r%C3%A9sum%C3%A9.bin\r\n\
\r\n\
data\r\n\
--x--\r\n";
    let decoder = Decoder::new(&DecoderConfig {
        include_attachment_content: false,
        ..DecoderConfig::default()
    });
    let message = decoder.decode(raw, None);

    assert_eq!(message.text, "body");
    assert_eq!(message.attachments.len(), 1);
    assert_eq!(message.attachments[0].name, "résumé.bin");
    assert_eq!(message.attachments[0].size_bytes, 4);
    assert_eq!(message.attachments[0].content_base64, None);
}

#[test]
fn test_render_blocks_external_images_and_scripts() {
    let raw = b"Content-Type: text/html\r\n\r\n\
<p>Look</p><img src=\"https://tracker.example/pixel.gif\"><script>steal()</script>";
    let message = Decoder::default().render(raw, None);

    assert!(!message.html.contains("<script"));
    assert!(message.html.contains("data-external-src=\"https://tracker.example/pixel.gif\""));
    assert_eq!(message.warnings, vec![EXTERNAL_IMAGES_WARNING.to_string()]);
    assert_eq!(message.images.len(), 1);
    assert!(!message.images[0].is_embedded);
    assert_eq!(message.images[0].src, "https://tracker.example/pixel.gif");
}

#[test]
fn test_render_security_warnings() {
    let raw = b"X-Spam-Flag: YES\r\n\
X-Phishing-Warning: lookalike domain\r\n\
Content-Type: text/html\r\n\
\r\n\
<a href=\"https://mail.example/track/open?id=7\">Open</a>";
    let message = Decoder::default().render(raw, None);

    assert_eq!(
        message.warnings,
        vec![
            SPAM_WARNING.to_string(),
            PHISHING_WARNING.to_string(),
            TRACKING_WARNING.to_string()
        ]
    );
}

#[test]
fn test_empty_message_uses_preview() {
    let message = Decoder::default().decode(b"", Some("cached preview"));
    assert_eq!(message.text, "cached preview");
    assert!(!message.warnings.is_empty());

    let message = Decoder::default().decode(b"", None);
    assert_eq!(message.text, NO_CONTENT_PLACEHOLDER);
}

#[test]
fn test_html_only_gets_text_alternative() {
    let raw = b"Content-Type: text/html\r\n\r\n<p>One</p><p>Two &amp; three</p>";
    let message = Decoder::default().decode(raw, None);
    assert!(message.text.contains("One"));
    assert!(message.text.contains("Two & three"));
}

#[test]
fn test_missing_boundary_is_shown_as_text() {
    let raw = b"Content-Type: multipart/mixed\r\n\r\nplain words";
    let message = Decoder::default().decode(raw, None);
    assert_eq!(message.text, "plain words");
    assert_eq!(message.warnings.len(), 1);
}

proptest! {
    #[test]
    fn decode_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
        let message = Decoder::default().render(&raw, None);
        prop_assert!(!message.text.is_empty());
    }
}

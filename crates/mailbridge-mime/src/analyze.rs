//! Security warnings derived from headers and message HTML.

use std::sync::LazyLock;

use regex::Regex;

use crate::header::Headers;

/// Warning for messages the server's spam filter flagged.
pub const SPAM_WARNING: &str = "This message was flagged as spam by the mail server";

/// Warning for messages carrying a phishing marker header.
pub const PHISHING_WARNING: &str = "This message was flagged as a possible phishing attempt";

/// Warning for messages with tracking links.
pub const TRACKING_WARNING: &str = "This message contains links that may track when you open them";

/// Headers whose presence marks a message as suspected phishing.
const PHISHING_HEADERS: [&str; 2] = ["x-phishing-warning", "x-phishing"];

#[allow(clippy::unwrap_used)]
static TRACKING_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"[^"]*track[^"]*"|'[^']*track[^']*'|[^\s>]*track[^\s>]*)"#)
        .unwrap()
});

/// Inspects headers and the (unsanitized) HTML body and returns reader
/// warnings in a fixed order: spam, phishing, tracking.
#[must_use]
pub fn analyze(headers: &Headers, html: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    if headers.get("x-spam-flag").is_some_and(is_truthy) {
        warnings.push(SPAM_WARNING.to_string());
    }

    if PHISHING_HEADERS.iter().any(|name| headers.contains(name)) {
        warnings.push(PHISHING_WARNING.to_string());
    }

    if has_tracking_links(html) {
        warnings.push(TRACKING_WARNING.to_string());
    }

    warnings
}

/// Returns `true` if any anchor's `href` contains "track", ignoring case.
#[must_use]
pub fn has_tracking_links(html: &str) -> bool {
    TRACKING_LINK.is_match(html)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "1" | "on"
    )
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
    fn test_clean_message_has_no_warnings() {
        let headers = Headers::parse("X-Spam-Flag: NO\n");
        assert!(analyze(&headers, "<a href=\"https://example.com\">x</a>").is_empty());
    }

    #[test]
    fn test_spam_flag() {
        let headers = Headers::parse("X-Spam-Flag: YES\n");
        assert_eq!(analyze(&headers, ""), vec![SPAM_WARNING.to_string()]);
    }

    #[test]
    fn test_phishing_header() {
        let headers = Headers::parse("X-Phishing-Warning: suspicious sender\n");
        assert_eq!(analyze(&headers, ""), vec![PHISHING_WARNING.to_string()]);
    }

    #[test]
    fn test_tracking_links() {
        assert!(has_tracking_links("<a href=\"https://x.example/TRACK?id=1\">x</a>"));
        assert!(has_tracking_links("<A class='btn' HREF='https://click.example/tracking/abc'>y</A>"));
        assert!(has_tracking_links("<a href=https://t.example/track>z</a>"));
        assert!(!has_tracking_links("<a href=\"https://example.com\">track me</a>"));
        assert!(!has_tracking_links("<img src=\"https://x.example/track.gif\">"));
    }

    #[test]
    fn test_warning_order() {
        let headers = Headers::parse("X-Spam-Flag: true\nX-Phishing: 1\n");
        let warnings = analyze(&headers, "<a href=\"/track\">t</a>");
        assert_eq!(
            warnings,
            vec![
                SPAM_WARNING.to_string(),
                PHISHING_WARNING.to_string(),
                TRACKING_WARNING.to_string()
            ]
        );
    }
}

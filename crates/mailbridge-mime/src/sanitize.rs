//! HTML sanitizing for message display.
//!
//! Built on `ammonia`, which parses the input with html5ever and keeps only
//! an allowlist of tags and attributes. On top of the allowlist:
//!
//! - `script`, `iframe`, `object`, `embed`, `form`, `input`, `textarea`,
//!   `button`, `link`, `meta` and `style` are removed with their content;
//! - `href`/`src` values using `javascript:`, `vbscript:` or `data:` are
//!   replaced by a placeholder;
//! - `<img>` elements pointing at an absolute external URL are rewritten
//!   so they no longer load, keeping the original URL in
//!   `data-external-src`.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use ammonia::{Builder, UrlRelative};
use regex::{Captures, Regex};
use tracing::debug;

use crate::text::decode_entities;

/// Elements dropped together with everything inside them.
pub const REMOVED_ELEMENTS: [&str; 11] = [
    "script", "iframe", "object", "embed", "form", "input", "textarea", "button", "link", "meta",
    "style",
];

/// URL schemes neutralized in `href` and `src`.
const DANGEROUS_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

/// Replacement for a neutralized `href`.
pub const LINK_PLACEHOLDER: &str = "#";

/// Replacement for a neutralized or blocked `src`.
pub const SOURCE_PLACEHOLDER: &str = "about:blank";

/// Warning added when external images were blocked.
pub const EXTERNAL_IMAGES_WARNING: &str = "External images were blocked to protect your privacy";

#[allow(clippy::unwrap_used)]
static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").unwrap());

#[allow(clippy::unwrap_used)]
static EXTERNAL_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(\s)src="((?:https?:)?//[^"]*)""#).unwrap());

/// Result of sanitizing one HTML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sanitized {
    /// Safe HTML.
    pub html: String,
    /// URLs of external images that were blocked, in document order.
    pub blocked_images: Vec<String>,
    /// Warnings for the reader.
    pub warnings: Vec<String>,
}

/// Allowlist-based HTML sanitizer.
pub struct HtmlSanitizer {
    builder: Builder<'static>,
    block_external_images: bool,
}

impl std::fmt::Debug for HtmlSanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlSanitizer")
            .field("block_external_images", &self.block_external_images)
            .finish_non_exhaustive()
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlSanitizer {
    /// Creates a sanitizer that blocks external images.
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Builder::default();
        builder
            .clean_content_tags(REMOVED_ELEMENTS.into_iter().collect::<HashSet<_>>())
            .add_url_schemes(&["cid", "about"])
            .url_relative(UrlRelative::PassThrough)
            .add_tag_attributes("a", &["target"])
            .add_tag_attributes("td", &["align", "valign", "bgcolor", "width"])
            .add_tag_attributes(
                "table",
                &["align", "bgcolor", "border", "cellpadding", "cellspacing", "width"],
            )
            .add_tag_attributes("font", &["color", "face", "size"])
            .add_tags(&["font", "center"])
            .attribute_filter(|_element, attribute, value| match attribute {
                "href" if is_dangerous_url(value) => Some(Cow::Borrowed(LINK_PLACEHOLDER)),
                "src" if is_dangerous_url(value) => Some(Cow::Borrowed(SOURCE_PLACEHOLDER)),
                _ => Some(Cow::Borrowed(value)),
            });

        Self {
            builder,
            block_external_images: true,
        }
    }

    /// Sets whether external images are blocked.
    #[must_use]
    pub const fn block_external_images(mut self, block: bool) -> Self {
        self.block_external_images = block;
        self
    }

    /// Sanitizes an HTML document or fragment.
    #[must_use]
    pub fn sanitize(&self, html: &str) -> Sanitized {
        let cleaned = self.builder.clean(html).to_string();
        if !self.block_external_images {
            return Sanitized {
                html: cleaned,
                ..Sanitized::default()
            };
        }

        let mut blocked_images = Vec::new();
        let html = IMG_TAG
            .replace_all(&cleaned, |tag: &Captures<'_>| {
                let tag = tag.get(0).map_or("", |m| m.as_str());
                EXTERNAL_SRC
                    .replace(tag, |src: &Captures<'_>| {
                        let space = src.get(1).map_or(" ", |m| m.as_str());
                        let url = src.get(2).map_or("", |m| m.as_str());
                        blocked_images.push(decode_entities(url));
                        format!(r#"{space}src="{SOURCE_PLACEHOLDER}" data-external-src="{url}""#)
                    })
                    .into_owned()
            })
            .into_owned();

        let mut warnings = Vec::new();
        if !blocked_images.is_empty() {
            debug!(count = blocked_images.len(), "blocked external images");
            warnings.push(EXTERNAL_IMAGES_WARNING.to_string());
        }

        Sanitized {
            html,
            blocked_images,
            warnings,
        }
    }
}

fn is_dangerous_url(value: &str) -> bool {
    // Browsers ignore whitespace and control characters inside the scheme.
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    DANGEROUS_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
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

    fn clean(html: &str) -> Sanitized {
        HtmlSanitizer::new().sanitize(html)
    }

    #[test]
    fn test_strips_script() {
        let out = clean("<p>ok</p><script>alert(1)</script>");
        assert_eq!(out.html, "<p>ok</p>");
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_removes_denied_elements_with_content() {
        let out = clean(
            "<div>a<iframe src=\"x\">inner</iframe><style>p{}</style><form><input value=\"v\"><button>Go</button></form>b</div>",
        );
        assert_eq!(out.html, "<div>ab</div>");
    }

    #[test]
    fn test_strips_event_handlers() {
        let out = clean("<p onclick=\"steal()\" onmouseover=\"x()\">hi</p><img src=\"cid:a\" onerror=\"boom()\">");
        assert!(!out.html.contains("onclick"));
        assert!(!out.html.contains("onmouseover"));
        assert!(!out.html.contains("onerror"));
        assert!(out.html.contains("<p>hi</p>"));
    }

    #[test]
    fn test_neutralizes_dangerous_schemes() {
        let out = clean("<a href=\"javascript:alert(1)\">x</a><a href=\" VBScript:msgbox\">y</a>");
        let lower = out.html.to_lowercase();
        assert!(!lower.contains("javascript"));
        assert!(!lower.contains("vbscript"));
        assert!(out.html.contains(">x</a>"));
        assert!(out.html.contains(">y</a>"));

        let out = clean("<img src=\"data:image/png;base64,AAAA\">");
        assert!(!out.html.contains("data:image"));
        assert!(out.html.starts_with("<img"));
    }

    #[test]
    fn test_blocks_external_images() {
        let out = clean("<img src=\"http://evil.example/x.png\">");
        assert!(!out.html.contains(" src=\"http://evil.example"));
        assert!(out.html.contains("src=\"about:blank\""));
        assert!(out.html.contains("data-external-src=\"http://evil.example/x.png\""));
        assert_eq!(out.blocked_images, vec!["http://evil.example/x.png".to_string()]);
        assert_eq!(out.warnings, vec![EXTERNAL_IMAGES_WARNING.to_string()]);
    }

    #[test]
    fn test_single_warning_for_many_images() {
        let out = clean("<img src=\"https://a.example/1.png\"><img src=\"https://b.example/2.png?a=1&amp;b=2\">");
        assert_eq!(out.blocked_images.len(), 2);
        assert_eq!(out.blocked_images[1], "https://b.example/2.png?a=1&b=2");
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_keeps_cid_images() {
        let out = clean("<img src=\"cid:logo@x\" alt=\"logo\">");
        assert!(out.html.contains("src=\"cid:logo@x\""));
        assert!(out.blocked_images.is_empty());
    }

    #[test]
    fn test_external_images_allowed_when_disabled() {
        let out = HtmlSanitizer::new()
            .block_external_images(false)
            .sanitize("<img src=\"https://a.example/1.png\">");
        assert!(out.html.contains("src=\"https://a.example/1.png\""));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_keeps_safe_links() {
        let out = clean("<a href=\"https://example.com/\">site</a>");
        assert!(out.html.contains("href=\"https://example.com/\""));
    }

    #[test]
    fn test_is_dangerous_url() {
        assert!(is_dangerous_url("javascript:void(0)"));
        assert!(is_dangerous_url("java\tscript:x"));
        assert!(is_dangerous_url("DATA:text/html,x"));
        assert!(!is_dangerous_url("https://example.com"));
        assert!(!is_dangerous_url("cid:part1"));
    }
}

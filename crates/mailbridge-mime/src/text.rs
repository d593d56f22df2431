//! Conversions between plain text and HTML bodies.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::unwrap_used)]
static HIDDEN_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|head|title)\b[^>]*>.*?</(script|style|head|title)\s*>").unwrap()
});

#[allow(clippy::unwrap_used)]
static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|li|tr|h[1-6]|blockquote|pre|table)\s*>").unwrap()
});

#[allow(clippy::unwrap_used)]
static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").unwrap());

#[allow(clippy::unwrap_used)]
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").unwrap());

#[allow(clippy::unwrap_used)]
static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?[a-zA-Z][a-zA-Z0-9]*)(\s[^<>]*)?/?>").unwrap());

#[allow(clippy::unwrap_used)]
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t]*(\n[ \t]*){2,}").unwrap());

/// Named entities decoded when flattening HTML to text.
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("nbsp", " "),
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("copy", "©"),
    ("reg", "®"),
    ("trade", "™"),
    ("hellip", "…"),
    ("mdash", "—"),
    ("ndash", "–"),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("ldquo", "\u{201c}"),
    ("rdquo", "\u{201d}"),
    ("bull", "•"),
    ("euro", "€"),
    ("pound", "£"),
    ("middot", "·"),
];

/// Escapes text for inclusion in HTML.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Converts plain text to HTML by escaping it and turning line breaks into
/// `<br>` elements.
#[must_use]
pub fn text_to_html(text: &str) -> String {
    escape_html(&text.replace("\r\n", "\n")).replace('\n', "<br>")
}

/// Flattens HTML to plain text.
///
/// Script and style blocks are dropped, block-level closers become line
/// breaks, remaining tags are stripped and a fixed set of entities is
/// decoded.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let without_hidden = HIDDEN_BLOCKS.replace_all(html, "");
    let with_breaks = LINE_BREAKS.replace_all(&without_hidden, "\n");
    let stripped = TAGS.replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);
    let normalized = decoded.replace("\r\n", "\n");
    BLANK_RUNS.replace_all(&normalized, "\n\n").trim().to_string()
}

/// Decodes named and numeric character references.
///
/// Unknown named entities are left untouched.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let name = caps.get(1).map_or("", |m| m.as_str());
            decode_entity(name).unwrap_or_else(|| whole.to_string())
        })
        .into_owned()
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(numeric) = name.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse().ok()?,
        };
        return char::from_u32(code)
            .filter(|c| *c != '\0')
            .map(String::from);
    }
    NAMED_ENTITIES
        .iter()
        .find(|(entity, _)| *entity == name)
        .map(|(_, value)| (*value).to_string())
}

/// Heuristic for stored content: `true` when the text contains tag markup.
#[must_use]
pub fn looks_like_html(text: &str) -> bool {
    MARKUP.is_match(text)
}

/// Collapses whitespace runs to single spaces and truncates to
/// `max_chars` characters, appending `...` when something was cut.
#[must_use]
pub fn preview_text(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > max_chars {
        let truncated: String = collapsed.chars().take(max_chars).collect();
        format!("{}...", truncated.trim_end())
    } else {
        collapsed
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

    #[test]
    fn test_text_to_html() {
        assert_eq!(text_to_html("a < b\r\nc & d"), "a &lt; b<br>c &amp; d");
    }

    #[test]
    fn test_html_to_text_basic() {
        assert_eq!(html_to_text("<p>Hi</p>"), "Hi");
        assert_eq!(html_to_text("<p>One</p><p>Two</p>"), "One\nTwo");
        assert_eq!(html_to_text("a<br>b<br/>c"), "a\nb\nc");
    }

    #[test]
    fn test_html_to_text_drops_scripts_and_styles() {
        let html = "<html><head><style>p{color:red}</style></head><body><p>Visible</p><script>alert(1)</script></body></html>";
        assert_eq!(html_to_text(html), "Visible");
    }

    #[test]
    fn test_html_to_text_entities() {
        assert_eq!(html_to_text("Tom &amp; Jerry&nbsp;&hellip;"), "Tom & Jerry …");
        assert_eq!(html_to_text("&#233;&#xE9;&unknown;"), "éé&unknown;");
    }

    #[test]
    fn test_html_to_text_collapses_blank_lines() {
        assert_eq!(html_to_text("a<br><br><br><br>b"), "a\n\nb");
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html("<p>hello</p>"));
        assert!(looks_like_html("line<br/>break"));
        assert!(!looks_like_html("2 < 3 and 5 > 4"));
        assert!(!looks_like_html("plain text"));
    }

    #[test]
    fn test_preview_text() {
        assert_eq!(preview_text("  Hello \r\n\t world  ", 200), "Hello world");
        let long = "word ".repeat(100);
        let preview = preview_text(&long, 200);
        assert!(preview.ends_with("..."));
        assert!(preview.chars().count() <= 203);
    }

    #[test]
    fn test_preview_text_multibyte() {
        assert_eq!(preview_text("ééééé", 3), "ééé...");
    }
}

//! MIME header handling.

use std::collections::BTreeMap;
use std::fmt;

/// Collection of email headers.
///
/// Names are case-folded to lowercase; values keep their arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .push((name.into().to_ascii_lowercase(), value.into()));
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Returns `true` if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the number of header lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over all headers.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Flattens the headers into one value per name.
    ///
    /// Repeated headers are joined with `", "`.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in &self.entries {
            map.entry(name.clone())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.clone());
        }
        map
    }

    /// Parses a header block.
    ///
    /// Lines starting with whitespace continue the previous header and are
    /// appended with a single space. Parsing stops at the first empty line.
    /// Lines without a colon are skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = current.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value.trim());
            }

            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if !name.is_empty() && !name.contains(' ') {
                    current = Some((name.to_string(), value.trim().to_string()));
                }
            }
        }

        if let Some((name, value)) = current {
            headers.add(name, value.trim());
        }

        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            // "content-type" -> "Content-Type"
            let capitalized = name
                .split('-')
                .map(|part| {
                    let mut chars = part.chars();
                    chars.next().map_or_else(String::new, |first| {
                        first.to_uppercase().collect::<String>() + chars.as_str()
                    })
                })
                .collect::<Vec<_>>()
                .join("-");

            write!(f, "{capitalized}: {value}\r\n")?;
        }

        Ok(())
    }
}

/// Splits a raw entity into its header block and body.
///
/// The split happens at the first empty line. An entity starting with an
/// empty line has no headers. When there is no empty line at all, the
/// whole input is treated as headers if its first line looks like one, and
/// as body otherwise.
#[must_use]
pub fn split_header_body(raw: &[u8]) -> (&[u8], &[u8]) {
    if raw.starts_with(b"\r\n") {
        return (&[], &raw[2..]);
    }
    if raw.starts_with(b"\n") {
        return (&[], &raw[1..]);
    }

    let mut pos = 0;
    while let Some(offset) = raw[pos..].iter().position(|&b| b == b'\n') {
        let next = pos + offset + 1;
        if raw[next..].starts_with(b"\r\n") {
            return (&raw[..next], &raw[next + 2..]);
        }
        if raw[next..].starts_with(b"\n") {
            return (&raw[..next], &raw[next + 1..]);
        }
        pos = next;
    }

    if looks_like_header_line(raw) {
        (raw, &[])
    } else {
        (&[], raw)
    }
}

fn looks_like_header_line(raw: &[u8]) -> bool {
    let first_line = raw.split(|&b| b == b'\n').next().unwrap_or_default();
    first_line.iter().position(|&b| b == b':').is_some_and(|colon| {
        colon > 0
            && first_line[..colon]
                .iter()
                .all(|b| b.is_ascii_graphic() && *b != b':')
    })
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
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert!(headers.contains("CONTENT-TYPE"));
    }

    #[test]
    fn test_headers_parse_unfolds_continuations() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test\r\n",
            "\tMessage\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Ignored: body\r\n"
        );

        let headers = Headers::parse(text);
        assert_eq!(headers.len(), 4);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(headers.get("content-type"), Some("text/plain; charset=utf-8"));
        assert!(headers.get("Ignored").is_none());
    }

    #[test]
    fn test_headers_parse_skips_garbage_lines() {
        let headers = Headers::parse("not a header\nX-Ok: yes\n");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-ok"), Some("yes"));
    }

    #[test]
    fn test_headers_get_all_and_map() {
        let headers = Headers::parse("Received: a\nReceived: b\nSubject: s\n");
        assert_eq!(headers.get_all("received"), vec!["a", "b"]);
        let map = headers.to_map();
        assert_eq!(map.get("received").map(String::as_str), Some("a, b"));
        assert_eq!(map.get("subject").map(String::as_str), Some("s"));
    }

    #[test]
    fn test_headers_display() {
        let mut headers = Headers::new();
        headers.add("message-id", "<1@example.com>");
        assert_eq!(headers.to_string(), "Message-Id: <1@example.com>\r\n");
    }

    #[test]
    fn test_split_header_body_crlf() {
        let (head, body) = split_header_body(b"Subject: x\r\n\r\nHello\r\n");
        assert_eq!(head, b"Subject: x\r\n");
        assert_eq!(body, b"Hello\r\n");
    }

    #[test]
    fn test_split_header_body_lf() {
        let (head, body) = split_header_body(b"Subject: x\nA: b\n\nHello");
        assert_eq!(head, b"Subject: x\nA: b\n");
        assert_eq!(body, b"Hello");
    }

    #[test]
    fn test_split_header_body_no_headers() {
        let (head, body) = split_header_body(b"\r\nHello");
        assert!(head.is_empty());
        assert_eq!(body, b"Hello");
    }

    #[test]
    fn test_split_header_body_without_blank_line() {
        let (head, body) = split_header_body(b"Subject: only headers");
        assert_eq!(head, b"Subject: only headers");
        assert!(body.is_empty());

        let (head, body) = split_header_body(b"just some text");
        assert!(head.is_empty());
        assert_eq!(body, b"just some text");
    }
}

//! Charset conversion with a fallback chain.
//!
//! Text is first decoded with the declared charset. When the label is
//! unknown or the bytes are not valid in that charset, each entry of the
//! fallback list is tried in order and the first clean result wins. When
//! nothing decodes cleanly the converter falls back to lossy UTF-8 and
//! repairs the usual mojibake patterns.

use std::borrow::Cow;

use encoding_rs::{Encoding, WINDOWS_1252};
use tracing::debug;

/// Default fallback order. The order decides which garbled text gets
/// "fixed" first, so changing it changes decoded output.
pub const DEFAULT_FALLBACKS: [&str; 6] = [
    "utf-8",
    "iso-8859-1",
    "iso-8859-15",
    "windows-1252",
    "windows-1251",
    "ascii",
];

/// Substitutions for UTF-8 text that was decoded one byte at a time as
/// Windows-1252 or Latin-1.
const MOJIBAKE: &[(&str, &str)] = &[
    ("â€™", "\u{2019}"),
    ("â€˜", "\u{2018}"),
    ("â€œ", "\u{201c}"),
    ("â€\u{9d}", "\u{201d}"),
    ("â€“", "\u{2013}"),
    ("â€”", "\u{2014}"),
    ("â€¦", "\u{2026}"),
    ("Ã©", "é"),
    ("Ã¨", "è"),
    ("Ãª", "ê"),
    ("Ã\u{a0}", "à"),
    ("Ã¢", "â"),
    ("Ã§", "ç"),
    ("Ã´", "ô"),
    ("Ã®", "î"),
    ("Ã¯", "ï"),
    ("Ã«", "ë"),
    ("Ã¹", "ù"),
    ("Ã»", "û"),
    ("Ã¼", "ü"),
    ("Ã¶", "ö"),
    ("Ã¤", "ä"),
    ("Ã±", "ñ"),
    ("Ã‰", "É"),
    ("Â\u{a0}", " "),
];

/// Outcome of a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    /// Decoded text.
    pub text: String,
    /// Name of the charset that produced `text`, `None` for the
    /// last-resort path.
    pub charset: Option<&'static str>,
    /// Set when the declared charset could not be used as-is.
    pub warning: Option<String>,
}

/// Converts byte content to UTF-8 strings.
#[derive(Debug, Clone)]
pub struct CharsetConverter {
    fallbacks: Vec<&'static Encoding>,
}

impl Default for CharsetConverter {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACKS)
    }
}

impl CharsetConverter {
    /// Creates a converter with the given fallback labels.
    ///
    /// Labels unknown to the converter are skipped with a debug log.
    #[must_use]
    pub fn new<I, S>(fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fallbacks = fallbacks
            .into_iter()
            .filter_map(|label| {
                let encoding = lookup(label.as_ref());
                if encoding.is_none() {
                    debug!(label = label.as_ref(), "ignoring unknown fallback charset");
                }
                encoding
            })
            .collect();
        Self { fallbacks }
    }

    /// Returns `true` if the label names a charset the converter supports.
    #[must_use]
    pub fn is_known(label: &str) -> bool {
        lookup(label).is_some()
    }

    /// Decodes `bytes`, starting from the declared charset.
    #[must_use]
    pub fn convert(&self, bytes: &[u8], declared: Option<&str>) -> Converted {
        let mut warning = None;

        if let Some(label) = declared.map(str::trim).filter(|l| !l.is_empty()) {
            match lookup(label) {
                Some(encoding) => {
                    if let Some(text) = decode_clean(encoding, bytes) {
                        return Converted {
                            text: repair_mojibake(&text).into_owned(),
                            charset: Some(encoding.name()),
                            warning: None,
                        };
                    }
                    warning = Some(format!("Content was not valid {label}; used a fallback charset"));
                }
                None => {
                    warning = Some(format!("Unsupported charset {label}; used a fallback charset"));
                }
            }
        }

        for encoding in &self.fallbacks {
            if let Some(text) = decode_clean(encoding, bytes) {
                debug!(charset = encoding.name(), "decoded with fallback charset");
                return Converted {
                    text: repair_mojibake(&text).into_owned(),
                    charset: Some(encoding.name()),
                    warning,
                };
            }
        }

        debug!("no charset decoded cleanly, repairing lossy text");
        let lossy = String::from_utf8_lossy(bytes);
        let repaired = repair_mojibake(&lossy);
        let text = strip_unprintable(&substitute_mojibake(&repaired));
        Converted {
            text,
            charset: None,
            warning: Some(
                warning.unwrap_or_else(|| "Text could not be decoded cleanly".to_string()),
            ),
        }
    }
}

fn lookup(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

fn decode_clean(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    let text = encoding.decode_without_bom_handling_and_without_replacement(bytes)?;
    if text.contains('\u{fffd}') {
        return None;
    }
    Some(text.into_owned())
}

/// Recovers UTF-8 text that was previously mis-decoded one byte at a time.
///
/// The text is re-encoded to the bytes it was most likely decoded from
/// (its code units when they all fit in a byte, Windows-1252 otherwise)
/// and those bytes are decoded as UTF-8. Text that does not look
/// double-decoded, or whose bytes are not valid UTF-8, is returned as is.
#[must_use]
pub fn repair_mojibake(text: &str) -> Cow<'_, str> {
    if !looks_double_decoded(text) {
        return Cow::Borrowed(text);
    }

    let bytes: Option<Vec<u8>> = if text.chars().all(|c| u32::from(c) <= 0xff) {
        text.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
    } else {
        let (bytes, _, had_errors) = WINDOWS_1252.encode(text);
        (!had_errors).then(|| bytes.into_owned())
    };

    match bytes.map(String::from_utf8) {
        Some(Ok(repaired)) => Cow::Owned(repaired),
        _ => Cow::Borrowed(text),
    }
}

/// Lead characters of a UTF-8 sequence seen through a single-byte charset.
fn looks_double_decoded(text: &str) -> bool {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if matches!(c, 'Ã' | 'Â' | 'â' | 'Å' | 'Ð' | 'Ñ')
            && let Some(next) = chars.peek()
            && (('\u{80}'..='\u{bf}').contains(next) || "€‚ƒ„…†‡ˆ‰Š‹ŒŽ‘’“”•–—˜™š›œžŸ".contains(*next))
        {
            return true;
        }
    }
    false
}

fn substitute_mojibake(text: &str) -> String {
    MOJIBAKE
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Drops control characters (other than line breaks and tabs) and
/// replacement markers.
fn strip_unprintable(text: &str) -> String {
    text.chars()
        .filter(|c| matches!(*c, '\n' | '\r' | '\t') || !(c.is_control() || *c == '\u{fffd}'))
        .collect()
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
    fn test_declared_utf8() {
        let converted = CharsetConverter::default().convert("Café".as_bytes(), Some("utf-8"));
        assert_eq!(converted.text, "Café");
        assert_eq!(converted.charset, Some("UTF-8"));
        assert!(converted.warning.is_none());
    }

    #[test]
    fn test_declared_latin1() {
        let converted = CharsetConverter::default().convert(b"Caf\xe9", Some("ISO-8859-1"));
        assert_eq!(converted.text, "Café");
        assert!(converted.warning.is_none());
    }

    #[test]
    fn test_wrong_declared_charset_falls_back() {
        let converted = CharsetConverter::default().convert(b"Caf\xe9", Some("utf-8"));
        assert_eq!(converted.text, "Café");
        assert!(converted.warning.is_some());
    }

    #[test]
    fn test_unknown_charset_falls_back() {
        let converted =
            CharsetConverter::default().convert("naïve".as_bytes(), Some("x-unknown-charset"));
        assert_eq!(converted.text, "naïve");
        assert!(converted.warning.unwrap().contains("x-unknown-charset"));
    }

    #[test]
    fn test_missing_charset_uses_chain() {
        let converted = CharsetConverter::default().convert("plain".as_bytes(), None);
        assert_eq!(converted.text, "plain");
        assert!(converted.warning.is_none());
    }

    #[test]
    fn test_cyrillic_windows_1251() {
        let converted =
            CharsetConverter::default().convert(b"\xcf\xf0\xe8\xe2\xe5\xf2", Some("windows-1251"));
        assert_eq!(converted.text, "Привет");
    }

    #[test]
    fn test_utf8_declared_as_latin1_is_repaired() {
        let converted = CharsetConverter::default().convert("Café".as_bytes(), Some("iso-8859-1"));
        assert_eq!(converted.text, "Café");
    }

    #[test]
    fn test_repair_mojibake() {
        assert_eq!(repair_mojibake("CafÃ©"), "Café");
        assert_eq!(repair_mojibake("donâ€™t"), "don\u{2019}t");
        assert_eq!(repair_mojibake("plain text"), "plain text");
        assert_eq!(repair_mojibake("Ã and nothing"), "Ã and nothing");
    }

    #[test]
    fn test_last_resort_when_chain_is_strict() {
        let converter = CharsetConverter::new(["utf-8"]);
        let converted = converter.convert(b"bad \xff\x01 bytes", None);
        assert_eq!(converted.text, "bad  bytes");
        assert!(converted.charset.is_none());
        assert!(converted.warning.is_some());
    }

    #[test]
    fn test_unknown_fallback_labels_are_skipped() {
        let converter = CharsetConverter::new(["nope", "utf-8"]);
        assert_eq!(converter.fallbacks.len(), 1);
    }

    #[test]
    fn test_substitution_table() {
        assert_eq!(substitute_mojibake("Ã¼ber"), "über");
    }
}

//! Transfer encodings and RFC 2047 encoded words.
//!
//! Decoding is lenient throughout: mail in the wild carries unpadded
//! base64, stray `=` signs in quoted-printable bodies and encoded words
//! with broken payloads. The byte-level decoders accept all of that; the
//! encoded-word decoder leaves anything it cannot handle verbatim.

use std::fmt::Write as _;
use std::sync::LazyLock;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;

use crate::charset::CharsetConverter;
use crate::error::Result;

/// Base64 engine that tolerates missing padding and trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[allow(clippy::unwrap_used)]
static ENCODED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=\?([^?\s]+)\?([BbQq])\?([^?\s]*)\?=").unwrap());

/// Maximum line length for encoded output.
const MAX_LINE_LENGTH: usize = 76;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped at 76 columns with CRLF line breaks.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);
    for (i, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            result.push_str("\r\n");
        }
        // Base64 output is ASCII, so every chunk is valid UTF-8.
        result.push_str(&String::from_utf8_lossy(chunk));
    }
    result
}

/// Decodes Base64 data, ignoring embedded whitespace and missing padding.
///
/// # Errors
///
/// Returns an error if the input contains characters outside the Base64
/// alphabet.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT.decode(cleaned).map_err(Into::into)
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input are kept as hard CRLF breaks; long lines get
/// soft breaks.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::new();

    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            result.push_str("\r\n");
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        let bytes = line.as_bytes();
        let mut line_length = 0;

        for (i, byte) in bytes.iter().enumerate() {
            let is_last = i + 1 == bytes.len();
            let encoded_len = match byte {
                b'!'..=b'<' | b'>'..=b'~' => 1,
                b' ' | b'\t' if !is_last => 1,
                _ => 3,
            };

            if line_length + encoded_len > MAX_LINE_LENGTH - 1 {
                result.push_str("=\r\n");
                line_length = 0;
            }

            if encoded_len == 1 {
                result.push(char::from(*byte));
            } else {
                let _ = write!(result, "={byte:02X}");
            }
            line_length += encoded_len;
        }
    }

    result
}

/// Decodes Quoted-Printable content (RFC 2045) to raw bytes.
///
/// Soft line breaks are removed and `=XX` escapes decoded. A malformed
/// escape is kept literally instead of failing the whole body.
#[must_use]
pub fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        let rest = &input[i + 1..];
        if rest.starts_with(b"\r\n") {
            i += 3;
        } else if rest.starts_with(b"\n") {
            i += 2;
        } else if let Some(value) = rest.get(..2).and_then(hex_pair) {
            result.push(value);
            i += 3;
        } else {
            // Soft break followed by trailing whitespace.
            let trailing = rest
                .iter()
                .take_while(|b| **b == b' ' || **b == b'\t')
                .count();
            let after = &rest[trailing..];
            if trailing > 0 && (after.starts_with(b"\r\n") || after.starts_with(b"\n")) {
                i += 1 + trailing + if after.starts_with(b"\r\n") { 2 } else { 1 };
            } else {
                result.push(b'=');
                i += 1;
            }
        }
    }

    result
}

fn hex_pair(pair: &[u8]) -> Option<u8> {
    if !pair.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let text = std::str::from_utf8(pair).ok()?;
    u8::from_str_radix(text, 16).ok()
}

/// Encodes a header value using RFC 2047 `B` encoding when needed.
///
/// ASCII values without `=?` sequences are returned unchanged. Long values
/// are split into several encoded words on character boundaries.
#[must_use]
pub fn encode_header_value(text: &str) -> String {
    if text.is_ascii() && !text.contains("=?") {
        return text.to_string();
    }

    // 75 chars per word minus "=?utf-8?B?" and "?=" leaves 63 base64
    // chars, i.e. 45 input bytes.
    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > 45 {
            words.push(format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes())));
    }
    words.join("\r\n ")
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Each word is decoded independently and converted from its declared
/// charset. Whitespace between two adjacent encoded words is dropped.
/// Words whose payload cannot be decoded are left verbatim.
#[must_use]
pub fn decode_encoded_words(value: &str, converter: &CharsetConverter) -> String {
    let mut result = String::with_capacity(value.len());
    let mut last_end = 0;
    let mut previous_was_word = false;

    for captures in ENCODED_WORD.captures_iter(value) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let gap = &value[last_end..whole.start()];

        let decoded = decode_word(
            captures.get(1).map_or("", |m| m.as_str()),
            captures.get(2).map_or("", |m| m.as_str()),
            captures.get(3).map_or("", |m| m.as_str()),
            converter,
        );

        let gap_is_blank = gap.chars().all(char::is_whitespace);
        if !(previous_was_word && gap_is_blank && decoded.is_some()) {
            result.push_str(gap);
        }

        match decoded {
            Some(text) => {
                result.push_str(&text);
                previous_was_word = true;
            }
            None => {
                result.push_str(whole.as_str());
                previous_was_word = false;
            }
        }
        last_end = whole.end();
    }

    result.push_str(&value[last_end..]);
    result
}

fn decode_word(
    charset: &str,
    encoding: &str,
    payload: &str,
    converter: &CharsetConverter,
) -> Option<String> {
    // RFC 2231 allows a language suffix: utf-8*en
    let charset = charset.split('*').next().unwrap_or(charset);

    let bytes = if encoding.eq_ignore_ascii_case("b") {
        decode_base64(payload.as_bytes()).ok()?
    } else {
        let spaced: Vec<u8> = payload
            .bytes()
            .map(|b| if b == b'_' { b' ' } else { b })
            .collect();
        decode_quoted_printable(&spaced)
    };

    if !CharsetConverter::is_known(charset) {
        return None;
    }
    Some(converter.convert(&bytes, Some(charset)).text)
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

    fn words(value: &str) -> String {
        decode_encoded_words(value, &CharsetConverter::default())
    }

    #[test]
    fn test_base64_encode_decode() {
        let encoded = encode_base64(b"Hello, World!");
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");
        assert_eq!(decode_base64(encoded.as_bytes()).unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_base64_lenient() {
        assert_eq!(decode_base64(b"SGVs\r\nbG8").unwrap(), b"Hello");
        assert!(decode_base64(b"!!!!").is_err());
    }

    #[test]
    fn test_base64_wrapped() {
        let data = vec![b'a'; 200];
        let wrapped = encode_base64_wrapped(&data);
        assert!(wrapped.lines().all(|line| line.trim_end().len() <= 76));
        assert_eq!(decode_base64(wrapped.as_bytes()).unwrap(), data);
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello, World!"), b"Hello, World!");
        assert_eq!(decode_quoted_printable(b"Caf=C3=A9"), "Café".as_bytes());
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello= \r\nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_keeps_malformed_escape() {
        assert_eq!(decode_quoted_printable(b"a=ZZb"), b"a=ZZb");
        assert_eq!(decode_quoted_printable(b"end="), b"end=");
    }

    #[test]
    fn test_quoted_printable_encode() {
        assert_eq!(encode_quoted_printable("Hello, World!"), "Hello, World!");
        assert!(encode_quoted_printable("Héllo").contains("=C3=A9"));
        assert_eq!(encode_quoted_printable("a\nb"), "a\r\nb");
        assert_eq!(encode_quoted_printable("a=b"), "a=3Db");
    }

    #[test]
    fn test_quoted_printable_long_line() {
        let text = "x".repeat(200);
        let encoded = encode_quoted_printable(&text);
        assert!(encoded.lines().all(|line| line.len() <= 76));
        assert_eq!(decode_quoted_printable(encoded.as_bytes()), text.as_bytes());
    }

    #[test]
    fn test_encoded_word_base64() {
        assert_eq!(words("=?UTF-8?B?SGVsbG8=?="), "Hello");
    }

    #[test]
    fn test_encoded_word_q() {
        assert_eq!(words("=?utf-8?Q?H=C3=A9llo_World?="), "Héllo World");
    }

    #[test]
    fn test_encoded_word_latin1() {
        assert_eq!(words("=?iso-8859-1?Q?Caf=E9?="), "Café");
    }

    #[test]
    fn test_encoded_words_mixed_with_text() {
        assert_eq!(
            words("Re: =?utf-8?B?SGVsbG8=?= there"),
            "Re: Hello there"
        );
    }

    #[test]
    fn test_adjacent_encoded_words_join() {
        assert_eq!(
            words("=?utf-8?Q?Hel?= =?utf-8?Q?lo?=\r\n =?utf-8?Q?!?="),
            "Hello!"
        );
    }

    #[test]
    fn test_malformed_encoded_word_left_verbatim() {
        assert_eq!(words("=?utf-8?B?***?= ok"), "=?utf-8?B?***?= ok");
        assert_eq!(words("=?no-such-charset?Q?abc?="), "=?no-such-charset?Q?abc?=");
    }

    #[test]
    fn test_encode_header_value() {
        assert_eq!(encode_header_value("Hello"), "Hello");
        let encoded = encode_header_value("Héllo");
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert_eq!(words(&encoded), "Héllo");
    }

    #[test]
    fn test_encode_header_value_splits_long_text() {
        let text = "é".repeat(60);
        let encoded = encode_header_value(&text);
        assert!(encoded.contains("\r\n "));
        assert_eq!(words(&encoded), text);
    }
}

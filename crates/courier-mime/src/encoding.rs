//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 header encoding and
//! RFC 5987 parameter encoding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt::Write as _;

/// Maximum encoded line length for Quoted-Printable bodies.
pub const MAX_LINE_LENGTH: usize = 76;

/// Line length for Base64 bodies: the largest multiple of 4 that fits the
/// 998-octet SMTP line limit, so each line decodes on its own.
pub const BASE64_LINE_LENGTH: usize = 996;

/// Largest UTF-8 payload per RFC 2047 encoded word, keeping each word
/// within 75 characters once base64 and the `=?UTF-8?B??=` frame are added.
const MAX_WORD_BYTES: usize = 45;

/// Characters allowed unescaped in an RFC 5987 `attr-char`.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 split into CRLF-separated lines of at most
/// [`BASE64_LINE_LENGTH`] characters.
///
/// Payloads up to 747 bytes stay on a single line.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut result =
        String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_LENGTH * 2);
    // Base64 output is pure ASCII, so byte chunks are valid str slices.
    for (i, chunk) in encoded.as_bytes().chunks(BASE64_LINE_LENGTH).enumerate() {
        if i > 0 {
            result.push_str("\r\n");
        }
        result.extend(chunk.iter().map(|&b| b as char));
    }
    result
}

/// Decodes Base64 data, ignoring embedded line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact).map_err(Into::into)
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks (`\n` or `\r\n`) are kept as hard CRLF breaks, whitespace
/// at the end of a line is escaped, and long lines get soft breaks so no
/// output line exceeds [`MAX_LINE_LENGTH`] characters.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            result.push_str("\r\n");
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        encode_qp_line(line.as_bytes(), &mut result);
    }

    result
}

fn encode_qp_line(line: &[u8], out: &mut String) {
    let mut line_length = 0;

    for (i, &byte) in line.iter().enumerate() {
        let is_last = i + 1 == line.len();
        let mut token = String::with_capacity(3);

        match byte {
            b'!'..=b'<' | b'>'..=b'~' => token.push(byte as char),
            // Whitespace is literal except at the end of a line
            b' ' | b'\t' if !is_last => token.push(byte as char),
            _ => {
                let _ = write!(token, "={byte:02X}");
            }
        }

        // Reserve one column for the soft break marker unless this is the
        // final token of the line.
        let limit = if is_last {
            MAX_LINE_LENGTH
        } else {
            MAX_LINE_LENGTH - 1
        };
        if line_length + token.len() > limit {
            out.push_str("=\r\n");
            line_length = 0;
        }

        line_length += token.len();
        out.push_str(&token);
    }
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break
        if bytes[i + 1..].starts_with(b"\r\n") {
            i += 3;
            continue;
        }
        if bytes[i + 1..].starts_with(b"\n") {
            i += 2;
            continue;
        }

        let hex = bytes
            .get(i + 1..i + 3)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let hex = std::str::from_utf8(hex)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        let byte = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(byte);
        i += 3;
    }

    String::from_utf8(result).map_err(Into::into)
}

/// Returns true if a header value has to be wrapped in RFC 2047 encoded words.
#[must_use]
pub fn needs_rfc2047(text: &str) -> bool {
    !text.is_ascii() || text.contains("=?")
}

/// Encodes a header value using RFC 2047 `B` encoding.
///
/// Pure ASCII input is returned unchanged. Longer values are split into
/// several encoded words on character boundaries and folded onto
/// continuation lines.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if !needs_rfc2047(text) {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > MAX_WORD_BYTES {
            words.push(format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())));
    }

    words.join("\r\n ")
}

/// Decodes RFC 2047 encoded words in a header value.
///
/// Adjacent encoded words separated only by folding whitespace are
/// joined without the whitespace, as the RFC requires.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut result = String::new();
    let mut rest = text;
    let mut previous_was_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        let Some(end) = find_word_end(candidate) else {
            break;
        };

        if !(previous_was_word && before.trim().is_empty()) {
            result.push_str(before);
        }
        result.push_str(&decode_word(&candidate[2..end])?);
        rest = &candidate[end + 2..];
        previous_was_word = true;
    }

    result.push_str(rest);
    Ok(result)
}

/// Finds the index of the closing `?=` of an encoded word starting at 0.
fn find_word_end(word: &str) -> Option<usize> {
    // =?charset?E?text?=  -> skip past the charset and encoding markers
    let charset_end = word[2..].find('?')? + 2;
    let encoding_end = word[charset_end + 1..].find('?')? + charset_end + 1;
    let end = word[encoding_end + 1..].find("?=")? + encoding_end + 1;
    Some(end)
}

fn decode_word(inner: &str) -> Result<String> {
    let parts: Vec<&str> = inner.splitn(3, '?').collect();
    if parts.len() != 3 {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    }

    let encoding = parts[1].to_uppercase();
    let encoded_text = parts[2];

    match encoding.as_str() {
        "B" => {
            let decoded = decode_base64(encoded_text)?;
            String::from_utf8(decoded).map_err(Into::into)
        }
        "Q" => {
            let text_with_spaces = encoded_text.replace('_', " ");
            decode_quoted_printable(&text_with_spaces)
        }
        _ => Err(Error::InvalidEncoding(format!(
            "Unknown encoding: {encoding}"
        ))),
    }
}

/// Encodes a parameter value per RFC 5987 (`utf-8''<percent-encoded>`).
#[must_use]
pub fn encode_rfc5987(value: &str) -> String {
    format!("utf-8''{}", utf8_percent_encode(value, ATTR_CHAR))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_short_payload_is_one_line() {
        let data: Vec<u8> = (0..=255).collect();
        let wrapped = encode_base64_wrapped(&data);
        assert_eq!(wrapped, encode_base64(&data));
        assert_eq!(wrapped.len(), 344);
    }

    #[test]
    fn test_base64_wrapped_line_length() {
        let data: Vec<u8> = (0..4096u32).map(|i| u8::try_from(i % 251).unwrap()).collect();
        let wrapped = encode_base64_wrapped(&data);
        let lines: Vec<&str> = wrapped.split("\r\n").collect();
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|line| line.len() <= BASE64_LINE_LENGTH));
        assert!(lines[..lines.len() - 1].iter().all(|line| line.len() % 4 == 0));
        assert_eq!(wrapped.replace("\r\n", ""), encode_base64(&data));
        assert_eq!(decode_base64(&wrapped).unwrap(), data);
    }

    #[test]
    fn test_quoted_printable_fixtures() {
        let fixtures = [
            ("abcd= ÕÄÖÜ", "abcd=3D =C3=95=C3=84=C3=96=C3=9C"),
            ("foo bar  ", "foo bar =20"),
            ("foo bar\t\t", "foo bar\t=09"),
            ("foo \r\nbar", "foo=20\r\nbar"),
        ];
        for (input, expected) in fixtures {
            assert_eq!(encode_quoted_printable(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_quoted_printable_normalizes_line_breaks() {
        assert_eq!(encode_quoted_printable("a\nb\r\nc"), "a\r\nb\r\nc");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let text = "x".repeat(200);
        let encoded = encode_quoted_printable(&text);
        for line in encoded.split("\r\n") {
            assert!(line.len() <= MAX_LINE_LENGTH, "line too long: {line}");
        }
        assert_eq!(decode_quoted_printable(&encoded).unwrap(), text);
    }

    #[test]
    fn test_quoted_printable_never_splits_escape() {
        let text = "é".repeat(60);
        let encoded = encode_quoted_printable(&text);
        for line in encoded.split("\r\n") {
            let body = line.strip_suffix('=').unwrap_or(line);
            assert_eq!(body.len() % 3, 0, "split escape in {line}");
        }
        assert_eq!(decode_quoted_printable(&encoded).unwrap(), text);
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable("Hello, World!").unwrap(), "Hello, World!");
        assert_eq!(decode_quoted_printable("H=C3=A9llo").unwrap(), "Héllo");
        assert_eq!(decode_quoted_printable("Hello=\r\nWorld").unwrap(), "HelloWorld");
        assert!(decode_quoted_printable("bad=4").is_err());
    }

    #[test]
    fn test_rfc2047_ascii_untouched() {
        assert_eq!(encode_rfc2047("Hello World", "UTF-8"), "Hello World");
        assert_eq!(encode_rfc2047("What? = fine", "UTF-8"), "What? = fine");
    }

    #[test]
    fn test_rfc2047_encode_decode() {
        let encoded = encode_rfc2047("See on õhin test", "UTF-8");
        assert!(encoded.starts_with("=?UTF-8?B?"));
        assert!(encoded.ends_with("?="));
        assert_eq!(decode_rfc2047(&encoded).unwrap(), "See on õhin test");
    }

    #[test]
    fn test_rfc2047_long_value_splits_words() {
        let subject = "Ünïcödé ".repeat(12);
        let encoded = encode_rfc2047(&subject, "UTF-8");
        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert!(words.len() > 1);
        assert!(words.iter().all(|w| w.len() <= 75));
        assert_eq!(decode_rfc2047(&encoded).unwrap(), subject);
    }

    #[test]
    fn test_rfc2047_emoji_boundary() {
        let subject = "🌍".repeat(30);
        let encoded = encode_rfc2047(&subject, "UTF-8");
        assert_eq!(decode_rfc2047(&encoded).unwrap(), subject);
    }

    #[test]
    fn test_rfc2047_quoted_printable_word() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap(), "Héllo");
        assert_eq!(
            decode_rfc2047("Re: =?utf-8?B?SMOpbGxv?= there").unwrap(),
            "Re: Héllo there"
        );
    }

    #[test]
    fn test_rfc5987() {
        assert_eq!(encode_rfc5987("tëst dôc.pdf"), "utf-8''t%C3%ABst%20d%C3%B4c.pdf");
        assert_eq!(encode_rfc5987("plain.txt"), "utf-8''plain.txt");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn qp_round_trips_without_carriage_returns(text in "[^\r]{0,300}") {
                let encoded = encode_quoted_printable(&text);
                for line in encoded.split("\r\n") {
                    prop_assert!(line.len() <= MAX_LINE_LENGTH);
                }
                let decoded = decode_quoted_printable(&encoded).unwrap();
                prop_assert_eq!(decoded, text.replace('\n', "\r\n"));
            }

            #[test]
            fn base64_wrapped_round_trips(data in proptest::collection::vec(any::<u8>(), 0..512)) {
                let wrapped = encode_base64_wrapped(&data);
                prop_assert_eq!(decode_base64(&wrapped).unwrap(), data);
            }
        }
    }
}

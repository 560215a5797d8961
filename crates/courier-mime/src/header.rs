//! MIME header handling.

use crate::encoding::{decode_rfc2047, encode_rfc2047};
use crate::error::{Error, Result};
use std::fmt;

/// Ordered collection of email headers.
///
/// Insertion order is preserved and duplicate names are allowed, so the
/// serialized form matches the order the caller supplied.
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

    /// Appends a header value.
    ///
    /// CR and LF characters in the value are replaced by spaces so a value
    /// can never start a new header line.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains characters that
    /// are not allowed in a header field name.
    pub fn add(&mut self, name: impl Into<String>, value: impl AsRef<str>) -> Result<()> {
        let name = name.into();
        validate_name(&name)?;
        self.entries.push((name, sanitize_value(value.as_ref())));
        Ok(())
    }

    /// Appends a header value, wrapping non-ASCII text in RFC 2047
    /// encoded words.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn add_encoded(&mut self, name: impl Into<String>, value: &str) -> Result<()> {
        let name = name.into();
        validate_name(&name)?;
        self.entries.push((name, Self::encode_value(value)));
        Ok(())
    }

    /// Appends a value produced by this crate (folded encoded words,
    /// content type parameters), bypassing sanitizing.
    pub(crate) fn add_raw(&mut self, name: &str, value: String) {
        self.entries.push((name.to_string(), value));
    }

    /// Sets a header value, replacing any existing values.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn set(&mut self, name: impl Into<String>, value: impl AsRef<str>) -> Result<()> {
        let name = name.into();
        validate_name(&name)?;
        let value = sanitize_value(value.as_ref());
        match self
            .entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(index) => {
                self.remove(&name);
                self.entries.insert(index.min(self.entries.len()), (name, value));
            }
            None => self.entries.push((name, value)),
        }
        Ok(())
    }

    /// Gets the first value for a header (case-insensitive).
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

    /// Returns true if a header with this name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Returns an iterator over all headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of header lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses the header block of a message.
    ///
    /// Parsing stops at the first empty line. Folded continuation lines are
    /// unfolded with a single space.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
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

            if let Some(entry) = current.take() {
                headers.entries.push(entry);
            }
            if let Some((name, value)) = line.split_once(':') {
                current = Some((name.trim().to_string(), value.trim().to_string()));
            }
        }

        if let Some(entry) = current {
            headers.entries.push(entry);
        }

        headers
    }

    /// Encodes a header value using RFC 2047 if needed.
    #[must_use]
    pub fn encode_value(value: &str) -> String {
        encode_rfc2047(&sanitize_value(value), "UTF-8")
    }

    /// Decodes a header value from RFC 2047 if encoded.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_value(value: &str) -> Result<String> {
        decode_rfc2047(value)
    }
}

/// Replaces CR and LF with spaces.
///
/// Other control characters, NUL included, pass through untouched; only
/// line breaks carry meaning in the header block.
#[must_use]
pub fn sanitize_value(value: &str) -> String {
    if value.contains(['\r', '\n']) {
        value.replace("\r\n", " ").replace(['\r', '\n'], " ")
    } else {
        value.to_string()
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && b != b':');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidHeaderName(name.to_string()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
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
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain").unwrap();
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_headers_keep_order_and_duplicates() {
        let mut headers = Headers::new();
        headers.add("X-B", "1").unwrap();
        headers.add("X-A", "2").unwrap();
        headers.add("X-B", "3").unwrap();

        assert_eq!(headers.to_string(), "X-B: 1\r\nX-A: 2\r\nX-B: 3\r\n");
        assert_eq!(headers.get_all("x-b"), vec!["1", "3"]);
    }

    #[test]
    fn test_headers_set() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com").unwrap();
        headers.add("Subject", "hi").unwrap();
        headers.add("To", "bob@example.com").unwrap();

        headers.set("To", "charlie@example.com").unwrap();
        assert_eq!(headers.get_all("To"), vec!["charlie@example.com"]);
        assert_eq!(headers.iter().next(), Some(("To", "charlie@example.com")));
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test").unwrap();
        assert!(headers.contains("Subject"));

        headers.remove("subject");
        assert!(!headers.contains("Subject"));
    }

    #[test]
    fn test_header_injection_is_neutralized() {
        let mut headers = Headers::new();
        headers
            .add("Subject", "Normal\r\nBcc: evil@hacker.com")
            .unwrap();
        let text = headers.to_string();
        assert!(!text.split("\r\n").any(|l| l.starts_with("Bcc:")));
        assert_eq!(headers.get("Subject"), Some("Normal Bcc: evil@hacker.com"));
    }

    #[test]
    fn test_control_characters_pass_through() {
        let mut headers = Headers::new();
        headers.add("Subject", "a\0b\x07c").unwrap();
        assert_eq!(headers.get("Subject"), Some("a\0b\x07c"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut headers = Headers::new();
        assert!(headers.add("", "x").is_err());
        assert!(headers.add("Bad Name", "x").is_err());
        assert!(headers.add("Bad:Name", "x").is_err());
        assert!(headers.add("X\r\nBcc", "x").is_err());
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = Headers::parse(text);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert!(!headers.contains("Body"));
    }

    #[test]
    fn test_add_encoded() {
        let mut headers = Headers::new();
        headers.add_encoded("Subject", "Hello").unwrap();
        headers.add_encoded("X-Note", "Héllo\r\nBcc: x").unwrap();
        assert_eq!(headers.get("Subject"), Some("Hello"));
        let note = headers.get("X-Note").unwrap();
        assert!(note.starts_with("=?UTF-8?B?"));
        assert_eq!(Headers::decode_value(note).unwrap(), "Héllo Bcc: x");
    }

    #[test]
    fn test_encode_value() {
        assert_eq!(Headers::encode_value("plain"), "plain");
        let encoded = Headers::encode_value("Héllo");
        assert_eq!(Headers::decode_value(&encoded).unwrap(), "Héllo");
    }
}

//! RFC 5322 address-list parsing.
//!
//! The parser is deliberately lenient: it never fails, and it recovers
//! what it can from sloppy input the way mail user agents do.
//!
//! ```text
//! address-list = address *("," address)
//! address      = mailbox / group
//! mailbox      = name-addr / addr-spec
//! name-addr    = [display-name] "<" addr-spec ">"
//! group        = display-name ":" [mailbox-list] ";"
//! ```
//!
//! Beyond the grammar, `;` is accepted as a list delimiter outside
//! groups, and a trailing `(comment)` supplies the display name when no
//! other name is present.

use crate::encoding::{encode_rfc2047, needs_rfc2047};
use crate::header::sanitize_value;
use std::fmt;

/// A parsed mailbox or group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedAddress {
    /// Display name, empty when absent. For groups this is the group label.
    pub name: String,
    /// Address spec, empty for groups and for name-only entries.
    pub address: String,
    /// Group members when this entry is a named group.
    pub group: Option<Vec<ParsedAddress>>,
}

impl ParsedAddress {
    /// Creates a mailbox entry.
    #[must_use]
    pub fn mailbox(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            group: None,
        }
    }

    /// Returns true if this entry is a group.
    #[must_use]
    pub const fn is_group(&self) -> bool {
        self.group.is_some()
    }
}

impl fmt::Display for ParsedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(members) = &self.group {
            write!(f, "{}:", display_name(&self.name))?;
            for (i, member) in members.iter().enumerate() {
                let sep = if i == 0 { " " } else { ", " };
                write!(f, "{sep}{member}")?;
            }
            return write!(f, ";");
        }

        match (self.name.is_empty(), self.address.is_empty()) {
            (true, _) => write!(f, "{}", self.address),
            (false, true) => write!(f, "{}", display_name(&self.name)),
            (false, false) => write!(f, "{} <{}>", display_name(&self.name), self.address),
        }
    }
}

/// Renders a display name as an encoded word or a quoted string.
fn display_name(name: &str) -> String {
    let name = sanitize_value(name);
    if needs_rfc2047(&name) {
        encode_rfc2047(&name, "UTF-8")
    } else {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    }
}

/// Formats a list of addresses as a header value (`a, "B" <b@x>`).
#[must_use]
pub fn format_address_list(addresses: &[ParsedAddress]) -> String {
    addresses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses an RFC 5322 address list.
///
/// With `flatten` set, groups are replaced by their members and the group
/// labels are discarded.
#[must_use]
pub fn parse_address_list(input: &str, flatten: bool) -> Vec<ParsedAddress> {
    let parsed = Parser::new(tokenize(input)).parse();
    if flatten {
        flatten_groups(parsed)
    } else {
        parsed
    }
}

/// Replaces groups by their members.
#[must_use]
pub fn flatten_groups(addresses: Vec<ParsedAddress>) -> Vec<ParsedAddress> {
    addresses
        .into_iter()
        .flat_map(|entry| match entry.group {
            Some(members) => members,
            None => vec![entry],
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Comment(String),
    Angle(String),
    Delimiter(char),
    Colon,
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut chars = input.chars();

    let flush = |word: &mut String, tokens: &mut Vec<Token>| {
        let trimmed = word.trim();
        if !trimmed.is_empty() {
            tokens.push(Token::Word(trimmed.to_string()));
        }
        word.clear();
    };

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                flush(&mut word, &mut tokens);
                let mut quoted = String::new();
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => quoted.extend(chars.next()),
                        '"' => break,
                        _ => quoted.push(c),
                    }
                }
                tokens.push(Token::Quoted(quoted));
            }
            '(' => {
                flush(&mut word, &mut tokens);
                let mut comment = String::new();
                let mut depth = 1;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => comment.extend(chars.next()),
                        '(' => {
                            depth += 1;
                            comment.push(c);
                        }
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                            comment.push(c);
                        }
                        _ => comment.push(c),
                    }
                }
                tokens.push(Token::Comment(comment.trim().to_string()));
            }
            '<' => {
                flush(&mut word, &mut tokens);
                let angle: String = chars.by_ref().take_while(|&c| c != '>').collect();
                tokens.push(Token::Angle(angle.trim().to_string()));
            }
            ',' | ';' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Delimiter(ch));
            }
            ':' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Colon);
            }
            _ => word.push(ch),
        }
    }
    flush(&mut word, &mut tokens);

    tokens
}

struct Parser {
    tokens: std::vec::IntoIter<Token>,
    result: Vec<ParsedAddress>,
    /// Open group label and its members collected so far.
    group: Option<(String, Vec<ParsedAddress>)>,
    current: Vec<Token>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into_iter(),
            result: Vec::new(),
            group: None,
            current: Vec::new(),
        }
    }

    fn parse(mut self) -> Vec<ParsedAddress> {
        while let Some(token) = self.tokens.next() {
            match token {
                Token::Delimiter(';') if self.group.is_some() => {
                    self.flush_mailbox();
                    self.close_group();
                }
                Token::Delimiter(_) => self.flush_mailbox(),
                Token::Colon if self.group.is_none() => {
                    let label = mailbox_from_tokens(std::mem::take(&mut self.current))
                        .map(|m| join_nonempty(&m.name, &m.address))
                        .unwrap_or_default();
                    self.group = Some((label, Vec::new()));
                }
                Token::Colon => self.current.push(Token::Word(":".to_string())),
                other => self.current.push(other),
            }
        }

        self.flush_mailbox();
        self.close_group();
        self.result
    }

    fn flush_mailbox(&mut self) {
        let Some(mailbox) = mailbox_from_tokens(std::mem::take(&mut self.current)) else {
            return;
        };
        match self.group.as_mut() {
            Some((_, members)) => members.push(mailbox),
            None => self.result.push(mailbox),
        }
    }

    fn close_group(&mut self) {
        if let Some((name, members)) = self.group.take() {
            self.result.push(ParsedAddress {
                name,
                address: String::new(),
                group: Some(members),
            });
        }
    }
}

fn join_nonempty(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (false, false) => format!("{a} {b}"),
        (false, true) => a.to_string(),
        _ => b.to_string(),
    }
}

/// Builds a mailbox from the tokens between two delimiters.
fn mailbox_from_tokens(tokens: Vec<Token>) -> Option<ParsedAddress> {
    if tokens.is_empty() {
        return None;
    }

    let mut address: Option<String> = None;
    let mut name_parts: Vec<String> = Vec::new();
    let mut comments: Vec<String> = Vec::new();

    for token in &tokens {
        if let Token::Angle(inner) = token
            && address.is_none()
        {
            address = Some(inner.clone());
        }
    }

    for token in tokens {
        match token {
            Token::Word(text) => {
                for part in text.split_whitespace() {
                    if address.is_none() && part.contains('@') {
                        address = Some(part.to_string());
                    } else {
                        name_parts.push(part.to_string());
                    }
                }
            }
            Token::Quoted(text) => name_parts.push(text),
            Token::Comment(text) if !text.is_empty() => comments.push(text),
            _ => {}
        }
    }

    let mut name = name_parts.join(" ");
    if name.is_empty() {
        name = comments.join(" ");
    }
    let address = address.unwrap_or_default();

    if name.is_empty() && address.is_empty() {
        return None;
    }

    Some(ParsedAddress::mailbox(name, address))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Vec<ParsedAddress> {
        parse_address_list(input, false)
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn single_address() {
            let r = parse("andris@tr.ee");
            assert_eq!(r, vec![ParsedAddress::mailbox("", "andris@tr.ee")]);
        }

        #[test]
        fn multiple_addresses() {
            let r = parse("andris@tr.ee, andris@example.com");
            assert_eq!(r.len(), 2);
            assert_eq!(r[0].address, "andris@tr.ee");
            assert_eq!(r[1].address, "andris@example.com");
        }

        #[test]
        fn unquoted_name() {
            let r = parse("andris <andris@tr.ee>");
            assert_eq!(r[0], ParsedAddress::mailbox("andris", "andris@tr.ee"));
        }

        #[test]
        fn quoted_name_with_comma() {
            let r = parse("\"reinman, andris\" <andris@tr.ee>");
            assert_eq!(r.len(), 1);
            assert_eq!(r[0].name, "reinman, andris");
            assert_eq!(r[0].address, "andris@tr.ee");
        }

        #[test]
        fn quoted_name_with_semicolon() {
            let r = parse("\"reinman; andris\" <andris@tr.ee>");
            assert_eq!(r.len(), 1);
            assert_eq!(r[0].name, "reinman; andris");
        }

        #[test]
        fn name_from_comment() {
            let r = parse("andris@tr.ee (andris)");
            assert_eq!(r[0], ParsedAddress::mailbox("andris", "andris@tr.ee"));
        }

        #[test]
        fn missing_address() {
            let r = parse("andris");
            assert_eq!(r[0], ParsedAddress::mailbox("andris", ""));
        }

        #[test]
        fn empty_group() {
            let r = parse("Undisclosed:;");
            assert_eq!(r.len(), 1);
            assert_eq!(r[0].name, "Undisclosed");
            assert_eq!(r[0].group, Some(vec![]));
        }

        #[test]
        fn address_group() {
            let r = parse("Disclosed:andris@tr.ee, andris@example.com;");
            assert_eq!(r.len(), 1);
            let members = r[0].group.as_ref().unwrap();
            assert_eq!(r[0].name, "Disclosed");
            assert_eq!(members.len(), 2);
            assert_eq!(members[0].address, "andris@tr.ee");
            assert_eq!(members[1].address, "andris@example.com");
        }

        #[test]
        fn group_followed_by_mailbox() {
            let r = parse("Team: a@x.com, b@x.com; c@x.com");
            assert_eq!(r.len(), 2);
            assert!(r[0].is_group());
            assert_eq!(r[1].address, "c@x.com");
        }

        #[test]
        fn unterminated_group() {
            let r = parse("Team: a@x.com, b@x.com");
            assert_eq!(r.len(), 1);
            assert_eq!(r[0].group.as_ref().unwrap().len(), 2);
        }

        #[test]
        fn semicolon_delimiter() {
            let r = parse("andris@tr.ee; andris@example.com;");
            assert_eq!(r.len(), 2);
        }

        #[test]
        fn unicode_names() {
            for (input, name, address) in [
                ("Jüri Õunapuu <juri@example.com>", "Jüri Õunapuu", "juri@example.com"),
                ("🤖 Robot <robot@example.com>", "🤖 Robot", "robot@example.com"),
                ("田中太郎 <tanaka@example.jp>", "田中太郎", "tanaka@example.jp"),
                ("O'Neill <oneill@example.com>", "O'Neill", "oneill@example.com"),
            ] {
                let r = parse(input);
                assert_eq!(r[0], ParsedAddress::mailbox(name, address), "{input}");
            }
        }

        #[test]
        fn empty_input() {
            assert!(parse("").is_empty());
            assert!(parse("  , ;").is_empty());
        }

        #[test]
        fn special_local_parts() {
            for addr in [
                "user+tag@example.com",
                "user.name@example.com",
                "user_name@example.com",
                "user@mail.server.company.example.com",
            ] {
                assert_eq!(parse(addr)[0].address, addr);
            }
        }

        #[test]
        fn whitespace_trimmed() {
            assert_eq!(parse("  user@example.com  ")[0].address, "user@example.com");
        }

        #[test]
        fn escaped_quote_in_name() {
            let r = parse(r#""Say \"hi\"" <a@b.com>"#);
            assert_eq!(r[0].name, "Say \"hi\"");
        }
    }

    mod flatten_tests {
        use super::*;

        #[test]
        fn flatten_expands_groups() {
            let r = parse_address_list("Disclosed:a@x.com, b@x.com;, c@x.com", true);
            let addresses: Vec<&str> = r.iter().map(|a| a.address.as_str()).collect();
            assert_eq!(addresses, vec!["a@x.com", "b@x.com", "c@x.com"]);
            assert!(r.iter().all(|a| !a.is_group()));
        }

        #[test]
        fn flatten_drops_empty_group() {
            assert!(parse_address_list("Undisclosed:;", true).is_empty());
        }
    }

    mod format_tests {
        use super::*;

        #[test]
        fn bare_address() {
            assert_eq!(ParsedAddress::mailbox("", "a@b.com").to_string(), "a@b.com");
        }

        #[test]
        fn quoted_display_name() {
            assert_eq!(
                ParsedAddress::mailbox("John Doe", "john@ex.com").to_string(),
                "\"John Doe\" <john@ex.com>"
            );
        }

        #[test]
        fn non_ascii_display_name_is_encoded() {
            let s = ParsedAddress::mailbox("Jüri", "juri@example.com").to_string();
            assert!(s.starts_with("=?UTF-8?B?"));
            assert!(s.ends_with(" <juri@example.com>"));
        }

        #[test]
        fn group_rendering() {
            let r = parse("Team: a@x.com, \"B\" <b@x.com>;");
            assert_eq!(format_address_list(&r), "\"Team\": a@x.com, \"B\" <b@x.com>;");
            assert_eq!(format_address_list(&parse("Undisclosed:;")), "\"Undisclosed\":;");
        }
    }
}

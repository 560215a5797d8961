//! Server capabilities advertised in the EHLO reply.

use super::Reply;
use std::collections::BTreeSet;
use std::fmt;

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuthMechanism {
    /// PLAIN - single-step plaintext
    Plain,
    /// LOGIN - legacy two-step plaintext
    Login,
    /// CRAM-MD5 - challenge-response
    CramMd5,
    /// `XOAUTH2` - `OAuth2` bearer token (Google/Microsoft)
    XOAuth2,
}

impl AuthMechanism {
    /// Parses an authentication mechanism name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            "XOAUTH2" => Some(Self::XOAuth2),
            _ => None,
        }
    }

    /// Returns the mechanism name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extensions discovered from an EHLO reply.
///
/// Created once per handshake and replaced after STARTTLS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Advertised extension keywords, upper-cased.
    pub keywords: BTreeSet<String>,
    /// `SIZE` limit in bytes; `Some(0)` means SIZE without a limit.
    pub size: Option<usize>,
    /// Known AUTH mechanisms in advertised order.
    pub auth: Vec<AuthMechanism>,
}

impl Capabilities {
    /// Parses the EHLO reply. The first line is the server greeting and is
    /// skipped.
    #[must_use]
    pub fn from_ehlo(reply: &Reply) -> Self {
        let mut caps = Self::default();
        for line in reply.lines.iter().skip(1) {
            caps.add_line(line);
        }
        caps
    }

    fn add_line(&mut self, line: &str) {
        // Some servers still send the pre-standard `AUTH=LOGIN PLAIN` form
        let normalized = line.trim().replacen('=', " ", 1);
        let mut parts = normalized.split_whitespace();
        let Some(keyword) = parts.next() else {
            return;
        };
        let keyword = keyword.to_uppercase();

        match keyword.as_str() {
            "SIZE" => {
                self.size = Some(parts.next().and_then(|s| s.parse().ok()).unwrap_or(0));
            }
            "AUTH" => {
                for mechanism in parts.filter_map(AuthMechanism::parse) {
                    if !self.auth.contains(&mechanism) {
                        self.auth.push(mechanism);
                    }
                }
            }
            _ => {}
        }

        self.keywords.insert(keyword);
    }

    /// Checks if the server advertised an extension keyword.
    #[must_use]
    pub fn supports(&self, keyword: &str) -> bool {
        self.keywords.contains(&keyword.to_uppercase())
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports("STARTTLS")
    }

    /// Returns the maximum message size, if a non-zero limit was advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.size.filter(|&size| size > 0)
    }

    /// Checks if an AUTH mechanism was advertised.
    #[must_use]
    pub fn supports_auth(&self, mechanism: AuthMechanism) -> bool {
        self.auth.contains(&mechanism)
    }
}

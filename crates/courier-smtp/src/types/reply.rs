//! Server replies.

use std::fmt;

/// One complete server reply, after continuation lines are joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Three-digit code shared by every line.
    pub code: ReplyCode,
    /// Line texts without the code and separator.
    pub lines: Vec<String>,
}

impl Reply {
    /// Builds a reply from its code and line texts.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(code: ReplyCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code.class(), 2)
    }

    /// 3xx: the server wants more input.
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        matches!(self.code.class(), 3)
    }

    /// 4xx or 5xx.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.code.class() >= 4
    }

    /// 4xx: retrying later may succeed.
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code.is_transient()
    }

    /// 5xx: retrying will not help.
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }

    /// Line texts joined with `\n`.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        for line in self.lines.iter().filter(|l| !l.is_empty()) {
            write!(f, " {line}")?;
        }
        Ok(())
    }
}

/// Numeric reply code as sent by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Greeting.
    pub const SERVICE_READY: Self = Self(220);
    /// Generic acceptance.
    pub const OK: Self = Self(250);
    /// Go ahead with the message body.
    pub const START_DATA: Self = Self(354);
    /// Server is shutting the channel down.
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// Command not recognized; EHLO falls back to HELO on this.
    pub const SYNTAX_ERROR: Self = Self(500);
    /// Command not implemented; EHLO falls back to HELO on this.
    pub const NOT_IMPLEMENTED: Self = Self(502);

    /// Wraps a raw code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// The raw code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// First digit of the code.
    #[must_use]
    pub const fn class(self) -> u16 {
        self.0 / 100
    }

    /// 2xx.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.class() == 2
    }

    /// 4xx.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.class() == 4
    }

    /// 5xx.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.class() == 5
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

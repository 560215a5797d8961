//! SMTP connection management.
//!
//! [`Connection`] owns the transport and drives the command/reply exchange.
//! It reads the greeting, identifies itself, upgrades with STARTTLS and
//! authenticates. The mail transaction itself is driven by
//! [`Client`](crate::Client) on top of it.

mod engine;
mod stream;

pub use engine::Connection;
pub use stream::{SmtpStream, connect, connect_tls};

use crate::types::Capabilities;
use std::fmt;

/// Protocol state of a client's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport opening, waiting for the greeting.
    Connecting,
    /// Greeting received, identifying.
    Greeted,
    /// Handshake complete; ready for a transaction.
    Ready,
    /// AUTH exchange in progress.
    Authenticating,
    /// MAIL/RCPT/DATA in progress.
    Transacting,
    /// Torn down after QUIT or an error.
    Closed,
}

impl ConnectionState {
    /// Returns true while a transport is held.
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Disconnected | Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Greeted => "greeted",
            Self::Ready => "ready",
            Self::Authenticating => "authenticating",
            Self::Transacting => "transacting",
            Self::Closed => "closed",
        })
    }
}

/// What the server told us about itself.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from the greeting.
    pub hostname: String,
    /// Extensions from the last EHLO/LHLO reply; empty after HELO.
    pub capabilities: Capabilities,
    /// True when the server only accepted HELO.
    pub legacy_helo: bool,
}

//! Error types for SMTP operations.

use crate::types::Reply;
use std::fmt;
use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Bad or missing greeting, failed EHLO/HELO, DATA command rejected.
    Protocol,
    /// Authentication failed.
    Auth,
    /// MAIL FROM rejected or no recipient accepted.
    Envelope,
    /// Message too large, unbuildable, or rejected after transmission.
    Message,
    /// No reply within the configured timeout.
    Timeout,
    /// Transport closed or failed mid-operation.
    Connection,
    /// TLS negotiation failed or was unavailable when required.
    Tls,
    /// Invalid client configuration.
    Config,
}

impl ErrorCode {
    /// Returns the code as a stable string (`EPROTOCOL`, `EAUTH`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Protocol => "EPROTOCOL",
            Self::Auth => "EAUTH",
            Self::Envelope => "EENVELOPE",
            Self::Message => "EMESSAGE",
            Self::Timeout => "ETIMEDOUT",
            Self::Connection => "ECONNECTION",
            Self::Tls => "ETLS",
            Self::Config => "ECONFIG",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The server closed the connection.
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    /// No reply within the timeout.
    #[error("Timed out after {}ms waiting for the server", .0.as_millis())]
    Timeout(Duration),

    /// TLS handshake failed.
    #[error("TLS handshake failed: {0}")]
    TlsHandshake(#[source] io::Error),

    /// TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// STARTTLS required but not offered.
    #[error("Server does not support STARTTLS")]
    StartTlsUnavailable,

    /// STARTTLS required but refused by the server.
    #[error("{message}")]
    StartTlsRejected {
        /// Description including the server reply.
        message: String,
        /// Server reply, when one was received.
        reply: Option<Reply>,
    },

    /// Greeting, handshake or DATA command failure.
    #[error("{message}")]
    Protocol {
        /// Description including the server reply.
        message: String,
        /// Server reply, when one was received.
        reply: Option<Reply>,
    },

    /// Authentication failure.
    #[error("{message}")]
    Auth {
        /// Description including the server reply.
        message: String,
        /// Server reply, when one was received.
        reply: Option<Reply>,
    },

    /// Sender or recipients rejected.
    #[error("{message}")]
    Envelope {
        /// Description including the server reply.
        message: String,
        /// Server reply, when one was received.
        reply: Option<Reply>,
    },

    /// Message rejected or too large.
    #[error("{message}")]
    Message {
        /// Description including the server reply.
        message: String,
        /// Server reply, when one was received.
        reply: Option<Reply>,
    },

    /// Message could not be composed.
    #[error("Failed to build message: {0}")]
    Mime(#[from] courier_mime::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn protocol(message: impl fmt::Display, reply: Reply) -> Self {
        Self::Protocol {
            message: format!("{message}: {reply}"),
            reply: Some(reply),
        }
    }

    pub(crate) fn auth(message: impl fmt::Display, reply: Reply) -> Self {
        Self::Auth {
            message: format!("{message}: {reply}"),
            reply: Some(reply),
        }
    }

    pub(crate) fn starttls_rejected(reply: Reply) -> Self {
        Self::StartTlsRejected {
            message: format!("STARTTLS rejected: {reply}"),
            reply: Some(reply),
        }
    }

    pub(crate) fn envelope(message: impl fmt::Display, reply: Option<Reply>) -> Self {
        let message = match &reply {
            Some(reply) => format!("{message}: {reply}"),
            None => message.to_string(),
        };
        Self::Envelope { message, reply }
    }

    pub(crate) fn message(message: impl fmt::Display, reply: Option<Reply>) -> Self {
        let message = match &reply {
            Some(reply) => format!("{message}: {reply}"),
            None => message.to_string(),
        };
        Self::Message { message, reply }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) | Self::ConnectionClosed => ErrorCode::Connection,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::TlsHandshake(_)
            | Self::Tls(_)
            | Self::StartTlsUnavailable
            | Self::StartTlsRejected { .. } => ErrorCode::Tls,
            Self::Protocol { .. } => ErrorCode::Protocol,
            Self::Auth { .. } => ErrorCode::Auth,
            Self::Envelope { .. } | Self::InvalidAddress(_) => ErrorCode::Envelope,
            Self::Message { .. } | Self::Mime(_) => ErrorCode::Message,
            Self::Config(_) => ErrorCode::Config,
        }
    }

    /// Returns the server reply that caused this error, if any.
    #[must_use]
    pub const fn reply(&self) -> Option<&Reply> {
        match self {
            Self::Protocol { reply, .. }
            | Self::Auth { reply, .. }
            | Self::Envelope { reply, .. }
            | Self::Message { reply, .. }
            | Self::StartTlsRejected { reply, .. } => reply.as_ref(),
            _ => None,
        }
    }

    /// Returns the numeric reply code of the server reply, if any.
    #[must_use]
    pub fn response_code(&self) -> Option<u16> {
        self.reply().map(|reply| reply.code.as_u16())
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.reply().is_some_and(Reply::is_permanent_error)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.reply().is_some_and(Reply::is_transient_error)
    }
}

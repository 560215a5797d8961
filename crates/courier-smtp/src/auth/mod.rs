//! SMTP authentication (RFC 4954).
//!
//! The exchange is a small state machine with no I/O of its own: the
//! engine sends the command returned by [`AuthExchange::start`] and feeds
//! each server reply to [`AuthExchange::respond`] until it reports
//! [`AuthStep::Done`].
//!
//! ```text
//! PLAIN     AUTH PLAIN <b64>                          -> 235
//! LOGIN     AUTH LOGIN -> 334 -> <b64 user> -> 334 -> <b64 pass> -> 235
//! CRAM-MD5  AUTH CRAM-MD5 -> 334 <challenge> -> <b64 user digest> -> 235
//! XOAUTH2   AUTH XOAUTH2 <token>                      -> 235
//! ```

mod mechanism;

pub use mechanism::{cram_md5_response, plain_response, xoauth2_response};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::types::{AuthMechanism, Capabilities, Reply};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

/// Credentials used to authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Username and password.
    Password {
        /// Username.
        user: String,
        /// Password.
        pass: String,
        /// Forces a mechanism regardless of what the server advertises.
        method: Option<AuthMechanism>,
    },
    /// `OAuth2` access token, sent as an `XOAUTH2` token built for `user`.
    OAuth2 {
        /// Username (usually the e-mail address).
        user: String,
        /// Access token.
        access_token: String,
    },
    /// Pre-encoded `XOAUTH2` token, sent verbatim.
    XOAuth2Token(String),
}

impl Credentials {
    /// Creates password credentials with automatic mechanism selection.
    #[must_use]
    pub fn password(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self::Password {
            user: user.into(),
            pass: pass.into(),
            method: None,
        }
    }

    /// Creates `OAuth2` credentials.
    #[must_use]
    pub fn oauth2(user: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::OAuth2 {
            user: user.into(),
            access_token: access_token.into(),
        }
    }

    /// Forces the mechanism for password credentials.
    #[must_use]
    pub fn with_method(self, mechanism: AuthMechanism) -> Self {
        match self {
            Self::Password { user, pass, .. } => Self::Password {
                user,
                pass,
                method: Some(mechanism),
            },
            other => other,
        }
    }

    /// Returns the username, if the credentials carry one.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        match self {
            Self::Password { user, .. } | Self::OAuth2 { user, .. } => Some(user),
            Self::XOAuth2Token(_) => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { user, method, .. } => f
                .debug_struct("Password")
                .field("user", user)
                .field("pass", &"<redacted>")
                .field("method", method)
                .finish(),
            Self::OAuth2 { user, .. } => f
                .debug_struct("OAuth2")
                .field("user", user)
                .field("access_token", &"<redacted>")
                .finish(),
            Self::XOAuth2Token(_) => f.debug_tuple("XOAuth2Token").field(&"<redacted>").finish(),
        }
    }
}

/// The mechanism chosen for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// PLAIN.
    Plain,
    /// LOGIN.
    Login,
    /// CRAM-MD5.
    CramMd5,
    /// XOAUTH2; `token` is a caller-supplied pre-encoded token.
    XOAuth2 {
        /// Token sent verbatim when present.
        token: Option<String>,
    },
}

impl AuthMethod {
    /// Picks the mechanism for `credentials` against the advertised
    /// capabilities.
    ///
    /// A forced method always wins. OAuth credentials always use XOAUTH2.
    /// Otherwise the strongest advertised of CRAM-MD5, LOGIN and PLAIN is
    /// used, and PLAIN when the server advertised none of them.
    #[must_use]
    pub fn select(credentials: &Credentials, capabilities: &Capabilities) -> Self {
        match credentials {
            Credentials::XOAuth2Token(token) => Self::XOAuth2 {
                token: Some(token.clone()),
            },
            Credentials::OAuth2 { .. } => Self::XOAuth2 { token: None },
            Credentials::Password {
                method: Some(forced),
                ..
            } => Self::from_mechanism(*forced),
            Credentials::Password { method: None, .. } => [
                AuthMechanism::CramMd5,
                AuthMechanism::Login,
                AuthMechanism::Plain,
            ]
            .into_iter()
            .find(|m| capabilities.supports_auth(*m))
            .map_or(Self::Plain, Self::from_mechanism),
        }
    }

    const fn from_mechanism(mechanism: AuthMechanism) -> Self {
        match mechanism {
            AuthMechanism::Plain => Self::Plain,
            AuthMechanism::Login => Self::Login,
            AuthMechanism::CramMd5 => Self::CramMd5,
            AuthMechanism::XOAuth2 => Self::XOAuth2 { token: None },
        }
    }

    /// Returns the wire mechanism.
    #[must_use]
    pub const fn mechanism(&self) -> AuthMechanism {
        match self {
            Self::Plain => AuthMechanism::Plain,
            Self::Login => AuthMechanism::Login,
            Self::CramMd5 => AuthMechanism::CramMd5,
            Self::XOAuth2 { .. } => AuthMechanism::XOAuth2,
        }
    }
}

/// What the engine should do after a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStep {
    /// Send this command and feed the next reply back.
    Send(Command),
    /// Authentication succeeded.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    Sent,
    LoginUser,
    LoginPass,
    Answered,
    Aborting,
}

/// One AUTH exchange.
#[derive(Debug)]
pub struct AuthExchange<'a> {
    method: AuthMethod,
    credentials: &'a Credentials,
    stage: Stage,
}

impl<'a> AuthExchange<'a> {
    /// Creates an exchange for the selected method.
    #[must_use]
    pub const fn new(method: AuthMethod, credentials: &'a Credentials) -> Self {
        Self {
            method,
            credentials,
            stage: Stage::Start,
        }
    }

    /// Returns the method in use.
    #[must_use]
    pub const fn method(&self) -> &AuthMethod {
        &self.method
    }

    /// Returns the initial AUTH command.
    #[must_use]
    pub fn start(&mut self) -> Command {
        let mechanism = self.method.mechanism();
        let initial_response = match &self.method {
            AuthMethod::Plain => {
                self.stage = Stage::Answered;
                let (user, pass) = self.user_pass();
                Some(plain_response(user, pass))
            }
            AuthMethod::XOAuth2 { token } => {
                self.stage = Stage::Answered;
                Some(token.clone().unwrap_or_else(|| self.xoauth2_token()))
            }
            AuthMethod::Login | AuthMethod::CramMd5 => {
                self.stage = Stage::Sent;
                None
            }
        };
        Command::Auth {
            mechanism,
            initial_response,
        }
    }

    /// Advances the exchange with a server reply.
    ///
    /// # Errors
    ///
    /// Returns an `EAUTH` error when the server rejects any step or sends
    /// an unexpected reply.
    pub fn respond(&mut self, reply: &Reply) -> Result<AuthStep> {
        let mechanism = self.method.mechanism();
        let fail = |reply: &Reply| {
            Error::auth(format!("Authentication failed ({mechanism})"), reply.clone())
        };

        if reply.is_failure() {
            return Err(fail(reply));
        }

        match (self.stage, reply.is_intermediate()) {
            (Stage::Aborting, _) => Err(fail(reply)),
            (Stage::Answered, false) if reply.is_success() => Ok(AuthStep::Done),
            (Stage::Answered, true) if matches!(self.method, AuthMethod::XOAuth2 { .. }) => {
                // XOAUTH2 error details come as a 334 challenge; an empty
                // answer makes the server send the final failure reply.
                self.stage = Stage::Aborting;
                Ok(AuthStep::Send(Command::AuthResponse(String::new())))
            }
            (Stage::Sent, true) if self.method == AuthMethod::Login => {
                self.stage = Stage::LoginUser;
                let (user, _) = self.user_pass();
                Ok(AuthStep::Send(Command::AuthResponse(
                    STANDARD.encode(user.as_bytes()),
                )))
            }
            (Stage::LoginUser, true) => {
                self.stage = Stage::LoginPass;
                let (_, pass) = self.user_pass();
                Ok(AuthStep::Send(Command::AuthResponse(
                    STANDARD.encode(pass.as_bytes()),
                )))
            }
            (Stage::LoginPass, false) if reply.is_success() => Ok(AuthStep::Done),
            (Stage::Sent, true) if self.method == AuthMethod::CramMd5 => {
                self.stage = Stage::Answered;
                let challenge = reply.lines.first().map_or("", |line| line.trim());
                let (user, pass) = self.user_pass();
                let response = cram_md5_response(user, pass, challenge).ok_or_else(|| {
                    Error::auth("Invalid CRAM-MD5 challenge", reply.clone())
                })?;
                Ok(AuthStep::Send(Command::AuthResponse(response)))
            }
            _ => Err(Error::auth(
                format!("Unexpected reply during {mechanism} authentication"),
                reply.clone(),
            )),
        }
    }

    fn user_pass(&self) -> (&str, &str) {
        match self.credentials {
            Credentials::Password { user, pass, .. } => (user, pass),
            Credentials::OAuth2 { user, access_token } => (user, access_token),
            Credentials::XOAuth2Token(token) => ("", token),
        }
    }

    fn xoauth2_token(&self) -> String {
        let (user, token) = self.user_pass();
        xoauth2_response(user, token)
    }
}

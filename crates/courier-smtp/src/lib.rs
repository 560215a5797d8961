//! # courier-smtp
//!
//! An async SMTP/LMTP submission client implementing RFC 5321.
//!
//! ## Features
//!
//! - **Per-recipient results**: partial rejection resolves successfully with
//!   the rejected addresses reported
//! - **TLS support**: implicit TLS (port 465) and STARTTLS, opportunistic or
//!   required
//! - **Authentication**: PLAIN, LOGIN, CRAM-MD5, XOAUTH2
//! - **Extensions**: SIZE (pre-checked locally), LMTP
//! - **Message composition** through [`courier_mime::Mail`], or raw bytes
//! - **DKIM**: optional signing of composed messages
//!
//! ## Quick Start
//!
//! ```no_run
//! use courier_mime::Mail;
//! use courier_smtp::{Client, ClientConfig, Credentials, Security};
//!
//! #[tokio::main]
//! async fn main() -> courier_smtp::Result<()> {
//!     let config = ClientConfig::builder("smtp.example.com")
//!         .security(Security::StartTls)
//!         .auth(Credentials::password("user@example.com", "password"))
//!         .build()?;
//!     let mut client = Client::new(config);
//!
//!     let mail = Mail::new()
//!         .from("Sender <sender@example.com>")
//!         .to("recipient@example.com, other@example.com")
//!         .subject("Test")
//!         .text("Hello, World!");
//!
//!     let result = client.send(mail).await?;
//!     println!("accepted {:?}, rejected {:?}", result.accepted, result.rejected);
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Disconnected ─ send()/verify() ─→ Connecting ─ 220 ─→ Greeted ─ EHLO ─→ Ready
//!                                                                          │  ▲
//!                                              Authenticating ←─ AUTH ─────┘  │
//!                                              Transacting ── MAIL/RCPT/DATA ─┘
//! any error / close() ─→ Closed
//! ```
//!
//! ## Modules
//!
//! - [`auth`]: SASL mechanisms and the AUTH exchange
//! - [`command`]: SMTP command builders and DATA framing
//! - [`connection`]: Transport and protocol engine
//! - [`parser`]: Line reader and reply parser
//! - [`services`]: Well-known provider presets
//! - [`types`]: Core SMTP types (addresses, capabilities, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
mod client;
pub mod command;
mod config;
pub mod connection;
mod envelope;
mod error;
pub mod parser;
pub mod services;
pub mod types;

pub use auth::Credentials;
pub use client::{Client, SendRequest, SendResult};
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_TIMEOUT, Security};
pub use connection::{ConnectionState, ServerInfo};
pub use envelope::{Delivery, Envelope, RecipientOutcome, RecipientStatus};
pub use error::{Error, ErrorCode, Result};
pub use types::{Address, AuthMechanism, Capabilities, Reply, ReplyCode};

pub use courier_mime::{DkimConfig, Mail, ParsedAddress};

//! # courier-mime
//!
//! Message composition and address parsing for outgoing email.
//!
//! ## Features
//!
//! - **Message building**: text, HTML and calendar alternatives, inline
//!   images, attachments from memory, files or `data:` URIs
//! - **Header safety**: CR/LF in header values can never start a new header
//! - **Encodings**: Base64, Quoted-Printable, RFC 2047 words, RFC 5987
//!   parameters
//! - **Addresses**: RFC 5322 address lists including groups and comments
//! - **DKIM**: optional `rsa-sha256` signing of built messages
//!
//! ## Quick Start
//!
//! ```
//! use courier_mime::{Attachment, BuildOptions, Mail};
//!
//! let mail = Mail::new()
//!     .from("\"Sender\" <sender@example.com>")
//!     .to("recipient@example.com")
//!     .subject("Report")
//!     .text("See attached.")
//!     .attach(Attachment::new("report.csv", "a,b\n1,2\n"));
//!
//! let built = mail.build(&BuildOptions::default())?;
//! assert!(built.message_id.ends_with("@localhost>"));
//! # Ok::<(), courier_mime::Error>(())
//! ```
//!
//! ### Address lists
//!
//! ```
//! use courier_mime::parse_address_list;
//!
//! let list = parse_address_list("Team: a@x.com, b@x.com;, c@x.com", true);
//! let addresses: Vec<_> = list.iter().map(|a| a.address.as_str()).collect();
//! assert_eq!(addresses, ["a@x.com", "b@x.com", "c@x.com"]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod dkim;
mod error;
mod header;
mod message;

pub mod encoding;

pub use address::{ParsedAddress, flatten_groups, format_address_list, parse_address_list};
pub use content_type::ContentType;
pub use dkim::{DEFAULT_SIGNED_HEADERS, DkimConfig, DkimSigner};
pub use error::{Error, Result};
pub use header::{Headers, sanitize_value};
pub use message::{
    Attachment, AttachmentSource, BuildOptions, BuiltMessage, DEFAULT_MAILER, IcalEvent,
    ListHeader, Mail, Priority, TransferEncoding,
};

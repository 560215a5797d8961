//! Error types for message composition.

use std::io;
use std::path::PathBuf;
use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid header name.
    #[error("Invalid header name: {0:?}")]
    InvalidHeaderName(String),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),

    /// Malformed `data:` URI used as attachment source.
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// Attachment file could not be read.
    #[error("Failed to read attachment {path}: {source}")]
    AttachmentRead {
        /// Path of the attachment.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// DKIM key could not be loaded or the message could not be signed.
    #[error("DKIM signing failed: {0}")]
    Dkim(String),
}

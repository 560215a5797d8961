//! DKIM signing (RFC 6376).
//!
//! Messages are signed with `rsa-sha256` and `relaxed/relaxed`
//! canonicalization. The signature header is prepended to the message on a
//! single line.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;

/// Header fields signed by default. Fields missing from a message are
/// skipped.
pub const DEFAULT_SIGNED_HEADERS: &[&str] = &[
    "from",
    "sender",
    "reply-to",
    "subject",
    "date",
    "message-id",
    "to",
    "cc",
    "mime-version",
    "content-type",
    "content-transfer-encoding",
    "in-reply-to",
    "references",
    "list-id",
    "list-unsubscribe",
];

/// DKIM signing parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct DkimConfig {
    /// Signing domain (`d=`).
    pub domain_name: String,
    /// Selector (`s=`). The public key is published at
    /// `<selector>._domainkey.<domain>`.
    pub key_selector: String,
    /// RSA private key as PKCS#8 or PKCS#1 PEM.
    pub private_key: String,
    /// Header fields to sign. `from` is always signed.
    pub header_fields: Vec<String>,
}

impl DkimConfig {
    /// Creates a configuration signing [`DEFAULT_SIGNED_HEADERS`].
    #[must_use]
    pub fn new(
        domain_name: impl Into<String>,
        key_selector: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            domain_name: domain_name.into(),
            key_selector: key_selector.into(),
            private_key: private_key.into(),
            header_fields: DEFAULT_SIGNED_HEADERS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Replaces the list of signed header fields.
    #[must_use]
    pub fn header_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for DkimConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DkimConfig")
            .field("domain_name", &self.domain_name)
            .field("key_selector", &self.key_selector)
            .field("private_key", &"<redacted>")
            .field("header_fields", &self.header_fields)
            .finish()
    }
}

/// Signs serialized messages with a loaded key.
#[derive(Clone)]
pub struct DkimSigner {
    domain_name: String,
    key_selector: String,
    header_fields: Vec<String>,
    key: SigningKey<Sha256>,
}

impl DkimSigner {
    /// Loads the private key and normalises the header list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dkim`] if the domain or selector is empty, or the key
    /// is neither a PKCS#8 nor a PKCS#1 RSA PEM.
    pub fn new(config: &DkimConfig) -> Result<Self> {
        let domain_name = config.domain_name.trim();
        let key_selector = config.key_selector.trim();
        if domain_name.is_empty() || key_selector.is_empty() {
            return Err(Error::Dkim(
                "domain name and key selector are required".into(),
            ));
        }

        let pem = config.private_key.trim();
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| Error::Dkim(format!("invalid private key: {e}")))?;

        let mut header_fields = vec!["from".to_string()];
        for field in &config.header_fields {
            let field = field.trim().to_ascii_lowercase();
            if !field.is_empty() && !header_fields.contains(&field) {
                header_fields.push(field);
            }
        }

        Ok(Self {
            domain_name: domain_name.to_string(),
            key_selector: key_selector.to_string(),
            header_fields,
            key: SigningKey::new(key),
        })
    }

    /// Returns `message` with a `DKIM-Signature` header prepended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dkim`] if the message has no `From` header or the
    /// RSA operation fails.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let value = self.signature_value(message, Utc::now().timestamp())?;
        let mut signed = Vec::with_capacity(message.len() + value.len() + 18);
        signed.extend_from_slice(b"DKIM-Signature: ");
        signed.extend_from_slice(value.as_bytes());
        signed.extend_from_slice(b"\r\n");
        signed.extend_from_slice(message);
        Ok(signed)
    }

    fn signature_value(&self, message: &[u8], timestamp: i64) -> Result<String> {
        let (header_block, body) = split_message(message);
        let headers = parse_headers(&header_block);

        let mut signed_names = Vec::new();
        let mut data = String::new();
        for name in &self.header_fields {
            // Bottom-up for repeated fields.
            for (field, value) in headers
                .iter()
                .rev()
                .filter(|(field, _)| field.eq_ignore_ascii_case(name))
            {
                data.push_str(&relaxed_header(field, value));
                data.push_str("\r\n");
                signed_names.push(name.as_str());
            }
        }
        if !signed_names.contains(&"from") {
            return Err(Error::Dkim("message has no From header".into()));
        }

        let body_hash = STANDARD.encode(Sha256::digest(relaxed_body(body)));
        let value = format!(
            "v=1; a=rsa-sha256; c=relaxed/relaxed; d={}; s={}; t={timestamp}; h={}; bh={body_hash}; b=",
            self.domain_name,
            self.key_selector,
            signed_names.join(":"),
        );
        data.push_str(&relaxed_header("DKIM-Signature", &value));

        let signature = self
            .key
            .try_sign(data.as_bytes())
            .map_err(|e| Error::Dkim(format!("RSA signing failed: {e}")))?;
        Ok(format!("{value}{}", STANDARD.encode(signature.to_bytes())))
    }
}

impl fmt::Debug for DkimSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DkimSigner")
            .field("domain_name", &self.domain_name)
            .field("key_selector", &self.key_selector)
            .field("header_fields", &self.header_fields)
            .finish_non_exhaustive()
    }
}

/// Splits at the first empty line. The header block keeps its final CRLF.
fn split_message(message: &[u8]) -> (Cow<'_, str>, &[u8]) {
    match message.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(pos) => (
            String::from_utf8_lossy(&message[..pos + 2]),
            &message[pos + 4..],
        ),
        None => (String::from_utf8_lossy(message), &message[..0]),
    }
}

/// Header fields in order, continuation lines kept in the value.
fn parse_headers(block: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in block.split("\r\n") {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push_str("\r\n");
                value.push_str(line);
            }
        } else if let Some((name, value)) = line.split_once(':') {
            headers.push((name.to_string(), value.to_string()));
        }
    }
    headers
}

/// `relaxed` header canonicalization, without the trailing CRLF.
fn relaxed_header(name: &str, value: &str) -> String {
    let value = value
        .replace("\r\n", "")
        .split([' ', '\t'])
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!("{}:{value}", name.trim().to_ascii_lowercase())
}

/// `relaxed` body canonicalization.
fn relaxed_body(body: &[u8]) -> Vec<u8> {
    let mut lines: Vec<Vec<u8>> = split_crlf(body)
        .into_iter()
        .map(|line| {
            let mut out = Vec::with_capacity(line.len());
            let mut pending_space = false;
            for &byte in line {
                if byte == b' ' || byte == b'\t' {
                    pending_space = true;
                } else {
                    if pending_space {
                        out.push(b' ');
                        pending_space = false;
                    }
                    out.push(byte);
                }
            }
            out
        })
        .collect();
    while lines.last().is_some_and(Vec::is_empty) {
        lines.pop();
    }

    let mut out = Vec::with_capacity(body.len());
    for line in lines {
        out.extend_from_slice(&line);
        out.extend_from_slice(b"\r\n");
    }
    out
}

fn split_crlf(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut rest = data;
    while let Some(pos) = rest.windows(2).position(|w| w == b"\r\n") {
        lines.push(&rest[..pos]);
        rest = &rest[pos + 2..];
    }
    lines.push(rest);
    lines
}

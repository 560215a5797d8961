//! Outgoing message composition.
//!
//! [`Mail`] holds the structured fields of a message and [`Mail::build`]
//! turns them into RFC 5322 bytes:
//!
//! ```text
//! text only            text/plain (no MIME-Version)
//! html only            text/html
//! text + html [+ ics]  multipart/alternative
//! cid attachments      multipart/related around the html part
//! other attachments    multipart/mixed around everything
//! ```

use crate::address::{ParsedAddress, format_address_list, parse_address_list};
use crate::content_type::ContentType;
use crate::dkim::{DkimConfig, DkimSigner};
use crate::encoding::{
    decode_base64, encode_base64_wrapped, encode_quoted_printable, encode_rfc2047, encode_rfc5987,
};
use crate::error::{Error, Result};
use crate::header::Headers;
use chrono::Utc;
use percent_encoding::percent_decode_str;
use std::fmt;
use std::path::PathBuf;

/// Value of the `X-Mailer` header.
pub const DEFAULT_MAILER: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit data with CRLF lines.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }

    fn encode(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Base64 => encode_base64_wrapped(data).into_bytes(),
            Self::QuotedPrintable => {
                encode_quoted_printable(&String::from_utf8_lossy(data)).into_bytes()
            }
            Self::SevenBit | Self::EightBit | Self::Binary => data.to_vec(),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Message priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// `X-Priority: 1`, `Importance: High`.
    High,
    /// No priority headers.
    #[default]
    Normal,
    /// `X-Priority: 5`, `Importance: Low`.
    Low,
}

impl Priority {
    /// Parses `high`, `normal` or `low` (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "normal" => Some(Self::Normal),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Calendar invitation attached as a `text/calendar` alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcalEvent {
    /// iTIP method, `PUBLISH` when absent.
    pub method: Option<String>,
    /// iCalendar document.
    pub content: String,
}

impl IcalEvent {
    /// Creates an event with the default `PUBLISH` method.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            method: None,
            content: content.into(),
        }
    }

    /// Sets the iTIP method (`REQUEST`, `CANCEL`, ...).
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    fn method(&self) -> &str {
        self.method.as_deref().unwrap_or("PUBLISH")
    }
}

/// One `List-*` header (RFC 2369 / RFC 2919).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListHeader {
    /// Header key without the `List-` prefix: `help`, `unsubscribe`,
    /// `subscribe`, `post`, `owner`, `archive` or `id`.
    pub key: String,
    /// URL or e-mail address.
    pub url: String,
    /// Optional comment.
    pub comment: Option<String>,
}

impl ListHeader {
    /// Creates a list header entry.
    #[must_use]
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
            comment: None,
        }
    }

    /// Adds a comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    fn header_name(&self) -> String {
        let key = self.key.trim().to_lowercase();
        if key == "id" {
            return "List-ID".to_string();
        }
        let capitalized = key
            .split('-')
            .map(|part| {
                let mut chars = part.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().collect::<String>() + chars.as_str()
                })
            })
            .collect::<Vec<_>>()
            .join("-");
        format!("List-{capitalized}")
    }

    fn header_value(&self) -> String {
        let url = self.url.trim();
        let url = url
            .strip_prefix('<')
            .and_then(|u| u.strip_suffix('>'))
            .unwrap_or(url);
        let url = if url.contains('@') && !url.contains(':') {
            format!("mailto:{url}")
        } else {
            url.to_string()
        };

        match (&self.comment, self.key.eq_ignore_ascii_case("id")) {
            (Some(comment), true) => format!("{} <{url}>", quote_phrase(comment)),
            (Some(comment), false) => format!("<{url}> ({})", encode_rfc2047(comment, "UTF-8")),
            (None, _) => format!("<{url}>"),
        }
    }
}

fn quote_phrase(text: &str) -> String {
    if text.is_ascii() {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        encode_rfc2047(text, "UTF-8")
    }
}

/// Where an attachment's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// In-memory content.
    Content(Vec<u8>),
    /// File read at build time.
    Path(PathBuf),
    /// `data:` URI.
    DataUri(String),
}

/// A message attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name; `None` omits the filename parameter entirely.
    pub filename: Option<String>,
    /// Content source.
    pub source: AttachmentSource,
    /// Explicit content type; guessed from the filename otherwise.
    pub content_type: Option<String>,
    /// Content-ID for inline images referenced as `cid:` from the html.
    pub cid: Option<String>,
    /// Explicit transfer encoding.
    pub content_transfer_encoding: Option<TransferEncoding>,
}

impl Attachment {
    /// Creates an attachment from in-memory content.
    #[must_use]
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: Some(filename.into()),
            source: AttachmentSource::Content(content.into()),
            content_type: None,
            cid: None,
            content_transfer_encoding: None,
        }
    }

    /// Creates an attachment read from a path or a `data:` URI.
    ///
    /// For file paths the filename defaults to the final path component.
    #[must_use]
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        if path.starts_with("data:") {
            return Self {
                filename: None,
                source: AttachmentSource::DataUri(path),
                content_type: None,
                cid: None,
                content_transfer_encoding: None,
            };
        }

        let path = PathBuf::from(path);
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Self {
            filename,
            source: AttachmentSource::Path(path),
            content_type: None,
            cid: None,
            content_transfer_encoding: None,
        }
    }

    /// Sets the filename.
    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Removes the filename so no `filename`/`name` parameter is emitted.
    #[must_use]
    pub fn without_filename(mut self) -> Self {
        self.filename = None;
        self
    }

    /// Sets an explicit content type.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Marks the attachment inline with the given Content-ID.
    #[must_use]
    pub fn cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    /// Sets an explicit transfer encoding.
    #[must_use]
    pub const fn transfer_encoding(mut self, encoding: TransferEncoding) -> Self {
        self.content_transfer_encoding = Some(encoding);
        self
    }
}

/// Options that come from the sending client rather than the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Domain used in the generated Message-ID.
    pub hostname: String,
    /// Keep the `Bcc` header in the output.
    pub keep_bcc: bool,
    /// Skip attachments that would be read from the filesystem.
    pub disable_file_access: bool,
    /// `X-Mailer` value; `None` omits the header.
    pub mailer: Option<String>,
    /// Sign the message with DKIM.
    pub dkim: Option<DkimConfig>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            keep_bcc: false,
            disable_file_access: false,
            mailer: Some(DEFAULT_MAILER.to_string()),
            dkim: None,
        }
    }
}

/// A composed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltMessage {
    /// Message-ID header value, including angle brackets.
    pub message_id: String,
    /// Serialized message (headers, blank line, body).
    pub bytes: Vec<u8>,
}

/// Structured message fields.
///
/// Address fields hold RFC 5322 address-list strings; each `to`, `cc` and
/// `bcc` entry may itself contain several comma separated addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mail {
    /// `From` header.
    pub from: Option<String>,
    /// `Sender` header.
    pub sender: Option<String>,
    /// `To` recipients.
    pub to: Vec<String>,
    /// `Cc` recipients.
    pub cc: Vec<String>,
    /// `Bcc` recipients (envelope only unless kept).
    pub bcc: Vec<String>,
    /// `Reply-To` header.
    pub reply_to: Option<String>,
    /// `In-Reply-To` header.
    pub in_reply_to: Option<String>,
    /// `References` message ids.
    pub references: Vec<String>,
    /// `Subject` header.
    pub subject: Option<String>,
    /// Plain text body.
    pub text: Option<String>,
    /// HTML body.
    pub html: Option<String>,
    /// Extra headers in output order; duplicates allowed.
    pub headers: Vec<(String, String)>,
    /// `List-*` headers.
    pub list: Vec<ListHeader>,
    /// Calendar alternative.
    pub ical_event: Option<IcalEvent>,
    /// Attachments in output order.
    pub attachments: Vec<Attachment>,
    /// Priority headers.
    pub priority: Priority,
    /// Explicit Message-ID; generated when absent.
    pub message_id: Option<String>,
}

impl Mail {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `From` address.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets the `Sender` address.
    #[must_use]
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Adds `To` recipients.
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to.push(to.into());
        self
    }

    /// Adds `Cc` recipients.
    #[must_use]
    pub fn cc(mut self, cc: impl Into<String>) -> Self {
        self.cc.push(cc.into());
        self
    }

    /// Adds `Bcc` recipients.
    #[must_use]
    pub fn bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc.push(bcc.into());
        self
    }

    /// Sets the `Reply-To` address.
    #[must_use]
    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Sets `In-Reply-To`.
    #[must_use]
    pub fn in_reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.in_reply_to = Some(message_id.into());
        self
    }

    /// Appends to `References`.
    #[must_use]
    pub fn reference(mut self, message_id: impl Into<String>) -> Self {
        self.references.push(message_id.into());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the plain text body.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Appends a custom header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Appends a `List-*` header.
    #[must_use]
    pub fn list(mut self, entry: ListHeader) -> Self {
        self.list.push(entry);
        self
    }

    /// Sets the calendar alternative.
    #[must_use]
    pub fn ical_event(mut self, event: IcalEvent) -> Self {
        self.ical_event = Some(event);
        self
    }

    /// Appends an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets an explicit Message-ID.
    #[must_use]
    pub fn message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Parsed `From` mailboxes.
    #[must_use]
    pub fn from_addresses(&self) -> Vec<ParsedAddress> {
        self.from
            .as_deref()
            .map(|from| parse_address_list(from, true))
            .unwrap_or_default()
    }

    /// Parsed `To`, `Cc` and `Bcc` mailboxes, groups flattened, in that order.
    #[must_use]
    pub fn recipient_addresses(&self) -> Vec<ParsedAddress> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .flat_map(|list| parse_address_list(list, true))
            .collect()
    }

    /// Composes the message.
    ///
    /// # Errors
    ///
    /// Returns an error if a custom header name is invalid, an attachment
    /// file cannot be read, a `data:` URI or content type is malformed, or
    /// DKIM signing fails.
    pub fn build(&self, options: &BuildOptions) -> Result<BuiltMessage> {
        let mut headers = Headers::new();
        let custom_has = |name: &str| {
            self.headers
                .iter()
                .any(|(n, _)| n.eq_ignore_ascii_case(name))
        };

        push_address_header(&mut headers, "From", self.from.iter());
        push_address_header(&mut headers, "Sender", self.sender.iter());
        push_address_header(&mut headers, "To", self.to.iter());
        push_address_header(&mut headers, "Cc", self.cc.iter());
        if options.keep_bcc {
            push_address_header(&mut headers, "Bcc", self.bcc.iter());
        }
        push_address_header(&mut headers, "Reply-To", self.reply_to.iter());
        if let Some(in_reply_to) = &self.in_reply_to {
            headers.add("In-Reply-To", angle_id(in_reply_to))?;
        }
        if !self.references.is_empty() {
            let refs: Vec<String> = self.references.iter().map(|r| angle_id(r)).collect();
            headers.add("References", refs.join(" "))?;
        }
        if let Some(subject) = &self.subject {
            headers.add_encoded("Subject", subject)?;
        }

        if !custom_has("Date") {
            headers.add("Date", Utc::now().to_rfc2822())?;
        }

        let message_id = self
            .headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("Message-ID"))
            .map(|(_, v)| v.clone())
            .or_else(|| self.message_id.as_deref().map(angle_id))
            .unwrap_or_else(|| generate_message_id(&options.hostname));
        if !custom_has("Message-ID") {
            headers.add("Message-ID", &message_id)?;
        }

        if let Some(mailer) = &options.mailer
            && !custom_has("X-Mailer")
        {
            headers.add("X-Mailer", mailer)?;
        }

        match self.priority {
            Priority::High => {
                headers.add("X-Priority", "1 (Highest)")?;
                headers.add("X-MSMail-Priority", "High")?;
                headers.add("Importance", "High")?;
            }
            Priority::Low => {
                headers.add("X-Priority", "5 (Lowest)")?;
                headers.add("X-MSMail-Priority", "Low")?;
                headers.add("Importance", "Low")?;
            }
            Priority::Normal => {}
        }

        for entry in &self.list {
            headers.add(entry.header_name(), entry.header_value())?;
        }

        for (name, value) in &self.headers {
            headers.add_encoded(name.as_str(), value)?;
        }

        let root = self.body_part(options)?;
        if !root.is_plain_text() {
            headers.add("MIME-Version", "1.0")?;
        }

        let mut bytes = headers.to_string().into_bytes();
        root.write_to(&mut bytes);

        if let Some(dkim) = &options.dkim {
            bytes = DkimSigner::new(dkim)?.sign(&bytes)?;
        }

        Ok(BuiltMessage { message_id, bytes })
    }

    fn body_part(&self, options: &BuildOptions) -> Result<Part> {
        let mut related = Vec::new();
        let mut mixed = Vec::new();
        for attachment in &self.attachments {
            let Some(part) = attachment_part(attachment, options)? else {
                continue;
            };
            if attachment.cid.is_some() && self.html.is_some() {
                related.push(part);
            } else {
                mixed.push(part);
            }
        }

        let mut alternatives = Vec::new();
        if let Some(text) = &self.text {
            alternatives.push(Part::text(ContentType::text_plain(), text));
        }
        if let Some(html) = &self.html {
            let html_part = Part::text(ContentType::text_html(), html);
            if related.is_empty() {
                alternatives.push(html_part);
            } else {
                related.insert(0, html_part);
                alternatives.push(Part::multipart(ContentType::multipart_related(boundary()), related));
            }
        }
        if let Some(event) = &self.ical_event {
            alternatives.push(Part::text(
                ContentType::text_calendar(event.method()),
                &event.content,
            ));
        }

        let content = match alternatives.len() {
            0 if mixed.is_empty() => Some(Part::text(ContentType::text_plain(), "")),
            0 => None,
            1 if self.ical_event.is_none() => alternatives.pop(),
            _ => Some(Part::multipart(
                ContentType::multipart_alternative(boundary()),
                alternatives,
            )),
        };

        if mixed.is_empty() {
            return Ok(content.unwrap_or_else(|| Part::text(ContentType::text_plain(), "")));
        }

        let mut parts: Vec<Part> = content.into_iter().collect();
        parts.extend(mixed);
        Ok(Part::multipart(ContentType::multipart_mixed(boundary()), parts))
    }
}

fn push_address_header<'a>(
    headers: &mut Headers,
    name: &str,
    values: impl Iterator<Item = &'a String>,
) {
    let addresses: Vec<ParsedAddress> = values
        .flat_map(|value| parse_address_list(value, false))
        .collect();
    if !addresses.is_empty() {
        headers.add_raw(name, format_address_list(&addresses));
    }
}

fn angle_id(id: &str) -> String {
    let id = id.trim();
    if id.starts_with('<') && id.ends_with('>') {
        id.to_string()
    } else {
        format!("<{id}>")
    }
}

fn generate_message_id(hostname: &str) -> String {
    format!("<{}@{hostname}>", uuid::Uuid::new_v4().simple())
}

fn boundary() -> String {
    format!("----courier_{}", uuid::Uuid::new_v4().simple())
}

fn attachment_part(attachment: &Attachment, options: &BuildOptions) -> Result<Option<Part>> {
    let (content, uri_type) = match &attachment.source {
        AttachmentSource::Content(bytes) => (bytes.clone(), None),
        AttachmentSource::Path(path) => {
            if options.disable_file_access {
                tracing::warn!(path = %path.display(), "file access disabled, skipping attachment");
                return Ok(None);
            }
            let bytes = std::fs::read(path).map_err(|source| Error::AttachmentRead {
                path: path.clone(),
                source,
            })?;
            (bytes, None)
        }
        AttachmentSource::DataUri(uri) => {
            let (media_type, bytes) = parse_data_uri(uri)?;
            (bytes, media_type)
        }
    };

    let mut content_type = match (&attachment.content_type, uri_type) {
        (Some(explicit), _) => ContentType::parse(explicit)?,
        (None, Some(media_type)) => ContentType::parse(&media_type)?,
        (None, None) => attachment
            .filename
            .as_deref()
            .and_then(|name| mime_guess::from_path(name).first())
            .map_or_else(
                || ContentType::new("application", "octet-stream"),
                |mime| ContentType::new(mime.type_().as_str(), mime.subtype().as_str()),
            ),
    };

    let encoding = attachment.content_transfer_encoding.unwrap_or_else(|| {
        if content_type.is_message_rfc822() {
            TransferEncoding::EightBit
        } else {
            TransferEncoding::Base64
        }
    });

    let disposition_kind = if attachment.cid.is_some() {
        "inline"
    } else {
        "attachment"
    };
    let disposition = match &attachment.filename {
        Some(name) if name.is_ascii() => {
            content_type.set_parameter("name", name.as_str());
            format!(
                "{disposition_kind}; filename=\"{}\"",
                name.replace('\\', "\\\\").replace('"', "\\\"")
            )
        }
        Some(name) => {
            content_type.set_parameter("name", encode_rfc2047(name, "UTF-8"));
            format!("{disposition_kind}; filename*={}", encode_rfc5987(name))
        }
        None => disposition_kind.to_string(),
    };

    let mut headers = Headers::new();
    headers.add_raw("Content-Type", content_type.to_string());
    headers.add_raw("Content-Transfer-Encoding", encoding.to_string());
    headers.add_raw("Content-Disposition", disposition);
    if let Some(cid) = &attachment.cid {
        headers.add("Content-Id", angle_id(cid))?;
    }

    Ok(Some(Part::leaf(headers, encoding.encode(&content))))
}

/// Decodes `data:[<media type>][;base64],<data>`.
fn parse_data_uri(uri: &str) -> Result<(Option<String>, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| Error::InvalidDataUri("missing data: prefix".to_string()))?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| Error::InvalidDataUri("missing comma".to_string()))?;

    let (media_type, is_base64) = match meta.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (meta, false),
    };
    let media_type = (!media_type.is_empty()).then(|| media_type.to_string());

    let bytes = if is_base64 {
        decode_base64(data)?
    } else {
        percent_decode_str(data).collect()
    };

    Ok((media_type, bytes))
}

/// Node of the MIME tree being serialized.
#[derive(Debug, Clone)]
struct Part {
    headers: Headers,
    body: PartBody,
}

#[derive(Debug, Clone)]
enum PartBody {
    Leaf(Vec<u8>),
    Multipart { boundary: String, parts: Vec<Part> },
}

impl Part {
    const fn leaf(headers: Headers, body: Vec<u8>) -> Self {
        Self {
            headers,
            body: PartBody::Leaf(body),
        }
    }

    fn text(content_type: ContentType, text: &str) -> Self {
        let mut headers = Headers::new();
        headers.add_raw("Content-Type", content_type.to_string());
        headers.add_raw(
            "Content-Transfer-Encoding",
            TransferEncoding::QuotedPrintable.to_string(),
        );
        Self::leaf(headers, encode_quoted_printable(text).into_bytes())
    }

    fn multipart(content_type: ContentType, parts: Vec<Self>) -> Self {
        let boundary = content_type.boundary().unwrap_or_default().to_string();
        let mut headers = Headers::new();
        headers.add_raw("Content-Type", content_type.to_string());
        Self {
            headers,
            body: PartBody::Multipart { boundary, parts },
        }
    }

    fn is_plain_text(&self) -> bool {
        matches!(self.body, PartBody::Leaf(_))
            && self
                .headers
                .get("Content-Type")
                .is_some_and(|ct| ct.starts_with("text/plain"))
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.headers.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        match &self.body {
            PartBody::Leaf(body) => out.extend_from_slice(body),
            PartBody::Multipart { boundary, parts } => {
                for part in parts {
                    out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
                    part.write_to(out);
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(format!("--{boundary}--").as_bytes());
            }
        }
    }
}

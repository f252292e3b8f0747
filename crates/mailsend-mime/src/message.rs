//! MIME message assembly.

use crate::address::{Mailbox, format_mailbox_list};
use crate::content_type::{ContentType, write_param_value};
use crate::encoding::{
    encode_base64_lines, encode_quoted_printable, encode_rfc2047, is_7bit_safe, normalize_crlf,
};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::id::{ContentId, generate_boundary, generate_message_id};
use chrono::{DateTime, Utc};
use std::fmt::{self, Write as _};
use std::path::Path;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
        }
    }
}

/// A file carried in `multipart/mixed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name offered to the recipient.
    pub filename: String,
    /// Content type.
    pub content_type: ContentType,
    /// Raw content.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment from memory.
    #[must_use]
    pub fn new(filename: impl Into<String>, content_type: ContentType, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            data,
        }
    }

    /// Reads an attachment from disk, guessing its type from the extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Ok(Self::new(file_name(path), ContentType::from_path(path), data))
    }
}

/// A resource referenced from the HTML body by `cid:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineResource {
    /// Identifier the HTML refers to.
    pub content_id: ContentId,
    /// File name.
    pub filename: String,
    /// Content type.
    pub content_type: ContentType,
    /// Raw content.
    pub data: Vec<u8>,
}

impl InlineResource {
    /// Reads an inline resource from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>, content_id: ContentId) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Ok(Self {
            content_id,
            filename: file_name(path),
            content_type: ContentType::from_path(path),
            data,
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned())
}

/// A node of the MIME tree.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers, `Content-Type` first.
    pub headers: Headers,
    body: Body,
}

#[derive(Debug, Clone)]
enum Body {
    /// Encoded content without trailing line break.
    Leaf(String),
    Multipart { boundary: String, parts: Vec<Part> },
}

impl Part {
    fn text(content_type: &ContentType, text: &str) -> Result<Self> {
        let text = normalize_crlf(text);
        let (encoding, body) = if is_7bit_safe(&text) {
            (TransferEncoding::SevenBit, text)
        } else {
            (TransferEncoding::QuotedPrintable, encode_quoted_printable(&text))
        };
        Self::leaf(content_type, encoding, body)
    }

    fn binary(content_type: &ContentType, data: &[u8]) -> Result<Self> {
        let mut body = encode_base64_lines(data);
        body.truncate(body.trim_end_matches("\r\n").len());
        Self::leaf(content_type, TransferEncoding::Base64, body)
    }

    fn leaf(content_type: &ContentType, encoding: TransferEncoding, body: String) -> Result<Self> {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string())?;
        headers.add("Content-Transfer-Encoding", encoding.to_string())?;
        Ok(Self {
            headers,
            body: Body::Leaf(body),
        })
    }

    fn multipart(sub_type: &str, parts: Vec<Self>) -> Result<Self> {
        let boundary = generate_boundary();
        let mut headers = Headers::new();
        headers.add(
            "Content-Type",
            ContentType::multipart(sub_type, boundary.as_str()).to_string(),
        )?;
        Ok(Self {
            headers,
            body: Body::Multipart { boundary, parts },
        })
    }

    fn attachment(attachment: &Attachment) -> Result<Self> {
        let mut part = Self::binary(&attachment.content_type, &attachment.data)?;
        part.headers.add(
            "Content-Disposition",
            disposition("attachment", &attachment.filename),
        )?;
        Ok(part)
    }

    fn inline(resource: &InlineResource) -> Result<Self> {
        let mut part = Self::binary(&resource.content_type, &resource.data)?;
        part.headers
            .add("Content-ID", resource.content_id.header_value())?;
        part.headers
            .add("Content-Disposition", disposition("inline", &resource.filename))?;
        Ok(part)
    }

    /// Returns the content type of this part.
    #[must_use]
    pub fn content_type(&self) -> Option<ContentType> {
        self.headers
            .get("Content-Type")
            .and_then(|v| ContentType::parse(v).ok())
    }

    /// Returns the child parts of a multipart node, empty for a leaf.
    #[must_use]
    pub fn parts(&self) -> &[Self] {
        match &self.body {
            Body::Leaf(_) => &[],
            Body::Multipart { parts, .. } => parts,
        }
    }

    /// Returns the encoded body of a leaf, `None` for a multipart node.
    #[must_use]
    pub fn encoded_body(&self) -> Option<&str> {
        match &self.body {
            Body::Leaf(body) => Some(body),
            Body::Multipart { .. } => None,
        }
    }

    fn write_body(&self, out: &mut String) {
        match &self.body {
            Body::Leaf(body) => {
                out.push_str(body);
                out.push_str("\r\n");
            }
            Body::Multipart { boundary, parts } => {
                for part in parts {
                    let _ = write!(out, "--{boundary}\r\n{}\r\n", part.headers);
                    part.write_body(out);
                }
                let _ = write!(out, "--{boundary}--\r\n");
            }
        }
    }
}

/// `Content-Disposition` value; non-ASCII names use RFC 2231 `filename*`.
fn disposition(kind: &str, filename: &str) -> String {
    let mut value = format!("{kind}; ");
    if filename.is_ascii() {
        value.push_str("filename=");
        let _ = write_param_value(&mut value, filename);
    } else {
        value.push_str("filename*=utf-8''");
        for byte in filename.bytes() {
            if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
                value.push(char::from(byte));
            } else {
                let _ = write!(value, "%{byte:02X}");
            }
        }
    }
    value
}

/// A complete message ready for transmission.
#[derive(Debug, Clone)]
pub struct MimeMessage {
    headers: Headers,
    root: Part,
}

impl MimeMessage {
    /// Starts a new message.
    #[must_use]
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    /// Returns the top-level headers, including the root part's
    /// `Content-Type`.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the root of the MIME tree.
    #[must_use]
    pub const fn root(&self) -> &Part {
        &self.root
    }

    /// Serializes the message with CRLF line endings.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for MimeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut body = String::new();
        self.root.write_body(&mut body);
        write!(f, "{}\r\n{body}", self.headers)
    }
}

/// Assembles a [`MimeMessage`].
///
/// The body structure follows from what was supplied:
///
/// - text and HTML become `multipart/alternative`;
/// - inline resources wrap the HTML part (or the whole body when there is no
///   HTML) in `multipart/related`;
/// - attachments wrap everything in `multipart/mixed`;
/// - with no body at all an empty `text/plain` part is sent.
///
/// `Bcc` is not a field here: blind recipients exist only in the envelope.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Vec<Mailbox>,
    sender: Option<Mailbox>,
    reply_to: Vec<Mailbox>,
    to: Vec<Mailbox>,
    cc: Vec<Mailbox>,
    subject: String,
    date: Option<DateTime<Utc>>,
    message_id: Option<String>,
    text: Option<String>,
    html: Option<String>,
    inline: Vec<InlineResource>,
    attachments: Vec<Attachment>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `From` mailbox.
    #[must_use]
    pub fn from(mut self, mailbox: Mailbox) -> Self {
        self.from.push(mailbox);
        self
    }

    /// Sets the `Sender` mailbox.
    #[must_use]
    pub fn sender(mut self, mailbox: Mailbox) -> Self {
        self.sender = Some(mailbox);
        self
    }

    /// Adds a `Reply-To` mailbox.
    #[must_use]
    pub fn reply_to(mut self, mailbox: Mailbox) -> Self {
        self.reply_to.push(mailbox);
        self
    }

    /// Adds a `To` mailbox.
    #[must_use]
    pub fn to(mut self, mailbox: Mailbox) -> Self {
        self.to.push(mailbox);
        self
    }

    /// Adds a `Cc` mailbox.
    #[must_use]
    pub fn cc(mut self, mailbox: Mailbox) -> Self {
        self.cc.push(mailbox);
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Overrides the `Date` header (defaults to now).
    #[must_use]
    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Overrides the `Message-ID` header (defaults to a generated one).
    #[must_use]
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Adds an inline resource.
    #[must_use]
    pub fn inline(mut self, resource: InlineResource) -> Self {
        self.inline.push(resource);
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Builds the message.
    ///
    /// When no `From` mailbox was given the `Sender` is used in its place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] if there is neither a `From` nor a
    /// `Sender` mailbox, or [`Error::InvalidHeader`] if a header value would
    /// break the header block.
    pub fn build(self) -> Result<MimeMessage> {
        let from: Vec<Mailbox> = if self.from.is_empty() {
            self.sender.iter().cloned().collect()
        } else {
            self.from.clone()
        };
        let Some(first_from) = from.first() else {
            return Err(Error::MissingField("From"));
        };

        let mut headers = Headers::new();
        headers.add("Date", self.date.unwrap_or_else(Utc::now).to_rfc2822())?;
        headers.add(
            "Message-ID",
            self.message_id
                .clone()
                .unwrap_or_else(|| generate_message_id(first_from.domain())),
        )?;
        headers.add("From", format_mailbox_list(&from))?;
        if let Some(sender) = self.sender.as_ref().filter(|_| !self.from.is_empty()) {
            headers.add("Sender", sender.to_string())?;
        }
        for (name, list) in [("Reply-To", &self.reply_to), ("To", &self.to), ("Cc", &self.cc)] {
            if !list.is_empty() {
                headers.add(name, format_mailbox_list(list))?;
            }
        }
        headers.add("Subject", encode_rfc2047(&self.subject))?;
        headers.add("MIME-Version", "1.0")?;

        let root = self.assemble()?;
        headers.extend(root.headers.clone());

        Ok(MimeMessage { headers, root })
    }

    fn assemble(self) -> Result<Part> {
        let has_inline = !self.inline.is_empty();
        let related = |main: Part, inline: &[InlineResource]| -> Result<Part> {
            let mut parts = vec![main];
            for resource in inline {
                parts.push(Part::inline(resource)?);
            }
            Part::multipart("related", parts)
        };

        let html = self
            .html
            .as_deref()
            .map(|html| Part::text(&ContentType::text_html(), html))
            .transpose()?;
        let html = match html {
            Some(part) if has_inline => Some(related(part, &self.inline)?),
            other => other,
        };
        let text = self
            .text
            .as_deref()
            .map(|text| Part::text(&ContentType::text_plain(), text))
            .transpose()?;

        let mut body = match (text, html) {
            (Some(text), Some(html)) => Part::multipart("alternative", vec![text, html])?,
            (Some(text), None) => text,
            (None, Some(html)) => html,
            (None, None) => Part::text(&ContentType::text_plain(), "")?,
        };
        if has_inline && self.html.is_none() {
            body = related(body, &self.inline)?;
        }

        if self.attachments.is_empty() {
            return Ok(body);
        }
        let mut parts = vec![body];
        for attachment in &self.attachments {
            parts.push(Part::attachment(attachment)?);
        }
        Part::multipart("mixed", parts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn mailbox(email: &str) -> Mailbox {
        Mailbox::new(email, None).unwrap()
    }

    fn base() -> MessageBuilder {
        MimeMessage::builder()
            .from(mailbox("alice@example.com"))
            .to(mailbox("bob@example.org"))
            .date(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
            .message_id("<fixed@example.com>")
    }

    fn content_types(part: &Part) -> Vec<String> {
        let mut out = vec![part.content_type().unwrap().essence()];
        for child in part.parts() {
            out.extend(content_types(child));
        }
        out
    }

    #[test]
    fn text_only_is_single_part() {
        let message = base().subject("Hi").text_body("Hello\nWorld").build().unwrap();
        let wire = message.to_string();
        assert!(wire.starts_with("Date: Fri, "));
        assert!(wire.contains(" Mar 2024 12:00:00 +0000\r\n"));
        assert!(wire.contains("Message-ID: <fixed@example.com>\r\n"));
        assert!(wire.contains("From: alice@example.com\r\nTo: bob@example.org\r\n"));
        assert!(wire.contains("MIME-Version: 1.0\r\nContent-Type: text/plain; charset=utf-8\r\n"));
        assert!(wire.contains("Content-Transfer-Encoding: 7bit\r\n"));
        assert!(wire.ends_with("\r\n\r\nHello\r\nWorld\r\n"));
    }

    #[test]
    fn empty_body_is_empty_text_part() {
        let message = base().build().unwrap();
        assert_eq!(content_types(message.root()), vec!["text/plain"]);
        assert_eq!(message.root().encoded_body(), Some(""));
        assert_eq!(message.headers().get("Subject"), Some(""));
    }

    #[test]
    fn text_and_html_become_alternative() {
        let message = base().text_body("plain").html_body("<b>rich</b>").build().unwrap();
        assert_eq!(
            content_types(message.root()),
            vec!["multipart/alternative", "text/plain", "text/html"]
        );
    }

    #[test]
    fn full_nesting_order() {
        let cid = ContentId::new("logo@example.com");
        let message = base()
            .text_body("plain")
            .html_body(format!("<img src=\"{}\">", cid.url()))
            .inline(InlineResource {
                content_id: cid,
                filename: "logo.png".into(),
                content_type: ContentType::from_path("logo.png"),
                data: vec![0x89, b'P', b'N', b'G'],
            })
            .attach(Attachment::new("a.pdf", ContentType::from_path("a.pdf"), vec![1, 2, 3]))
            .build()
            .unwrap();

        assert_eq!(
            content_types(message.root()),
            vec![
                "multipart/mixed",
                "multipart/alternative",
                "text/plain",
                "multipart/related",
                "text/html",
                "image/png",
                "application/pdf",
            ]
        );

        let wire = message.to_string();
        assert!(wire.contains("Content-ID: <logo@example.com>\r\n"));
        assert!(wire.contains("Content-Disposition: inline; filename=logo.png\r\n"));
        assert!(wire.contains("Content-Disposition: attachment; filename=a.pdf\r\n\r\nAQID\r\n"));
    }

    #[test]
    fn inline_without_html_wraps_body() {
        let message = base()
            .text_body("see image")
            .inline(InlineResource {
                content_id: ContentId::new("x@y"),
                filename: "x.gif".into(),
                content_type: ContentType::from_path("x.gif"),
                data: vec![0; 4],
            })
            .build()
            .unwrap();
        assert_eq!(
            content_types(message.root()),
            vec!["multipart/related", "text/plain", "image/gif"]
        );
    }

    #[test]
    fn boundaries_delimit_every_part() {
        let message = base().text_body("a").html_body("b").build().unwrap();
        let ct = message.root().content_type().unwrap();
        let boundary = ct.boundary().unwrap();
        let wire = message.to_string();
        assert_eq!(wire.matches(&format!("--{boundary}\r\n")).count(), 2);
        assert!(wire.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn non_ascii_content_is_encoded() {
        let message = base()
            .subject("Grüße")
            .text_body("Grüße")
            .attach(Attachment::new("résumé.txt", ContentType::text_plain(), b"x".to_vec()))
            .build()
            .unwrap();
        let wire = message.to_string();
        assert!(wire.contains("Subject: =?utf-8?B?R3LDvMOfZQ==?=\r\n"));
        assert!(wire.contains("Content-Transfer-Encoding: quoted-printable\r\n\r\nGr=C3=BC=C3=9Fe\r\n"));
        assert!(wire.contains("filename*=utf-8''r%C3%A9sum%C3%A9.txt"));
    }

    #[test]
    fn sender_stands_in_for_missing_from() {
        let message = MimeMessage::builder()
            .sender(mailbox("robot@example.com"))
            .to(mailbox("bob@example.org"))
            .build()
            .unwrap();
        assert_eq!(message.headers().get("From"), Some("robot@example.com"));
        assert_eq!(message.headers().get("Sender"), None);
        assert!(message.headers().get("Message-ID").unwrap().ends_with("@example.com>"));

        let both = base().sender(mailbox("robot@example.com")).build().unwrap();
        assert_eq!(both.headers().get("Sender"), Some("robot@example.com"));
    }

    #[test]
    fn missing_from_is_an_error() {
        let err = MimeMessage::builder().to(mailbox("bob@example.org")).build();
        assert!(matches!(err, Err(Error::MissingField("From"))));
    }

    #[test]
    fn attachment_from_file_reads_and_guesses_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let attachment = Attachment::from_file(&path).unwrap();
        assert_eq!(attachment.filename, "notes.txt");
        assert_eq!(attachment.content_type.essence(), "text/plain");
        assert_eq!(attachment.data, b"hello");

        let missing = Attachment::from_file(dir.path().join("gone.pdf"));
        assert!(matches!(missing, Err(Error::Io { .. })));
    }
}

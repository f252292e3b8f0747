//! Outbound message composition.
//!
//! [`MessageBuilder`] accumulates addresses, bodies, attachments and embedded
//! images in any order. Nothing touches the disk until a body is appended
//! from a file or the message is finalized; attachments and images are read
//! at [`MessageBuilder::finalize`].

use crate::error::{Error, Result};
use mailsend_mime::{
    Attachment, ContentId, InlineResource, Mailbox, MimeMessage, parse_mailbox_list,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Address list of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientKind {
    /// `To` recipients.
    To,
    /// `Cc` recipients.
    Cc,
    /// Blind recipients: envelope only, never written to the headers.
    Bcc,
    /// `Reply-To` addresses.
    ReplyTo,
    /// `From` addresses.
    From,
}

/// Where the reference to an embedded image is placed in the HTML body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Appended to the HTML body when the message is finalized.
    Trailing,
    /// Appended to the HTML body when the image was added.
    Inline,
}

/// An image carried in `multipart/related` and referenced by `cid:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    /// Source file, read at finalize time.
    pub path: PathBuf,
    /// Identifier the HTML refers to.
    pub content_id: ContentId,
    /// Reference placement.
    pub placement: Placement,
}

/// SMTP envelope of a finalized message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// `MAIL FROM` address: the sender, else the first `From` address.
    pub reverse_path: String,
    /// `RCPT TO` addresses: To, then Cc, then Bcc.
    pub forward_paths: Vec<String>,
}

/// A finalized message: envelope plus wire bytes.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    /// Envelope addresses.
    pub envelope: Envelope,
    /// RFC 5322 message with CRLF line endings.
    pub bytes: Vec<u8>,
}

/// Mutable representation of one outbound message.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    sender: Option<Mailbox>,
    from: Vec<Mailbox>,
    to: Vec<Mailbox>,
    cc: Vec<Mailbox>,
    bcc: Vec<Mailbox>,
    reply_to: Vec<Mailbox>,
    subject: String,
    text_body: String,
    html_body: String,
    attachments: Vec<PathBuf>,
    embedded_images: Vec<EmbeddedImage>,
    finalized: bool,
}

impl MessageBuilder {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the envelope sender. An empty string clears it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AddressParse`] if the address is malformed; the
    /// previous sender is kept.
    pub fn set_sender(&mut self, email: &str) -> Result<()> {
        self.sender = if email.trim().is_empty() {
            None
        } else {
            Some(Mailbox::new(email, None)?)
        };
        Ok(())
    }

    /// Returns the envelope sender.
    #[must_use]
    pub const fn sender(&self) -> Option<&Mailbox> {
        self.sender.as_ref()
    }

    /// Replaces the subject.
    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = subject.into();
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Replaces the plain-text body.
    pub fn set_text_body(&mut self, text: impl Into<String>) {
        self.text_body = text.into();
    }

    /// Returns the plain-text body.
    #[must_use]
    pub fn text_body(&self) -> &str {
        &self.text_body
    }

    /// Replaces the HTML body.
    ///
    /// References to [`Placement::Inline`] images are lost with the old
    /// markup; [`Placement::Trailing`] images are still referenced at
    /// finalize time.
    pub fn set_html_body(&mut self, html: impl Into<String>) {
        self.html_body = html.into();
    }

    /// Returns the HTML body.
    #[must_use]
    pub fn html_body(&self) -> &str {
        &self.html_body
    }

    /// Appends to the plain-text body without a separator.
    pub fn append_text(&mut self, text: &str) {
        self.text_body.push_str(text);
    }

    /// Appends to the HTML body without a separator.
    pub fn append_html(&mut self, html: &str) {
        self.html_body.push_str(html);
    }

    /// Appends the contents of a UTF-8 file to the plain-text body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read or is not UTF-8.
    pub fn append_text_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let text = read_text(path.as_ref())?;
        self.text_body.push_str(&text);
        Ok(())
    }

    /// Appends the contents of a UTF-8 file to the HTML body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read or is not UTF-8.
    pub fn append_html_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let html = read_text(path.as_ref())?;
        self.html_body.push_str(&html);
        Ok(())
    }

    /// Appends one address to a list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AddressParse`] if the address is malformed or the
    /// display name contains control characters.
    pub fn add_recipient(&mut self, kind: RecipientKind, email: &str, name: Option<&str>) -> Result<()> {
        if let Some(name) = name.filter(|n| n.chars().any(char::is_control)) {
            return Err(Error::AddressParse(format!(
                "control character in display name {name:?}"
            )));
        }
        let mailbox = Mailbox::new(email, name)?;
        self.list_mut(kind).push(mailbox);
        Ok(())
    }

    /// Appends a `To` recipient.
    ///
    /// # Errors
    ///
    /// See [`MessageBuilder::add_recipient`].
    pub fn add_to(&mut self, email: &str, name: Option<&str>) -> Result<()> {
        self.add_recipient(RecipientKind::To, email, name)
    }

    /// Appends a `Cc` recipient.
    ///
    /// # Errors
    ///
    /// See [`MessageBuilder::add_recipient`].
    pub fn add_cc(&mut self, email: &str, name: Option<&str>) -> Result<()> {
        self.add_recipient(RecipientKind::Cc, email, name)
    }

    /// Appends a blind recipient.
    ///
    /// # Errors
    ///
    /// See [`MessageBuilder::add_recipient`].
    pub fn add_bcc(&mut self, email: &str, name: Option<&str>) -> Result<()> {
        self.add_recipient(RecipientKind::Bcc, email, name)
    }

    /// Appends a `Reply-To` address.
    ///
    /// # Errors
    ///
    /// See [`MessageBuilder::add_recipient`].
    pub fn add_reply_to(&mut self, email: &str, name: Option<&str>) -> Result<()> {
        self.add_recipient(RecipientKind::ReplyTo, email, name)
    }

    /// Appends a `From` address.
    ///
    /// # Errors
    ///
    /// See [`MessageBuilder::add_recipient`].
    pub fn add_from(&mut self, email: &str, name: Option<&str>) -> Result<()> {
        self.add_recipient(RecipientKind::From, email, name)
    }

    /// Replaces a list with a parsed comma-separated address list.
    ///
    /// Commas inside quoted display names, comments and angle brackets do
    /// not split entries. For [`RecipientKind::From`] and
    /// [`RecipientKind::ReplyTo`] only the first address is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AddressParse`] if any entry is malformed; the list is
    /// then left unchanged.
    pub fn set_recipients(&mut self, kind: RecipientKind, list: &str) -> Result<()> {
        let mut parsed = parse_mailbox_list(list)?;
        if matches!(kind, RecipientKind::From | RecipientKind::ReplyTo) && parsed.len() > 1 {
            debug!(?kind, dropped = parsed.len() - 1, "Keeping only the first address");
            parsed.truncate(1);
        }
        *self.list_mut(kind) = parsed;
        Ok(())
    }

    /// Returns one address list.
    #[must_use]
    pub fn recipients(&self, kind: RecipientKind) -> &[Mailbox] {
        match kind {
            RecipientKind::To => &self.to,
            RecipientKind::Cc => &self.cc,
            RecipientKind::Bcc => &self.bcc,
            RecipientKind::ReplyTo => &self.reply_to,
            RecipientKind::From => &self.from,
        }
    }

    /// Empties one address list.
    pub fn clear_recipients(&mut self, kind: RecipientKind) {
        self.list_mut(kind).clear();
    }

    fn list_mut(&mut self, kind: RecipientKind) -> &mut Vec<Mailbox> {
        match kind {
            RecipientKind::To => &mut self.to,
            RecipientKind::Cc => &mut self.cc,
            RecipientKind::Bcc => &mut self.bcc,
            RecipientKind::ReplyTo => &mut self.reply_to,
            RecipientKind::From => &mut self.from,
        }
    }

    /// Queues a file attachment. The file is read at finalize time.
    pub fn add_attachment(&mut self, path: impl Into<PathBuf>) {
        self.attachments.push(path.into());
    }

    /// Returns the queued attachment paths.
    #[must_use]
    pub fn attachments(&self) -> &[PathBuf] {
        &self.attachments
    }

    /// Queues an image whose reference is appended to the HTML body at
    /// finalize time.
    pub fn add_embedded_image(&mut self, path: impl Into<PathBuf>) -> ContentId {
        self.queue_image(path.into(), Placement::Trailing)
    }

    /// Queues an image and appends its reference to the HTML body now.
    pub fn append_embedded_image(&mut self, path: impl Into<PathBuf>) -> ContentId {
        let content_id = self.queue_image(path.into(), Placement::Inline);
        self.html_body.push_str(&image_reference(&content_id));
        content_id
    }

    /// Returns the queued images.
    #[must_use]
    pub fn embedded_images(&self) -> &[EmbeddedImage] {
        &self.embedded_images
    }

    fn queue_image(&mut self, path: PathBuf, placement: Placement) -> ContentId {
        let content_id = ContentId::generate(self.domain());
        self.embedded_images.push(EmbeddedImage {
            path,
            content_id: content_id.clone(),
            placement,
        });
        content_id
    }

    fn domain(&self) -> &str {
        self.sender
            .as_ref()
            .or_else(|| self.from.first())
            .map_or("localhost", Mailbox::domain)
    }

    /// Returns true once [`MessageBuilder::finalize`] has run.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Produces the envelope and wire form of the message.
    ///
    /// Appends one reference per [`Placement::Trailing`] image to the HTML
    /// body, in queue order, then reads attachments and images and
    /// assembles the MIME structure. Each call appends the trailing
    /// references again, so a message is sent at most once.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if there is no sender or `From` address, or
    ///   no recipient at all.
    /// - [`Error::Io`] if an attachment or image cannot be read.
    pub fn finalize(&mut self) -> Result<OutgoingMail> {
        self.finalized = true;

        let trailing: String = self
            .embedded_images
            .iter()
            .filter(|image| image.placement == Placement::Trailing)
            .map(|image| image_reference(&image.content_id))
            .collect();
        self.html_body.push_str(&trailing);

        let envelope = self.envelope()?;

        let mut mime = MimeMessage::builder().subject(single_line(&self.subject));
        if let Some(sender) = &self.sender {
            mime = mime.sender(sender.clone());
        }
        for mailbox in &self.from {
            mime = mime.from(mailbox.clone());
        }
        for mailbox in &self.reply_to {
            mime = mime.reply_to(mailbox.clone());
        }
        for mailbox in &self.to {
            mime = mime.to(mailbox.clone());
        }
        for mailbox in &self.cc {
            mime = mime.cc(mailbox.clone());
        }
        if !self.text_body.is_empty() {
            mime = mime.text_body(self.text_body.as_str());
        }
        if !self.html_body.is_empty() {
            mime = mime.html_body(self.html_body.as_str());
        }
        for image in &self.embedded_images {
            mime = mime.inline(InlineResource::from_file(&image.path, image.content_id.clone())?);
        }
        for path in &self.attachments {
            mime = mime.attach(Attachment::from_file(path)?);
        }

        let bytes = mime.build()?.to_bytes();
        debug!(
            recipients = envelope.forward_paths.len(),
            attachments = self.attachments.len(),
            images = self.embedded_images.len(),
            size = bytes.len(),
            "Message finalized"
        );
        Ok(OutgoingMail { envelope, bytes })
    }

    fn envelope(&self) -> Result<Envelope> {
        let reverse_path = self
            .sender
            .as_ref()
            .or_else(|| self.from.first())
            .map(|mailbox| mailbox.email.clone())
            .ok_or_else(|| Error::InvalidState("no sender or From address set".into()))?;

        let forward_paths: Vec<String> = self
            .to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(|mailbox| mailbox.email.clone())
            .collect();
        if forward_paths.is_empty() {
            return Err(Error::InvalidState("no recipients".into()));
        }

        Ok(Envelope {
            reverse_path,
            forward_paths,
        })
    }
}

fn image_reference(content_id: &ContentId) -> String {
    format!("<img src=\"{}\">", content_id.url())
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Header text cannot carry line breaks; fold them into spaces.
fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

//! Caller-facing facade: one message, one configuration, one send.

use crate::config::TransportConfig;
use crate::dispatch::{Dispatcher, SendResult};
use crate::error::{Error, Result};
use crate::message::{MessageBuilder, RecipientKind};
use crate::options::{LegacyOptions, ingest};
use crate::transport::{SmtpTransport, Transport};
use std::ops::{Deref, DerefMut};
use tracing::error;

/// Composes one message and sends it once.
///
/// Message mutators are reached through `Deref` to [`MessageBuilder`]:
///
/// ```no_run
/// use mailsend::{Mailer, TransportConfig};
///
/// # fn main() -> mailsend::Result<()> {
/// let mut mailer = Mailer::new(TransportConfig::new("smtp.example.com"));
/// mailer.add_from("app@example.com", Some("App"))?;
/// mailer.add_to("user@example.org", None)?;
/// mailer.set_subject("Hello");
/// mailer.set_text_body("Hi there");
///
/// let result = mailer.send();
/// if let Some(diagnostic) = result.diagnostic() {
///     eprintln!("{diagnostic}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Mailer {
    message: MessageBuilder,
    config: TransportConfig,
    sent: bool,
}

impl Mailer {
    /// Creates a mailer with an empty message.
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        Self {
            message: MessageBuilder::new(),
            config,
            sent: false,
        }
    }

    /// Creates a mailer from a legacy key/value bag.
    ///
    /// `from` and `reply-to` fields prefill the message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the bag is missing or invalid, or
    /// [`Error::AddressParse`] if its `from` or `reply-to` cannot be parsed.
    pub fn from_legacy_options(options: Option<&LegacyOptions>) -> Result<Self> {
        let settings = ingest(options)?;
        let mut mailer = Self::new(settings.config.build());
        if let Some(from) = settings.from.as_deref() {
            mailer.message.set_recipients(RecipientKind::From, from)?;
        }
        if let Some(reply_to) = settings.reply_to.as_deref() {
            mailer.message.set_recipients(RecipientKind::ReplyTo, reply_to)?;
        }
        Ok(mailer)
    }

    /// Returns the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns the message.
    #[must_use]
    pub const fn message(&self) -> &MessageBuilder {
        &self.message
    }

    /// Returns true once a send was attempted.
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        self.sent
    }

    /// Sends the message, blocking the calling thread.
    ///
    /// Builds a single-threaded runtime for the exchange. Inside an async
    /// context this fails with [`Error::InvalidState`] and the mailer stays
    /// unsent; use [`send_async`](Self::send_async) there.
    pub fn send(&mut self) -> SendResult {
        if tokio::runtime::Handle::try_current().is_ok() {
            return self.fail(Error::InvalidState(
                "blocking send called inside an async runtime; use send_async".into(),
            ));
        }
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                return self.fail(Error::Connection(format!("cannot start I/O runtime: {e}")));
            }
        };
        runtime.block_on(self.send_async())
    }

    /// Sends the message over SMTP.
    pub async fn send_async(&mut self) -> SendResult {
        let transport = SmtpTransport::from_config(&self.config);
        self.send_with(transport).await
    }

    /// Sends the message over a caller-supplied transport.
    pub async fn send_with<T: Transport>(&mut self, transport: T) -> SendResult {
        if self.sent {
            return self.fail(Error::InvalidState(
                "mailer already sent its message".into(),
            ));
        }
        self.sent = true;

        let mut dispatcher = Dispatcher::new(self.config.clone(), transport);
        let result = dispatcher.send(&mut self.message).await;
        if let Some(e) = result.error() {
            error!(host = %self.config.host, kind = ?e.kind(), error = %e, "Failed to send message");
        }
        result
    }

    fn fail(&self, e: Error) -> SendResult {
        error!(host = %self.config.host, kind = ?e.kind(), error = %e, "Failed to send message");
        SendResult::failure(e)
    }
}

impl Deref for Mailer {
    type Target = MessageBuilder;

    fn deref(&self) -> &Self::Target {
        &self.message
    }
}

impl DerefMut for Mailer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.message
    }
}

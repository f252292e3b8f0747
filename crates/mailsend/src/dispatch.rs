//! Delivery state machine.
//!
//! ```text
//! Idle ──→ Connected ──→ Secured ──→ Authenticated ──→ Sent
//!   │          │            │   └──────────────────────↗
//!   └──────────┴────────────┴──────────────┴──────→ Failed
//! ```
//!
//! Authentication is skipped unless both user name and password are set.
//! Once a connection is attempted, the transport is closed exactly once
//! whatever the outcome, even when the connect step itself fails.

use crate::config::TransportConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::message::MessageBuilder;
use crate::transport::{SmtpTransport, Transport};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// State of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Nothing attempted yet.
    Idle,
    /// Connection open.
    Connected,
    /// Greeting read and the security plan applied.
    Secured,
    /// Credentials accepted.
    Authenticated,
    /// Message accepted by the server.
    Sent,
    /// A step failed.
    Failed,
}

impl DeliveryState {
    /// Returns true for `Sent` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

/// Outcome of a send: success, or the error that stopped it.
#[derive(Debug)]
#[must_use]
pub struct SendResult {
    error: Option<Error>,
}

impl SendResult {
    /// A successful send.
    pub const fn success() -> Self {
        Self { error: None }
    }

    /// A failed send.
    pub const fn failure(error: Error) -> Self {
        Self { error: Some(error) }
    }

    /// Returns true if the server accepted the message.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the error of a failed send.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Returns the failed taxonomy member.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(Error::kind)
    }

    /// Returns the diagnostic message of a failed send.
    #[must_use]
    pub fn diagnostic(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Converts into a `Result` for use with `?`.
    ///
    /// # Errors
    ///
    /// Returns the error of a failed send.
    pub fn into_result(self) -> Result<()> {
        self.error.map_or(Ok(()), Err)
    }
}

impl From<Result<()>> for SendResult {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::success(),
            Err(e) => Self::failure(e),
        }
    }
}

impl From<SendResult> for bool {
    fn from(result: SendResult) -> Self {
        result.is_success()
    }
}

/// Runs the connect, secure, authenticate, submit and close sequence.
#[derive(Debug)]
pub struct Dispatcher<T> {
    config: TransportConfig,
    transport: T,
    state: DeliveryState,
    history: Vec<DeliveryState>,
}

impl Dispatcher<SmtpTransport> {
    /// Creates a dispatcher that speaks SMTP.
    #[must_use]
    pub fn smtp(config: TransportConfig) -> Self {
        let transport = SmtpTransport::from_config(&config);
        Self::new(config, transport)
    }
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a dispatcher over a custom transport.
    #[must_use]
    pub fn new(config: TransportConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            state: DeliveryState::Idle,
            history: vec![DeliveryState::Idle],
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> DeliveryState {
        self.state
    }

    /// Returns every state of the last attempt, starting with `Idle`.
    #[must_use]
    pub fn history(&self) -> &[DeliveryState] {
        &self.history
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Consumes the dispatcher, returning the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Finalizes `message` and delivers it.
    ///
    /// A message that was already finalized is refused with
    /// [`Error::InvalidState`], since finalizing again would duplicate its
    /// trailing image references. No step is retried.
    pub async fn send(&mut self, message: &mut MessageBuilder) -> SendResult {
        self.state = DeliveryState::Idle;
        self.history.clear();
        self.history.push(DeliveryState::Idle);

        let result = self.run(message).await;
        match &result {
            Ok(()) => self.enter(DeliveryState::Sent),
            Err(e) => {
                debug!(error = %e, "Delivery failed");
                self.enter(DeliveryState::Failed);
            }
        }
        result.into()
    }

    async fn run(&mut self, message: &mut MessageBuilder) -> Result<()> {
        if message.is_finalized() {
            return Err(Error::InvalidState(
                "message was already finalized; build a new message to send again".into(),
            ));
        }
        self.config.validate()?;
        if self.config.has_partial_credentials() {
            warn!(
                host = %self.config.host,
                "Only one of user name and password is set; sending without authentication"
            );
        }

        let connected = timed(
            self.config.connect_timeout,
            self.transport.connect(&self.config.host, self.config.port),
            Error::Connection,
        )
        .await;
        let result = match connected {
            Ok(()) => {
                self.enter(DeliveryState::Connected);
                self.session(message).await
            }
            Err(e) => Err(e),
        };

        if tokio::time::timeout(self.config.io_timeout, self.transport.close())
            .await
            .is_err()
        {
            debug!("Closing the connection timed out");
        }
        result
    }

    async fn session(&mut self, message: &mut MessageBuilder) -> Result<()> {
        let io_timeout = self.config.io_timeout;

        let plan = self.config.security_plan();
        let tls = self.config.tls_options();
        timed(io_timeout, self.transport.secure(plan, &tls), Error::Connection).await?;
        self.enter(DeliveryState::Secured);

        let authenticated = if let Some((username, password)) = self.config.credentials() {
            timed(
                io_timeout,
                self.transport.authenticate(username, password),
                Error::Authentication,
            )
            .await?;
            true
        } else {
            debug!("No credentials, submitting anonymously");
            false
        };
        if authenticated {
            self.enter(DeliveryState::Authenticated);
        }

        let mail = message.finalize()?;
        timed(
            io_timeout,
            self.transport.submit(&mail.envelope, &mail.bytes),
            |message| Error::Submission {
                code: None,
                message,
            },
        )
        .await
    }

    fn enter(&mut self, state: DeliveryState) {
        debug!(from = ?self.state, to = ?state, host = %self.config.host, "Delivery state changed");
        self.state = state;
        self.history.push(state);
    }
}

/// Runs one step under `limit`, turning a timeout into `on_timeout`.
async fn timed(
    limit: Duration,
    step: impl Future<Output = Result<()>>,
    on_timeout: impl FnOnce(String) -> Error,
) -> Result<()> {
    tokio::time::timeout(limit, step)
        .await
        .map_err(|_| on_timeout(format!("timed out after {}s", limit.as_secs_f32())))?
}

//! Type-state SMTP client.

use super::tls::TlsOptions;
use super::{ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::marker::PhantomData;

/// Type-state marker: greeted, no transaction open.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker: authenticated, no transaction open.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker: `MAIL FROM` accepted.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker: at least one `RCPT TO` accepted.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker: `DATA` accepted, message content expected.
#[derive(Debug)]
pub struct Data;

/// States from which a mail transaction may be started.
pub trait ReadyForMail: sealed::Sealed {}
impl ReadyForMail for Connected {}
impl ReadyForMail for Authenticated {}

/// States inside an open mail transaction, which RSET abandons.
pub trait InTransaction: sealed::Sealed {}
impl InTransaction for MailTransaction {}
impl InTransaction for RecipientAdded {}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Connected {}
    impl Sealed for super::Authenticated {}
    impl Sealed for super::MailTransaction {}
    impl Sealed for super::RecipientAdded {}
}

/// A failed command together with the session, left in the state the server
/// is in after the failure.
///
/// The session can still be reset or closed with QUIT. Converts into
/// [`Error`] for use with `?`.
#[derive(Debug)]
pub struct Rejected<S> {
    /// Why the command failed.
    pub error: Error,
    /// The session after the failure.
    pub client: Client<S>,
}

impl<S> Rejected<S> {
    const fn new(error: Error, client: Client<S>) -> Self {
        Self { error, client }
    }
}

impl<S> fmt::Display for Rejected<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<S: fmt::Debug> std::error::Error for Rejected<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<S> From<Rejected<S>> for Error {
    fn from(rejected: Rejected<S>) -> Self {
        rejected.error
    }
}

/// Outcome of a command that moves the session from state `S` to `T`.
pub type Step<T, S> = std::result::Result<Client<T>, Rejected<S>>;

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

/// Connection trait for all states.
pub trait SmtpConnection {
    /// Returns the server information.
    fn server_info(&self) -> &ServerInfo;
}

impl<S> SmtpConnection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server refuses
    /// service (e.g. `554 No SMTP service here`).
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = Self::read_reply(&mut stream)
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;

        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        tracing::debug!(server = %hostname, "greeting received");

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: std::collections::HashSet::new(),
            },
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// Falls back to HELO when the server rejects EHLO with a permanent
    /// error, in which case no extensions are known.
    ///
    /// # Errors
    ///
    /// Returns the rejection if both greetings fail.
    pub async fn ehlo(mut self, client_hostname: &str) -> Step<Connected, Connected> {
        let reply = match self
            .send_command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await
        {
            Ok(reply) => reply,
            Err(e) => return Err(Rejected::new(e, self)),
        };

        if reply.is_success() {
            self.server_info.set_extensions(reply.message.iter().skip(1));
            return Ok(self);
        }

        if !reply.code.is_permanent() {
            return Err(Rejected::new(reply.into_error(), self));
        }

        tracing::debug!(code = %reply.code, "EHLO rejected, falling back to HELO");
        let helo = Command::Helo {
            hostname: client_hostname.to_string(),
        };
        if let Err(e) = self.command(helo, Reply::expect_success).await {
            return Err(Rejected::new(e, self));
        }
        self.server_info.extensions.clear();
        Ok(self)
    }

    /// Upgrades the connection with STARTTLS and repeats EHLO.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if STARTTLS is not advertised,
    /// [`Error::Handshake`] if the handshake fails, or the server's reply.
    pub async fn starttls(
        mut self,
        client_hostname: &str,
        server_hostname: &str,
        options: &TlsOptions,
    ) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        self.send_command(Command::StartTls).await?.expect_success()?;
        self.stream = self.stream.upgrade_to_tls(server_hostname, options).await?;

        // RFC 3207: forget everything learned before the upgrade.
        Ok(self.ehlo(client_hostname).await?)
    }

    /// Authenticates with the best password mechanism the server offers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if the server offers neither PLAIN nor
    /// LOGIN, or the server's rejection (typically 535).
    pub async fn login(self, username: &str, password: &str) -> Step<Authenticated, Connected> {
        match self.server_info.preferred_password_mechanism() {
            Some(AuthMechanism::Login) => self.auth_login(username, password).await,
            Some(_) => self.auth_plain(username, password).await,
            None => Err(Rejected::new(
                Error::NotSupported("a password authentication mechanism (PLAIN or LOGIN)".into()),
                self,
            )),
        }
    }

    /// Authenticates using PLAIN with an initial response.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(mut self, username: &str, password: &str) -> Step<Authenticated, Connected> {
        let credentials = format!("\0{username}\0{password}");
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(STANDARD.encode(credentials.as_bytes())),
        };

        if let Err(e) = self.command(cmd, auth_succeeded).await {
            return Err(Rejected::new(e, self));
        }
        tracing::debug!(mechanism = "PLAIN", "authenticated");
        Ok(self.transition())
    }

    /// Authenticates using LOGIN (username and password challenges).
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_login(mut self, username: &str, password: &str) -> Step<Authenticated, Connected> {
        if let Err(e) = self.login_exchange(username, password).await {
            return Err(Rejected::new(e, self));
        }
        tracing::debug!(mechanism = "LOGIN", "authenticated");
        Ok(self.transition())
    }

    async fn login_exchange(&mut self, username: &str, password: &str) -> Result<Reply> {
        let start = Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        };
        self.command(start, auth_continue).await?;
        self.command(Command::AuthResponse(STANDARD.encode(username)), auth_continue)
            .await?;
        self.command(Command::AuthResponse(STANDARD.encode(password)), auth_succeeded)
            .await
    }
}

impl<S: ReadyForMail> Client<S> {
    /// Starts a mail transaction.
    ///
    /// `size` is announced only when the server advertises SIZE; a message
    /// larger than the advertised limit is refused before anything is sent.
    /// `BODY=8BITMIME` is announced whenever the server supports it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] or the server's rejection.
    pub async fn mail_from(mut self, from: Address, size: Option<usize>) -> Step<MailTransaction, S> {
        let limit = self.server_info.max_message_size();
        if let (Some(size), Some(limit)) = (size, limit) {
            if size > limit {
                return Err(Rejected::new(Error::MessageTooLarge { size, limit }, self));
            }
        }

        let cmd = Command::MailFrom {
            from,
            body: self.server_info.supports_8bitmime().then_some("8BITMIME"),
            size: size.filter(|_| limit.is_some()),
        };
        if let Err(e) = self.command(cmd, Reply::expect_success).await {
            return Err(Rejected::new(e, self));
        }
        Ok(self.transition())
    }
}

impl<S: InTransaction> Client<S> {
    /// Aborts the transaction. An authenticated session stays
    /// authenticated on the server even though the client returns to
    /// [`Connected`].
    ///
    /// # Errors
    ///
    /// Returns the rejection if the RSET command fails.
    pub async fn reset(mut self) -> Step<Connected, S> {
        if let Err(e) = self.command(Command::Rset, Reply::expect_success).await {
            return Err(Rejected::new(e, self));
        }
        Ok(self.transition())
    }
}

impl Client<MailTransaction> {
    /// Adds the first recipient.
    ///
    /// # Errors
    ///
    /// Returns the server's rejection.
    pub async fn rcpt_to(mut self, to: Address) -> Step<RecipientAdded, MailTransaction> {
        if let Err(e) = self.command(Command::RcptTo { to }, Reply::expect_success).await {
            return Err(Rejected::new(e, self));
        }
        Ok(self.transition())
    }
}

impl Client<RecipientAdded> {
    /// Adds another recipient.
    ///
    /// # Errors
    ///
    /// Returns the server's rejection.
    pub async fn rcpt_to(mut self, to: Address) -> Step<RecipientAdded, RecipientAdded> {
        if let Err(e) = self.command(Command::RcptTo { to }, Reply::expect_success).await {
            return Err(Rejected::new(e, self));
        }
        Ok(self)
    }

    /// Sends DATA and waits for the 354 go-ahead.
    ///
    /// # Errors
    ///
    /// Returns the server's rejection.
    pub async fn data(mut self) -> Step<Data, RecipientAdded> {
        if let Err(e) = self.command(Command::Data, start_data).await {
            return Err(Rejected::new(e, self));
        }
        Ok(self.transition())
    }
}

impl Client<Data> {
    /// Sends the message content and completes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// dot-stuffed, and the terminating `.` line is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or the server rejects the message.
    /// Either way the transaction is over, so the session comes back as
    /// [`Connected`].
    pub async fn send_message(mut self, message: &[u8]) -> Step<Connected, Connected> {
        match self.transmit(&encode_data(message)).await {
            Ok(reply) => {
                tracing::debug!(reply = %reply.message_text(), "message accepted");
                Ok(self.transition())
            }
            Err(e) => Err(Rejected::new(e, self.transition())),
        }
    }

    async fn transmit(&mut self, payload: &[u8]) -> Result<Reply> {
        self.stream.write_all(payload).await?;
        Self::read_reply(&mut self.stream).await?.expect_success()
    }
}

// Common implementation for all states
impl<S> Client<S> {
    fn transition<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            _state: PhantomData,
        }
    }

    /// Sends a command and checks its reply.
    async fn command(&mut self, cmd: Command, check: fn(Reply) -> Result<Reply>) -> Result<Reply> {
        check(self.send_command(cmd).await?)
    }

    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        let data = cmd.serialize();
        if cmd.is_sensitive() {
            self.stream.write_sensitive(&data).await?;
        } else {
            self.stream.write_all(&data).await?;
        }
        Self::read_reply(&mut self.stream).await
    }

    async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = stream.read_line().await?;
            if line.is_empty() {
                continue;
            }

            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
        }

        parse_reply(&lines)
    }

    /// Returns true once the session is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT exchange fails; the stream is shut down
    /// either way.
    pub async fn quit(mut self) -> Result<()> {
        let result = self.send_command(Command::Quit).await;
        self.stream.shutdown().await;

        let reply = result?;
        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(reply.into_error());
        }
        Ok(())
    }
}

fn auth_continue(reply: Reply) -> Result<Reply> {
    reply.expect_code(ReplyCode::AUTH_CONTINUE)
}

fn auth_succeeded(reply: Reply) -> Result<Reply> {
    reply.expect_code(ReplyCode::AUTH_SUCCEEDED)
}

fn start_data(reply: Reply) -> Result<Reply> {
    reply.expect_code(ReplyCode::START_DATA)
}

/// Normalizes line endings to CRLF, dot-stuffs, and appends `.\r\n`.
fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 64);
    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);

    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}

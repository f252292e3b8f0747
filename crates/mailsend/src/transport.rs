//! Transport seam between the dispatcher and the wire.

use crate::config::{SecurityPlan, TransportConfig};
use crate::error::{Error, Result};
use crate::message::Envelope;
use mailsend_smtp::connection::connect;
use mailsend_smtp::{
    Address, Authenticated, Client, Connected, InTransaction, MailTransaction, ProtocolTrace,
    ReadyForMail, RecipientAdded, Rejected, SmtpConnection, SmtpStream, TlsOptions,
};
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Operations the dispatcher performs against a mail server.
///
/// Errors must already be mapped into the crate taxonomy: connect and
/// greeting failures as [`Error::Connection`], TLS failures as
/// [`Error::Security`], rejected credentials as [`Error::Authentication`]
/// and rejected submissions as [`Error::Submission`].
pub trait Transport {
    /// Opens the connection.
    fn connect(&mut self, host: &str, port: u16) -> impl Future<Output = Result<()>> + Send;

    /// Reads the greeting, identifies the client and applies `plan`.
    fn secure(
        &mut self,
        plan: SecurityPlan,
        tls: &TlsOptions,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Authenticates the session.
    fn authenticate(
        &mut self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Submits one message.
    fn submit(
        &mut self,
        envelope: &Envelope,
        message: &[u8],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Ends the session and releases the connection. Never fails.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

#[derive(Debug)]
enum Session {
    /// TCP (or implicit TLS) stream before the greeting.
    Stream(SmtpStream),
    Connected(Client<Connected>),
    Authenticated(Client<Authenticated>),
    /// Left mid-transaction by a failure that RSET could not undo.
    Transaction(Client<MailTransaction>),
    Recipients(Client<RecipientAdded>),
}

impl From<Client<Connected>> for Session {
    fn from(client: Client<Connected>) -> Self {
        Self::Connected(client)
    }
}

impl From<Client<Authenticated>> for Session {
    fn from(client: Client<Authenticated>) -> Self {
        Self::Authenticated(client)
    }
}

impl From<Client<MailTransaction>> for Session {
    fn from(client: Client<MailTransaction>) -> Self {
        Self::Transaction(client)
    }
}

impl From<Client<RecipientAdded>> for Session {
    fn from(client: Client<RecipientAdded>) -> Self {
        Self::Recipients(client)
    }
}

/// [`Transport`] speaking SMTP through `mailsend-smtp`.
///
/// A failed step leaves the session in place, so [`Transport::close`] still
/// sends QUIT.
#[derive(Debug)]
pub struct SmtpTransport {
    client_hostname: String,
    trace_path: Option<PathBuf>,
    host: String,
    session: Option<Session>,
}

impl SmtpTransport {
    /// Creates a transport that identifies itself as `client_hostname`.
    #[must_use]
    pub fn new(client_hostname: impl Into<String>) -> Self {
        Self {
            client_hostname: client_hostname.into(),
            trace_path: None,
            host: String::new(),
            session: None,
        }
    }

    /// Creates a transport from the relevant parts of a configuration.
    #[must_use]
    pub fn from_config(config: &TransportConfig) -> Self {
        let mut transport = Self::new(config.client_hostname.as_str());
        transport.trace_path.clone_from(&config.trace_path);
        transport
    }

    /// Mirrors the exchange of the next connection to a file.
    #[must_use]
    pub fn with_trace_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace_path = Some(path.into());
        self
    }

    fn take_session(&mut self) -> Result<Session> {
        self.session
            .take()
            .ok_or_else(|| Error::Connection("not connected".into()))
    }

    /// Reads the greeting and sends EHLO. A refused EHLO keeps the session
    /// for QUIT.
    async fn greet(&mut self, stream: SmtpStream) -> Result<Client<Connected>> {
        let client = Client::from_stream(stream)
            .await
            .map_err(|e| Error::Connection(format!("greeting failed: {e}")))?;
        match client.ehlo(&self.client_hostname).await {
            Ok(client) => Ok(client),
            Err(rejected) => {
                self.session = Some(rejected.client.into());
                Err(Error::Connection(format!("EHLO failed: {}", rejected.error)))
            }
        }
    }
}

impl Transport for SmtpTransport {
    async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        let mut stream = connect(host, port)
            .await
            .map_err(|e| Error::Connection(format!("{host}:{port}: {e}")))?;

        if let Some(path) = &self.trace_path {
            match ProtocolTrace::create(path) {
                Ok(trace) => stream = stream.with_trace(trace),
                Err(e) => warn!(path = %path.display(), error = %e, "Cannot create protocol trace"),
            }
        }

        self.host = host.to_string();
        self.session = Some(Session::Stream(stream));
        Ok(())
    }

    async fn secure(&mut self, plan: SecurityPlan, tls: &TlsOptions) -> Result<()> {
        let stream = match self.take_session()? {
            Session::Stream(stream) => stream,
            other => {
                self.session = Some(other);
                return Err(Error::InvalidState("session already secured".into()));
            }
        };

        let client = match plan {
            SecurityPlan::Plaintext => self.greet(stream).await?,
            SecurityPlan::ImplicitTls => {
                let stream = stream
                    .upgrade_to_tls(&self.host, tls)
                    .await
                    .map_err(|e| Error::Security(e.to_string()))?;
                self.greet(stream).await?
            }
            SecurityPlan::StartTls { required } => {
                let client = self.greet(stream).await?;
                if client.server_info().supports_starttls() {
                    client
                        .starttls(&self.client_hostname, &self.host, tls)
                        .await
                        .map_err(|e| Error::Security(format!("STARTTLS failed: {e}")))?
                } else if required {
                    self.session = Some(client.into());
                    return Err(Error::Security(
                        "server does not offer STARTTLS".into(),
                    ));
                } else {
                    debug!(host = %self.host, "STARTTLS not offered, continuing in plaintext");
                    client
                }
            }
        };

        debug!(host = %self.host, tls = client.is_tls(), "Session ready");
        self.session = Some(client.into());
        Ok(())
    }

    async fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        let client = match self.take_session()? {
            Session::Connected(client) => client,
            other => {
                self.session = Some(other);
                return Err(Error::InvalidState("session not ready for authentication".into()));
            }
        };
        match client.login(username, password).await {
            Ok(client) => {
                self.session = Some(client.into());
                Ok(())
            }
            Err(rejected) => {
                self.session = Some(rejected.client.into());
                Err(Error::Authentication(rejected.error.to_string()))
            }
        }
    }

    async fn submit(&mut self, envelope: &Envelope, message: &[u8]) -> Result<()> {
        let result = match self.take_session()? {
            Session::Connected(client) => send_mail(client, envelope, message).await,
            Session::Authenticated(client) => send_mail(client, envelope, message).await,
            other => {
                self.session = Some(other);
                return Err(Error::InvalidState("session not ready for mail".into()));
            }
        };
        match result {
            Ok(client) => {
                self.session = Some(client.into());
                Ok(())
            }
            Err((e, session)) => {
                self.session = Some(session);
                Err(e)
            }
        }
    }

    async fn close(&mut self) {
        let result = match self.session.take() {
            Some(Session::Stream(mut stream)) => {
                stream.shutdown().await;
                Ok(())
            }
            Some(Session::Connected(client)) => client.quit().await,
            Some(Session::Authenticated(client)) => client.quit().await,
            Some(Session::Transaction(client)) => client.quit().await,
            Some(Session::Recipients(client)) => client.quit().await,
            None => Ok(()),
        };
        if let Err(e) = result {
            debug!(error = %e, "QUIT failed");
        }
    }
}

/// Runs one mail transaction. On failure the session comes back with the
/// error, reset to [`Connected`] where RSET succeeds.
async fn send_mail<S: ReadyForMail>(
    client: Client<S>,
    envelope: &Envelope,
    message: &[u8],
) -> std::result::Result<Client<Connected>, (Error, Session)>
where
    Session: From<Client<S>>,
{
    let (from, recipients) = match envelope_addresses(envelope) {
        Ok(addresses) => addresses,
        Err(e) => return Err((e, client.into())),
    };

    let client = match client.mail_from(from, Some(message.len())).await {
        Ok(client) => client,
        Err(rejected) => return Err((submission_error(rejected.error), rejected.client.into())),
    };

    let mut recipients = recipients.into_iter();
    let mut client = match recipients.next() {
        Some(first) => match client.rcpt_to(first).await {
            Ok(client) => client,
            Err(rejected) => return Err(abandon::<MailTransaction>(rejected).await),
        },
        None => {
            return Err((Error::InvalidState("no recipients".into()), client.into()));
        }
    };
    for to in recipients {
        client = match client.rcpt_to(to).await {
            Ok(client) => client,
            Err(rejected) => return Err(abandon::<RecipientAdded>(rejected).await),
        };
    }

    let client = match client.data().await {
        Ok(client) => client,
        Err(rejected) => return Err(abandon::<RecipientAdded>(rejected).await),
    };
    match client.send_message(message).await {
        Ok(client) => Ok(client),
        Err(rejected) => Err((submission_error(rejected.error), rejected.client.into())),
    }
}

/// Sends RSET after a refused recipient or DATA so the session can still
/// be closed cleanly.
async fn abandon<S: InTransaction>(rejected: Rejected<S>) -> (Error, Session)
where
    Session: From<Client<S>>,
{
    let error = submission_error(rejected.error);
    let session = match rejected.client.reset().await {
        Ok(client) => client.into(),
        Err(failed) => {
            debug!(error = %failed.error, "RSET failed");
            failed.client.into()
        }
    };
    (error, session)
}

fn envelope_addresses(envelope: &Envelope) -> Result<(Address, Vec<Address>)> {
    let from = Address::new(envelope.reverse_path.as_str()).map_err(submission_error)?;
    let recipients = envelope
        .forward_paths
        .iter()
        .map(|to| Address::new(to.as_str()).map_err(submission_error))
        .collect::<Result<Vec<_>>>()?;
    Ok((from, recipients))
}

fn submission_error(err: mailsend_smtp::Error) -> Error {
    match err {
        mailsend_smtp::Error::SmtpError { code, message } => Error::Submission {
            code: Some(code),
            message,
        },
        mailsend_smtp::Error::Io(_) | mailsend_smtp::Error::ConnectionClosed => {
            Error::Connection(err.to_string())
        }
        other => Error::Submission {
            code: None,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn reply_errors_keep_the_code() {
        let err = submission_error(mailsend_smtp::Error::smtp_error(550, "Relaying denied"));
        assert!(matches!(
            err,
            Error::Submission { code: Some(550), ref message } if message == "Relaying denied"
        ));
    }

    #[test]
    fn lost_connection_is_not_a_rejection() {
        let err = submission_error(mailsend_smtp::Error::ConnectionClosed);
        assert_eq!(err.kind(), ErrorKind::Connection);

        let too_large = submission_error(mailsend_smtp::Error::MessageTooLarge {
            size: 10,
            limit: 5,
        });
        assert!(matches!(too_large, Error::Submission { code: None, .. }));
    }

    #[tokio::test]
    async fn operations_need_a_connection() {
        let mut transport = SmtpTransport::new("client.example.com");
        let err = transport
            .secure(SecurityPlan::Plaintext, &TlsOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        transport.close().await;
    }
}

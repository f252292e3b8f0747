//! Low-level SMTP stream handling.

use super::tls::{TlsOptions, server_name};
use super::trace::ProtocolTrace;
use crate::error::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Longest reply line accepted, terminator included. RFC 5321 allows 512
/// octets; servers with long EHLO keywords exceed that in practice.
pub const MAX_LINE_LENGTH: usize = 4096;

#[derive(Debug)]
enum Transport {
    Tcp(BufReader<TcpStream>),
    Tls(Box<BufReader<tokio_rustls::client::TlsStream<TcpStream>>>),
}

/// SMTP stream (TCP or TLS) with an optional protocol trace.
#[derive(Debug)]
pub struct SmtpStream {
    transport: Transport,
    trace: Option<ProtocolTrace>,
}

impl SmtpStream {
    fn new(transport: Transport) -> Self {
        Self {
            transport,
            trace: None,
        }
    }

    /// Attaches a protocol trace that records all further traffic.
    #[must_use]
    pub fn with_trace(mut self, trace: ProtocolTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Returns true once the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self.transport, Transport::Tls(_))
    }

    /// Reads one line, without its line terminator.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails, the server closed the
    /// connection, or the line exceeds [`MAX_LINE_LENGTH`].
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let limit = MAX_LINE_LENGTH as u64;
        let n = match &mut self.transport {
            Transport::Tcp(reader) => reader.take(limit).read_line(&mut line).await?,
            Transport::Tls(reader) => reader.as_mut().take(limit).read_line(&mut line).await?,
        };
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        if !line.ends_with('\n') && n >= MAX_LINE_LENGTH {
            return Err(Error::Protocol(format!(
                "reply line longer than {MAX_LINE_LENGTH} bytes"
            )));
        }

        let line = line.trim_end_matches(['\r', '\n']).to_string();
        if let Some(trace) = &mut self.trace {
            trace.server(&line);
        }
        Ok(line)
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if let Some(trace) = &mut self.trace {
            trace.client(data);
        }
        self.write_untraced(data).await
    }

    /// Writes a line carrying credentials; the trace only sees a placeholder.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_sensitive(&mut self, data: &[u8]) -> Result<()> {
        if let Some(trace) = &mut self.trace {
            trace.client_redacted();
        }
        self.write_untraced(data).await
    }

    async fn write_untraced(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.transport {
            Transport::Tcp(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Transport::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
        }
        Ok(())
    }

    /// Upgrades a TCP stream to TLS, keeping the trace attached.
    ///
    /// Used both right after connecting (implicit TLS) and after a
    /// successful `STARTTLS` reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] if the handshake or certificate
    /// verification fails.
    pub async fn upgrade_to_tls(self, hostname: &str, options: &TlsOptions) -> Result<Self> {
        let tcp_stream = match self.transport {
            Transport::Tcp(reader) => reader.into_inner(),
            Transport::Tls(_) => return Err(Error::Protocol("Already using TLS".into())),
        };

        let connector = options.connector()?;
        let tls_stream = connector
            .connect(server_name(hostname)?, tcp_stream)
            .await
            .map_err(Error::Handshake)?;

        tracing::debug!(hostname, "TLS established");
        Ok(Self {
            transport: Transport::Tls(Box::new(BufReader::new(tls_stream))),
            trace: self.trace,
        })
    }

    /// Shuts the write half down; errors are irrelevant at this point.
    pub async fn shutdown(&mut self) {
        let result = match &mut self.transport {
            Transport::Tcp(reader) => reader.get_mut().shutdown().await,
            Transport::Tls(reader) => reader.get_mut().shutdown().await,
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "stream shutdown failed");
        }
    }
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(hostname: &str, port: u16) -> Result<SmtpStream> {
    let stream = TcpStream::connect((hostname, port)).await?;
    tracing::debug!(hostname, port, "TCP connected");
    Ok(SmtpStream::new(Transport::Tcp(BufReader::new(stream))))
}

//! Error types for composing and sending mail.

use std::io;
use thiserror::Error;

/// Errors that can occur while composing or sending a message.
#[derive(Debug, Error)]
pub enum Error {
    /// A body, attachment or image file could not be read.
    #[error("I/O error: cannot read {path}: {source}")]
    Io {
        /// File that could not be read.
        path: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// An address or address list is malformed.
    #[error("Address parse error: {0}")]
    AddressParse(String),

    /// The server could not be reached or refused the session.
    #[error("Connection error: {0}")]
    Connection(String),

    /// TLS negotiation or certificate verification failed.
    #[error("Security error: {0}")]
    Security(String),

    /// The server rejected the credentials.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The server rejected the message or one of its recipients.
    #[error("Submission error{}: {message}", .code.map(|c| format!(" {c}")).unwrap_or_default())]
    Submission {
        /// Server reply code, when the server sent one.
        code: Option<u16>,
        /// Server reply text or local reason.
        message: String,
    },

    /// Transport configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The operation is not valid in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// The taxonomy member of an [`Error`], for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// [`Error::Io`]
    Io,
    /// [`Error::AddressParse`]
    AddressParse,
    /// [`Error::Connection`]
    Connection,
    /// [`Error::Security`]
    Security,
    /// [`Error::Authentication`]
    Authentication,
    /// [`Error::Submission`]
    Submission,
    /// [`Error::Configuration`]
    Configuration,
    /// [`Error::InvalidState`]
    InvalidState,
}

impl Error {
    /// Returns the taxonomy member of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::AddressParse(_) => ErrorKind::AddressParse,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Security(_) => ErrorKind::Security,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Submission { .. } => ErrorKind::Submission,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::InvalidState(_) => ErrorKind::InvalidState,
        }
    }

    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

impl From<mailsend_mime::Error> for Error {
    fn from(err: mailsend_mime::Error) -> Self {
        match err {
            mailsend_mime::Error::InvalidAddress(msg) => Self::AddressParse(msg),
            mailsend_mime::Error::Io { path, source } => Self::Io { path, source },
            other => Self::InvalidState(other.to_string()),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

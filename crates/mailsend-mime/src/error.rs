//! Error types for MIME operations.

use std::io;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Address or address list that does not follow RFC 5322.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid MIME header.
    #[error("Invalid MIME header: {0}")]
    InvalidHeader(String),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// A required header has no value.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Reading a body part from disk failed.
    #[error("Cannot read {path}: {source}")]
    Io {
        /// File that could not be read.
        path: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Wraps an I/O error with the path it concerns.
    #[must_use]
    pub fn io(path: impl AsRef<std::path::Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

//! Protocol transcript.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Mirrors every line exchanged with the server to a sink.
///
/// Client lines are prefixed with `C: `, server lines with `S: `. Write
/// failures are logged and otherwise ignored; a broken transcript never
/// aborts a delivery.
pub struct ProtocolTrace {
    sink: Box<dyn Write + Send>,
}

impl std::fmt::Debug for ProtocolTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolTrace").finish_non_exhaustive()
    }
}

impl ProtocolTrace {
    /// Creates (truncating) a transcript file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }

    /// Wraps an arbitrary writer.
    #[must_use]
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    /// Records bytes sent by the client.
    pub fn client(&mut self, data: &[u8]) {
        self.record(b"C: ", data);
    }

    /// Records the placeholder for a line that carries credentials.
    pub fn client_redacted(&mut self) {
        self.record(b"C: ", b"********\r\n");
    }

    /// Records one line received from the server.
    pub fn server(&mut self, line: &str) {
        let mut data = line.as_bytes().to_vec();
        data.extend_from_slice(b"\r\n");
        self.record(b"S: ", &data);
    }

    fn record(&mut self, prefix: &[u8], data: &[u8]) {
        let result = data
            .split_inclusive(|&b| b == b'\n')
            .try_for_each(|line| {
                self.sink.write_all(prefix)?;
                self.sink.write_all(line)
            })
            .and_then(|()| self.sink.flush());

        if let Err(e) = result {
            tracing::debug!(error = %e, "protocol trace write failed");
        }
    }
}

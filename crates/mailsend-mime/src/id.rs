//! Message-ID, Content-ID and boundary generation.

use rand::Rng;
use rand::distributions::Alphanumeric;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Identifier of an inline resource, referenced from HTML as `cid:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentId(String);

impl ContentId {
    /// Wraps an existing identifier. Surrounding angle brackets are removed.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let trimmed = id.trim().trim_start_matches('<').trim_end_matches('>');
        Self(trimmed.to_string())
    }

    /// Generates a unique identifier for `domain`.
    #[must_use]
    pub fn generate(domain: &str) -> Self {
        Self(unique_id(domain))
    }

    /// Returns the bare identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `Content-ID` header value, `<id>`.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("<{}>", self.0)
    }

    /// Returns the URL used to reference the resource from HTML.
    #[must_use]
    pub fn url(&self) -> String {
        format!("cid:{}", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates a `Message-ID` header value, `<unique@domain>`.
#[must_use]
pub fn generate_message_id(domain: &str) -> String {
    format!("<{}>", unique_id(domain))
}

/// Generates a multipart boundary.
///
/// The `=_` prefix cannot appear in base64 or quoted-printable output, so
/// the boundary never collides with encoded content.
#[must_use]
pub fn generate_boundary() -> String {
    format!("=_mailsend_{}", random_token(24))
}

fn unique_id(domain: &str) -> String {
    let domain = if domain.is_empty() { "localhost" } else { domain };
    let millis = chrono::Utc::now().timestamp_millis();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{millis:x}.{seq:x}.{}@{domain}", random_token(12))
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

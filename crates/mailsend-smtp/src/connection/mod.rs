//! SMTP connection management with type-state pattern.

mod client;
mod stream;
mod tls;
mod trace;

pub use client::{
    Authenticated, Client, Connected, Data, InTransaction, MailTransaction, ReadyForMail,
    RecipientAdded, Rejected, SmtpConnection, Step,
};
pub use stream::{MAX_LINE_LENGTH, SmtpStream, connect};
pub use tls::{TlsOptions, TlsVersion};
pub use trace::ProtocolTrace;

use crate::types::{AuthMechanism, Extension};
use std::collections::HashSet;

/// Server identity and capabilities from the greeting and EHLO reply.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions; empty after a HELO fallback.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is advertised.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if 8BITMIME is advertised.
    #[must_use]
    pub fn supports_8bitmime(&self) -> bool {
        self.supports(&Extension::EightBitMime)
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }

    /// Returns advertised authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Picks the password mechanism to use.
    ///
    /// Servers that advertise nothing are offered PLAIN; otherwise the first
    /// of [`AuthMechanism::PASSWORD_MECHANISMS`] the server lists wins.
    #[must_use]
    pub fn preferred_password_mechanism(&self) -> Option<AuthMechanism> {
        let advertised = self.auth_mechanisms();
        if advertised.is_empty() {
            return Some(AuthMechanism::Plain);
        }
        AuthMechanism::PASSWORD_MECHANISMS
            .into_iter()
            .find(|mech| advertised.contains(mech))
    }

    pub(crate) fn set_extensions<'a>(&mut self, lines: impl Iterator<Item = &'a String>) {
        self.extensions = lines.map(|line| Extension::parse(line)).collect();
    }
}

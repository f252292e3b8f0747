//! Legacy key/value configuration.
//!
//! Older mail APIs configure the transport through a bag of named fields,
//! often keyed by schema URLs such as
//! `http://schemas.microsoft.com/cdo/configuration/smtpserver`. Keys are
//! matched case-insensitively on their last `/` or `:` separated segment, so
//! bare names work as well.

use crate::config::{IMPLICIT_TLS_PORT, SecurityMode, TransportConfigBuilder};
use crate::error::{Error, Result};
use tracing::debug;

/// Recognized legacy keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyKey {
    /// `smtpserver`: host name.
    SmtpServer,
    /// `smtpserverport`: port number.
    SmtpServerPort,
    /// `sendusername`: user name.
    SendUsername,
    /// `sendpassword`: password.
    SendPassword,
    /// `smtpusessl`: boolean TLS switch.
    SmtpUseSsl,
    /// `from`: `From` address.
    From,
    /// `reply-to` or `replyto`: `Reply-To` address.
    ReplyTo,
    /// `sendusing`: transport selector. Only SMTP over the network is
    /// supported, so the value is ignored.
    SendUsing,
}

impl LegacyKey {
    /// Maps a key (bare or schema URL) to a recognized key.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let name = key
            .trim()
            .rsplit(['/', ':'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match name.as_str() {
            "smtpserver" => Some(Self::SmtpServer),
            "smtpserverport" => Some(Self::SmtpServerPort),
            "sendusername" => Some(Self::SendUsername),
            "sendpassword" => Some(Self::SendPassword),
            "smtpusessl" => Some(Self::SmtpUseSsl),
            "from" => Some(Self::From),
            "reply-to" | "replyto" => Some(Self::ReplyTo),
            "sendusing" => Some(Self::SendUsing),
            _ => None,
        }
    }
}

/// Ordered bag of legacy configuration fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyOptions {
    entries: Vec<(String, String)>,
}

impl LegacyOptions {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field. A later value for the same key wins.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    /// Returns the last value for a recognized key.
    #[must_use]
    pub fn get(&self, key: LegacyKey) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| LegacyKey::parse(k) == Some(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LegacyOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Settings extracted from a [`LegacyOptions`] bag.
#[derive(Debug, Clone)]
pub struct LegacySettings {
    /// Transport configuration; further settings can be chained on.
    pub config: TransportConfigBuilder,
    /// `From` address list, if given.
    pub from: Option<String>,
    /// `Reply-To` address list, if given.
    pub reply_to: Option<String>,
}

/// Maps a legacy bag onto transport settings.
///
/// `smtpusessl = true` selects implicit TLS on port 465 and STARTTLS
/// otherwise; `false` selects plaintext. Without the flag the security mode
/// is [`SecurityMode::Auto`].
///
/// # Errors
///
/// Returns [`Error::Configuration`] if `options` is `None`, `smtpserver` is
/// missing or empty, or the port or TLS flag cannot be parsed.
pub fn ingest(options: Option<&LegacyOptions>) -> Result<LegacySettings> {
    let options =
        options.ok_or_else(|| Error::Configuration("no configuration options supplied".into()))?;

    for (key, _) in options.iter() {
        match LegacyKey::parse(key) {
            None => debug!(key, "Ignoring unknown configuration key"),
            Some(LegacyKey::SendUsing) => debug!(key, "Ignoring transport selector"),
            Some(_) => {}
        }
    }

    let host = options
        .get(LegacyKey::SmtpServer)
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::Configuration("smtpserver is required".into()))?;

    let mut config = TransportConfigBuilder::new(host);

    let port = options
        .get(LegacyKey::SmtpServerPort)
        .map(|value| {
            value.trim().parse::<u16>().map_err(|_| {
                Error::Configuration(format!("smtpserverport is not a valid port: {value:?}"))
            })
        })
        .transpose()?;
    if let Some(port) = port {
        config = config.port(port);
    }

    if let Some(value) = options.get(LegacyKey::SmtpUseSsl) {
        let security = if parse_bool(value)? {
            if port == Some(IMPLICIT_TLS_PORT) {
                SecurityMode::ImplicitTls
            } else {
                SecurityMode::StartTls
            }
        } else {
            SecurityMode::None
        };
        config = config.security(security);
    }

    if let Some(username) = options.get(LegacyKey::SendUsername) {
        config = config.username(username);
    }
    if let Some(password) = options.get(LegacyKey::SendPassword) {
        config = config.password(password);
    }

    Ok(LegacySettings {
        config,
        from: options.get(LegacyKey::From).map(str::to_string),
        reply_to: options.get(LegacyKey::ReplyTo).map(str::to_string),
    })
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::Configuration(format!(
            "smtpusessl is not a boolean: {value:?}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SecurityPlan;
    use crate::error::ErrorKind;

    const CDO: &str = "http://schemas.microsoft.com/cdo/configuration/";

    fn bag(pairs: &[(&str, &str)]) -> LegacyOptions {
        pairs.iter().copied().collect()
    }

    #[test]
    fn key_matching() {
        assert_eq!(LegacyKey::parse("smtpserver"), Some(LegacyKey::SmtpServer));
        assert_eq!(LegacyKey::parse(&format!("{CDO}SMTPServerPort")), Some(LegacyKey::SmtpServerPort));
        assert_eq!(LegacyKey::parse("urn:schemas:mailheader:reply-to"), Some(LegacyKey::ReplyTo));
        assert_eq!(LegacyKey::parse("ReplyTo"), Some(LegacyKey::ReplyTo));
        assert_eq!(LegacyKey::parse(&format!("{CDO}sendusing")), Some(LegacyKey::SendUsing));
        assert_eq!(LegacyKey::parse("smtpconnectiontimeout"), None);
    }

    #[test]
    fn maps_schema_keys() {
        let cdo = |name: &str| format!("{CDO}{name}");
        let options: LegacyOptions = [
            (cdo("smtpserver"), "smtp.example.com"),
            (cdo("smtpserverport"), "465"),
            (cdo("sendusername"), "app"),
            (cdo("sendpassword"), "secret"),
            (cdo("smtpusessl"), "True"),
            (cdo("sendusing"), "2"),
            ("urn:schemas:httpmail:from".to_string(), "App <app@example.com>"),
            ("reply-to".to_string(), "help@example.com"),
            ("x-unknown".to_string(), "ignored"),
        ]
        .into_iter()
        .collect();

        let settings = ingest(Some(&options)).unwrap();
        let config = settings.config.build();
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 465);
        assert_eq!(config.security, SecurityMode::ImplicitTls);
        assert_eq!(config.credentials(), Some(("app", "secret")));
        assert_eq!(settings.from.as_deref(), Some("App <app@example.com>"));
        assert_eq!(settings.reply_to.as_deref(), Some("help@example.com"));
    }

    #[test]
    fn use_ssl_maps_by_port() {
        let starttls = ingest(Some(&bag(&[
            ("smtpserver", "h"),
            ("smtpserverport", "587"),
            ("smtpusessl", "1"),
        ])))
        .unwrap()
        .config
        .build();
        assert_eq!(starttls.security, SecurityMode::StartTls);
        assert_eq!(starttls.security_plan(), SecurityPlan::StartTls { required: true });

        let plain = ingest(Some(&bag(&[("smtpserver", "h"), ("smtpusessl", "false")])))
            .unwrap()
            .config
            .build();
        assert_eq!(plain.security, SecurityMode::None);
        assert_eq!(plain.port, 25);

        let auto = ingest(Some(&bag(&[("smtpserver", "h")]))).unwrap().config.build();
        assert_eq!(auto.security, SecurityMode::Auto);
    }

    #[test]
    fn later_values_win() {
        let settings = ingest(Some(&bag(&[
            ("smtpserver", "first.example.com"),
            ("SMTPSERVER", "second.example.com"),
        ])))
        .unwrap();
        assert_eq!(settings.config.build().host, "second.example.com");
    }

    #[test]
    fn configuration_errors() {
        let kind = |options: Option<&LegacyOptions>| ingest(options).unwrap_err().kind();

        assert_eq!(kind(None), ErrorKind::Configuration);
        assert_eq!(kind(Some(&LegacyOptions::new())), ErrorKind::Configuration);
        assert_eq!(kind(Some(&bag(&[("smtpserver", "  ")]))), ErrorKind::Configuration);
        assert_eq!(
            kind(Some(&bag(&[("smtpserver", "h"), ("smtpserverport", "smtp")]))),
            ErrorKind::Configuration
        );
        assert_eq!(
            kind(Some(&bag(&[("smtpserver", "h"), ("smtpserverport", "70000")]))),
            ErrorKind::Configuration
        );
        assert_eq!(
            kind(Some(&bag(&[("smtpserver", "h"), ("smtpusessl", "maybe")]))),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn bag_accessors() {
        let mut options = LegacyOptions::new();
        options.insert("smtpserver", "h").insert("from", "a@x.com");
        assert_eq!(options.len(), 2);
        assert!(!options.is_empty());
        assert_eq!(options.get(LegacyKey::From), Some("a@x.com"));
        assert_eq!(options.iter().next(), Some(("smtpserver", "h")));
    }
}

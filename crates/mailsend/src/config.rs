//! Transport configuration.

use crate::error::{Error, Result};
use mailsend_smtp::{TlsOptions, TlsVersion};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::path::PathBuf;
use std::time::Duration;

/// Port used for implicit TLS submission (RFC 8314).
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// Connection security requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityMode {
    /// Plaintext for the whole session. **Not recommended.**
    None,
    /// Implicit TLS on port 465, otherwise STARTTLS when offered.
    #[default]
    Auto,
    /// TLS from the first byte.
    ImplicitTls,
    /// Plaintext greeting, then STARTTLS; fails if not offered.
    #[serde(rename = "starttls")]
    StartTls,
    /// STARTTLS when the server offers it, plaintext otherwise.
    #[serde(rename = "starttls-if-available")]
    StartTlsIfAvailable,
}

impl SecurityMode {
    /// Returns the port used when none is configured.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::ImplicitTls => IMPLICIT_TLS_PORT,
            Self::StartTls => 587,
            Self::None | Self::Auto | Self::StartTlsIfAvailable => 25,
        }
    }

    /// Resolves the mode into the concrete action for a connection to
    /// `port`.
    #[must_use]
    pub const fn resolve(self, port: u16) -> SecurityPlan {
        match self {
            Self::None => SecurityPlan::Plaintext,
            Self::ImplicitTls => SecurityPlan::ImplicitTls,
            Self::StartTls => SecurityPlan::StartTls { required: true },
            Self::StartTlsIfAvailable => SecurityPlan::StartTls { required: false },
            Self::Auto if port == IMPLICIT_TLS_PORT => SecurityPlan::ImplicitTls,
            Self::Auto => SecurityPlan::StartTls { required: false },
        }
    }
}

/// TLS action for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityPlan {
    /// No TLS.
    Plaintext,
    /// Handshake right after connecting.
    ImplicitTls,
    /// Upgrade with STARTTLS after the greeting.
    StartTls {
        /// Fail when the server does not advertise STARTTLS.
        required: bool,
    },
}

/// Set of TLS protocol versions the client may negotiate.
///
/// Built once per configuration and never mutated afterwards:
///
/// ```
/// use mailsend::TlsProtocols;
///
/// let only_13 = TlsProtocols::TLS13;
/// let both = TlsProtocols::TLS12 | TlsProtocols::TLS13;
/// assert!(both.contains(only_13));
/// assert_eq!(both, TlsProtocols::default());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TlsProtocols(u8);

impl TlsProtocols {
    /// TLS 1.2
    pub const TLS12: Self = Self(0b01);
    /// TLS 1.3
    pub const TLS13: Self = Self(0b10);

    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns true if no version is enabled.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if every version of `other` is in this set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns the enabled versions, oldest first.
    #[must_use]
    pub fn versions(self) -> Vec<TlsVersion> {
        [(Self::TLS12, TlsVersion::Tls12), (Self::TLS13, TlsVersion::Tls13)]
            .into_iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, version)| version)
            .collect()
    }

    /// Parses a protocol name such as `TLS1.2`, `tls13` or `TLSv1.3`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown names.
    pub fn parse_name(name: &str) -> Result<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "tls12" | "tlsv12" => Ok(Self::TLS12),
            "tls13" | "tlsv13" => Ok(Self::TLS13),
            _ => Err(Error::Configuration(format!(
                "unsupported TLS protocol {name:?} (expected TLS1.2 or TLS1.3)"
            ))),
        }
    }
}

impl Default for TlsProtocols {
    fn default() -> Self {
        Self::TLS12 | Self::TLS13
    }
}

impl BitOr for TlsProtocols {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for TlsProtocols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.versions()).finish()
    }
}

impl<'de> Deserialize<'de> for TlsProtocols {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names.iter().try_fold(Self::empty(), |set, name| {
            Self::parse_name(name)
                .map(|flag| set | flag)
                .map_err(serde::de::Error::custom)
        })
    }
}

/// Server certificate verification policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CertificatePolicy {
    /// Verify the chain against the web PKI roots and the host name.
    #[default]
    Strict,
    /// Accept any certificate. **Insecure**, explicit opt-in only.
    AcceptInvalid,
}

/// A password that never shows up in debug output.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    /// Returns the password text.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"********\"")
    }
}

/// SMTP transport configuration.
///
/// Deserializes from the same fields as [`TransportConfigBuilder`], with
/// timeouts given in seconds:
///
/// ```json
/// { "host": "smtp.example.com", "port": 587, "security": "starttls",
///   "username": "app", "password": "secret", "io_timeout": 20 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "TransportConfigBuilder")]
pub struct TransportConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Requested connection security.
    pub security: SecurityMode,
    /// User name for authentication.
    pub username: Option<String>,
    /// Password for authentication.
    pub password: Option<Password>,
    /// TLS versions offered in the handshake.
    pub tls_protocols: TlsProtocols,
    /// Certificate verification policy.
    pub certificate_policy: CertificatePolicy,
    /// File receiving a transcript of the SMTP exchange.
    pub trace_path: Option<PathBuf>,
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Timeout for each later protocol step.
    pub io_timeout: Duration,
    /// Name announced in EHLO/HELO.
    pub client_hostname: String,
    /// Treat a user name without password (or the reverse) as an error
    /// instead of sending anonymously.
    pub strict_credentials: bool,
}

impl TransportConfig {
    /// Creates a configuration with default settings for `host`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        TransportConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> TransportConfigBuilder {
        TransportConfigBuilder::new(host)
    }

    /// Returns the TLS action for this configuration.
    #[must_use]
    pub const fn security_plan(&self) -> SecurityPlan {
        self.security.resolve(self.port)
    }

    /// Returns the credentials when both user name and password are
    /// non-empty.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        let password = self
            .password
            .as_ref()
            .map(Password::expose)
            .filter(|p| !p.is_empty())?;
        Some((username, password))
    }

    /// Returns true if exactly one of user name and password is set.
    #[must_use]
    pub fn has_partial_credentials(&self) -> bool {
        let username = self.username.as_deref().is_some_and(|u| !u.is_empty());
        let password = self
            .password
            .as_ref()
            .is_some_and(|p| !p.expose().is_empty());
        username != password
    }

    /// Returns the TLS options for the SMTP client.
    #[must_use]
    pub fn tls_options(&self) -> TlsOptions {
        TlsOptions {
            versions: self.tls_protocols.versions(),
            accept_invalid_certs: self.certificate_policy == CertificatePolicy::AcceptInvalid,
        }
    }

    /// Checks the configuration before any network activity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the host is missing, no TLS
    /// version is enabled, or credentials are partial while
    /// `strict_credentials` is set.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Configuration("no SMTP host configured".into()));
        }
        if self.tls_protocols.is_empty() && self.security_plan() != SecurityPlan::Plaintext {
            return Err(Error::Configuration("no TLS protocol version enabled".into()));
        }
        if self.strict_credentials && self.has_partial_credentials() {
            return Err(Error::Configuration(
                "user name and password must be set together".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for transport configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfigBuilder {
    host: String,
    port: Option<u16>,
    security: SecurityMode,
    username: Option<String>,
    password: Option<Password>,
    tls_protocols: TlsProtocols,
    certificate_policy: CertificatePolicy,
    trace_path: Option<PathBuf>,
    #[serde(deserialize_with = "seconds")]
    connect_timeout: Duration,
    #[serde(deserialize_with = "seconds")]
    io_timeout: Duration,
    client_hostname: String,
    strict_credentials: bool,
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

impl Default for TransportConfigBuilder {
    fn default() -> Self {
        Self::new("")
    }
}

impl TransportConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: SecurityMode::Auto,
            username: None,
            password: None,
            tls_protocols: TlsProtocols::default(),
            certificate_policy: CertificatePolicy::Strict,
            trace_path: None,
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
            client_hostname: "localhost".to_string(),
            strict_credentials: false,
        }
    }

    /// Sets the hostname.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port. Without one, the security mode's default is used.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: SecurityMode) -> Self {
        self.security = security;
        self
    }

    /// Sets user name and password.
    #[must_use]
    pub fn credentials(self, username: impl Into<String>, password: impl Into<Password>) -> Self {
        self.username(username).password(password)
    }

    /// Sets the user name.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<Password>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the accepted TLS versions.
    #[must_use]
    pub const fn tls_protocols(mut self, protocols: TlsProtocols) -> Self {
        self.tls_protocols = protocols;
        self
    }

    /// Sets the certificate verification policy.
    #[must_use]
    pub const fn certificate_policy(mut self, policy: CertificatePolicy) -> Self {
        self.certificate_policy = policy;
        self
    }

    /// Mirrors the SMTP exchange to a file.
    #[must_use]
    pub fn trace_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace_path = Some(path.into());
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets the name announced in EHLO.
    #[must_use]
    pub fn client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = hostname.into();
        self
    }

    /// Rejects partial credentials instead of sending anonymously.
    #[must_use]
    pub const fn strict_credentials(mut self, strict: bool) -> Self {
        self.strict_credentials = strict;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> TransportConfig {
        TransportConfig {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            username: self.username,
            password: self.password,
            tls_protocols: self.tls_protocols,
            certificate_policy: self.certificate_policy,
            trace_path: self.trace_path,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            client_hostname: self.client_hostname,
            strict_credentials: self.strict_credentials,
        }
    }
}

impl From<TransportConfigBuilder> for TransportConfig {
    fn from(builder: TransportConfigBuilder) -> Self {
        builder.build()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn builder_defaults() {
        let config = TransportConfig::new("smtp.example.com");
        assert_eq!(config.port, 25);
        assert_eq!(config.security, SecurityMode::Auto);
        assert_eq!(config.tls_protocols, TlsProtocols::TLS12 | TlsProtocols::TLS13);
        assert_eq!(config.certificate_policy, CertificatePolicy::Strict);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.io_timeout, Duration::from_secs(60));
        assert_eq!(config.client_hostname, "localhost");
        assert!(config.trace_path.is_none());
        assert!(!config.strict_credentials);
    }

    #[test]
    fn default_port_follows_security() {
        let port = |mode| TransportConfig::builder("h").security(mode).build().port;
        assert_eq!(port(SecurityMode::ImplicitTls), 465);
        assert_eq!(port(SecurityMode::StartTls), 587);
        assert_eq!(port(SecurityMode::None), 25);
        assert_eq!(
            TransportConfig::builder("h").security(SecurityMode::ImplicitTls).port(2465).build().port,
            2465
        );
    }

    #[test]
    fn security_resolution() {
        assert_eq!(SecurityMode::None.resolve(465), SecurityPlan::Plaintext);
        assert_eq!(SecurityMode::ImplicitTls.resolve(25), SecurityPlan::ImplicitTls);
        assert_eq!(
            SecurityMode::StartTls.resolve(587),
            SecurityPlan::StartTls { required: true }
        );
        assert_eq!(
            SecurityMode::StartTlsIfAvailable.resolve(587),
            SecurityPlan::StartTls { required: false }
        );
        assert_eq!(SecurityMode::Auto.resolve(465), SecurityPlan::ImplicitTls);
        assert_eq!(
            SecurityMode::Auto.resolve(587),
            SecurityPlan::StartTls { required: false }
        );
    }

    #[test]
    fn credentials_need_both_parts() {
        let both = TransportConfig::builder("h").credentials("user", "pw").build();
        assert_eq!(both.credentials(), Some(("user", "pw")));
        assert!(!both.has_partial_credentials());

        let user_only = TransportConfig::builder("h").username("user").build();
        assert_eq!(user_only.credentials(), None);
        assert!(user_only.has_partial_credentials());

        let empty_password = TransportConfig::builder("h").credentials("user", "").build();
        assert_eq!(empty_password.credentials(), None);
        assert!(empty_password.has_partial_credentials());

        let none = TransportConfig::new("h");
        assert_eq!(none.credentials(), None);
        assert!(!none.has_partial_credentials());
    }

    #[test]
    fn validation() {
        assert!(TransportConfig::new("smtp.example.com").validate().is_ok());
        assert_eq!(
            TransportConfig::new("  ").validate().unwrap_err().kind(),
            ErrorKind::Configuration
        );

        let partial = TransportConfig::builder("h").password("pw");
        assert!(partial.clone().build().validate().is_ok());
        assert_eq!(
            partial.strict_credentials(true).build().validate().unwrap_err().kind(),
            ErrorKind::Configuration
        );

        let no_tls = TransportConfig::builder("h").tls_protocols(TlsProtocols::empty());
        assert!(no_tls.clone().security(SecurityMode::None).build().validate().is_ok());
        assert!(no_tls.build().validate().is_err());
    }

    #[test]
    fn tls_options_mirror_config() {
        let config = TransportConfig::builder("h")
            .tls_protocols(TlsProtocols::TLS13)
            .certificate_policy(CertificatePolicy::AcceptInvalid)
            .build();
        let options = config.tls_options();
        assert_eq!(options.versions, vec![TlsVersion::Tls13]);
        assert!(options.accept_invalid_certs);
        assert!(!TransportConfig::new("h").tls_options().accept_invalid_certs);
    }

    #[test]
    fn protocol_names() {
        assert_eq!(TlsProtocols::parse_name("TLS1.2").unwrap(), TlsProtocols::TLS12);
        assert_eq!(TlsProtocols::parse_name("tlsv1.3").unwrap(), TlsProtocols::TLS13);
        assert!(TlsProtocols::parse_name("SSL3").is_err());
        assert_eq!(format!("{:?}", TlsProtocols::default()), "{Tls12, Tls13}");
    }

    #[test]
    fn password_is_redacted_in_debug() {
        let config = TransportConfig::builder("h").credentials("user", "hunter2").build();
        let debug = format!("{config:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn deserializes_from_json() {
        let config: TransportConfig = serde_json::from_str(
            r#"{
                "host": "smtp.example.com",
                "security": "starttls",
                "username": "app",
                "password": "secret",
                "tls_protocols": ["TLS1.3"],
                "certificate_policy": "accept-invalid",
                "io_timeout": 20,
                "trace_path": "/tmp/smtp.log"
            }"#,
        )
        .unwrap();
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 587);
        assert_eq!(config.security, SecurityMode::StartTls);
        assert_eq!(config.credentials(), Some(("app", "secret")));
        assert_eq!(config.tls_protocols, TlsProtocols::TLS13);
        assert_eq!(config.certificate_policy, CertificatePolicy::AcceptInvalid);
        assert_eq!(config.io_timeout, Duration::from_secs(20));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.trace_path, Some(PathBuf::from("/tmp/smtp.log")));
    }

    #[test]
    fn deserialize_rejects_unknown_values() {
        assert!(serde_json::from_str::<TransportConfig>(r#"{"security": "tls-maybe"}"#).is_err());
        assert!(serde_json::from_str::<TransportConfig>(r#"{"tls_protocols": ["SSL3"]}"#).is_err());
        assert!(serde_json::from_str::<TransportConfig>(r#"{"hostname": "x"}"#).is_err());
    }
}

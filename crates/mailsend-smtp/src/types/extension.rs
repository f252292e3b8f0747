//! SMTP service extensions advertised in the EHLO reply.

/// SMTP extension keyword with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS (RFC 3207)
    StartTls,
    /// AUTH (RFC 4954) with the advertised mechanisms
    Auth(Vec<AuthMechanism>),
    /// SIZE (RFC 1870); `None` when no limit is declared
    Size(Option<usize>),
    /// 8BITMIME (RFC 6152)
    EightBitMime,
    /// PIPELINING (RFC 2920)
    Pipelining,
    /// SMTPUTF8 (RFC 6531)
    SmtpUtf8,
    /// Anything else, kept verbatim
    Unknown(String),
}

impl Extension {
    /// Parses one EHLO capability line (without the reply code prefix).
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(words.filter_map(AuthMechanism::parse).collect()),
            "SIZE" => Self::Size(words.next().and_then(|s| s.parse().ok()).filter(|&n| n > 0)),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN (RFC 4616)
    Plain,
    /// LOGIN (legacy, widely deployed)
    Login,
    /// CRAM-MD5, recognised but not offered by this client
    CramMd5,
    /// `XOAUTH2`, recognised but not offered by this client
    XOAuth2,
}

impl AuthMechanism {
    /// Mechanisms this client can perform with a username and password,
    /// in order of preference.
    pub const PASSWORD_MECHANISMS: [Self; 2] = [Self::Plain, Self::Login];

    /// Parses a mechanism name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            "XOAUTH2" => Some(Self::XOAuth2),
            _ => None,
        }
    }

    /// Returns the mechanism name as sent in `AUTH`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
        }
    }
}

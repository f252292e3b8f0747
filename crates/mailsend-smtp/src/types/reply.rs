//! SMTP reply types.

use crate::error::Error;

/// Reply from the server: a three-digit code and one or more text lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Text of each reply line, code and separator stripped.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true for a 2xx reply.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns all text lines joined with newlines.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Converts the reply into an [`Error::SmtpError`].
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::smtp_error(self.code.as_u16(), self.message_text())
    }

    /// Returns `Ok(self)` when the code matches `expected`, otherwise the
    /// reply as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SmtpError`] when the code differs.
    pub fn expect_code(self, expected: ReplyCode) -> Result<Self, Error> {
        if self.code == expected {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Returns `Ok(self)` for a 2xx reply, otherwise the reply as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SmtpError`] for any non-2xx code.
    pub fn expect_success(self) -> Result<Self, Error> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }
}

/// Three-digit SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 250 Requested action completed
    pub const OK: Self = Self(250);
    /// 334 Server challenge during AUTH
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);

    /// Creates a reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// 2xx
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// 3xx
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// 4xx
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// 5xx
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn reply(code: u16, lines: &[&str]) -> Reply {
        Reply::new(
            ReplyCode::new(code),
            lines.iter().map(ToString::to_string).collect(),
        )
    }

    #[test]
    fn code_classes() {
        assert!(ReplyCode::OK.is_success());
        assert!(ReplyCode::START_DATA.is_intermediate());
        assert!(ReplyCode::SERVICE_UNAVAILABLE.is_transient());
        assert!(ReplyCode::AUTH_FAILED.is_permanent());
        assert!(!ReplyCode::AUTH_CONTINUE.is_success());
    }

    #[test]
    fn expect_success_passes_2xx_through() {
        let ok = reply(250, &["2.0.0 Ok"]).expect_success().unwrap();
        assert_eq!(ok.code, ReplyCode::OK);
    }

    #[test]
    fn expect_success_carries_server_text() {
        let err = reply(550, &["5.1.1 <nobody@example.com>:", "Recipient address rejected"])
            .expect_success()
            .unwrap_err();
        assert_eq!(err.reply_code(), Some(550));
        assert!(err.to_string().contains("Recipient address rejected"));
    }

    #[test]
    fn expect_code_requires_exact_match() {
        assert!(reply(354, &["End data with <CR><LF>.<CR><LF>"])
            .expect_code(ReplyCode::START_DATA)
            .is_ok());
        assert!(reply(250, &["Ok"]).expect_code(ReplyCode::START_DATA).is_err());
    }

    #[test]
    fn message_text_joins_lines() {
        assert_eq!(reply(250, &["a", "b"]).message_text(), "a\nb");
        assert_eq!(reply(250, &[]).message_text(), "");
    }
}

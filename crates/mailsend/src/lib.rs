//! # mailsend
//!
//! Composes an email message and submits it to an SMTP server.
//!
//! ## Features
//!
//! - **Message builder**: recipients, text and HTML bodies, attachments and
//!   `cid:`-referenced images, accumulated in any order
//! - **Delivery state machine**: connect, TLS (implicit or STARTTLS),
//!   optional authentication and submission, each step under a timeout
//! - **Uniform results**: every failure maps to one [`ErrorKind`]
//! - **Legacy configuration**: key/value option bags keyed by bare names or
//!   schema URLs
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailsend::{Mailer, SecurityMode, TransportConfig};
//!
//! # fn main() -> mailsend::Result<()> {
//! let config = TransportConfig::builder("smtp.example.com")
//!     .security(SecurityMode::StartTls)
//!     .credentials("app@example.com", "secret")
//!     .build();
//!
//! let mut mailer = Mailer::new(config);
//! mailer.add_from("app@example.com", Some("App"))?;
//! mailer.add_to("user@example.org", None)?;
//! mailer.set_subject("Report");
//! mailer.set_html_body("<p>See attached.</p>");
//! mailer.add_attachment("report.pdf");
//!
//! mailer.send().into_result()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Delivery
//!
//! ```text
//! Idle → Connected → Secured → [Authenticated] → Sent
//!   └─────────┴──────────┴───────────┴──────────→ Failed
//! ```
//!
//! Once a connect is attempted the transport is closed exactly once, even
//! when the connect step fails. No step is retried.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod dispatch;
mod error;
pub mod mailer;
pub mod message;
pub mod options;
pub mod transport;

pub use config::{
    CertificatePolicy, Password, SecurityMode, SecurityPlan, TlsProtocols, TransportConfig,
    TransportConfigBuilder,
};
pub use dispatch::{DeliveryState, Dispatcher, SendResult};
pub use error::{Error, ErrorKind, Result};
pub use mailer::Mailer;
pub use message::{
    EmbeddedImage, Envelope, MessageBuilder, OutgoingMail, Placement, RecipientKind,
};
pub use options::{LegacyKey, LegacyOptions, LegacySettings};
pub use transport::{SmtpTransport, Transport};

pub use mailsend_mime::{ContentId, Mailbox};
pub use mailsend_smtp::{TlsOptions, TlsVersion};

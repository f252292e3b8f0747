//! # mailsend-smtp
//!
//! SMTP submission client implementing the client side of RFC 5321.
//!
//! ## Features
//!
//! - **Type-state connection management**: a message can only be submitted
//!   once the session has been greeted, and `DATA` only after a recipient
//!   was accepted
//! - **Commands**: EHLO (with HELO fallback), STARTTLS, AUTH, MAIL FROM,
//!   RCPT TO, DATA, RSET, QUIT
//! - **TLS**: implicit TLS (port 465) and STARTTLS through rustls, with a
//!   configurable protocol set and certificate policy
//! - **Authentication**: PLAIN and LOGIN, chosen from the EHLO advertisement
//! - **Recoverable rejections**: a refused command hands the session back
//!   in [`Rejected`], so it can still be reset or closed with QUIT
//! - **Protocol trace**: optional transcript of every exchanged line
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsend_smtp::{Address, Client, TlsOptions};
//! use mailsend_smtp::connection::connect;
//!
//! #[tokio::main]
//! async fn main() -> mailsend_smtp::Result<()> {
//!     let stream = connect("smtp.example.com", 587).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let client = client.ehlo("client.example.com").await?;
//!     let client = client
//!         .starttls("client.example.com", "smtp.example.com", &TlsOptions::default())
//!         .await?;
//!     let client = client.login("user@example.com", "password").await?;
//!
//!     let client = client.mail_from(Address::new("sender@example.com")?, None).await?;
//!     let client = client.rcpt_to(Address::new("recipient@example.com")?).await?;
//!     let client = client.data().await?;
//!     let client = client
//!         .send_message(b"Subject: Test\r\n\r\nHello, World!\r\n")
//!         .await?;
//!
//!     client.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── login() ───→ Authenticated
//! └──────────────┘                        │
//!        │                                │
//!        └──────── mail_from() ───────────┴──→ MailTransaction ──→ RecipientAdded ──→ Data
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    Authenticated, Client, Connected, Data, InTransaction, MailTransaction, ProtocolTrace,
    ReadyForMail, RecipientAdded, Rejected, ServerInfo, SmtpConnection, SmtpStream, Step,
    TlsOptions, TlsVersion,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};

//! # mailsend-mime
//!
//! MIME message generation for outbound email.
//!
//! ## Features
//!
//! - **Addresses**: RFC 5322 mailbox and address-list parsing and formatting
//! - **Message generation**: text, HTML, inline resources and attachments
//! - **Encoding**: Base64, Quoted-Printable, RFC 2047 header encoding
//! - **Identifiers**: Message-ID, Content-ID and boundary generation
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsend_mime::{Attachment, Mailbox, MimeMessage};
//!
//! let message = MimeMessage::builder()
//!     .from(Mailbox::parse("Alice <alice@example.com>")?)
//!     .to(Mailbox::parse("bob@example.org")?)
//!     .subject("Quarterly report")
//!     .text_body("See attached.")
//!     .html_body("<p>See attached.</p>")
//!     .attach(Attachment::from_file("report.pdf")?)
//!     .build()?; // multipart/mixed around multipart/alternative
//!
//! let wire: Vec<u8> = message.to_bytes();
//! ```
//!
//! ### Address lists
//!
//! ```ignore
//! use mailsend_mime::parse_mailbox_list;
//!
//! let list = parse_mailbox_list("\"Doe, John\" <john@example.com>, jane@example.org")?;
//! assert_eq!(list.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod header;
mod id;
mod message;

pub mod encoding;

pub use address::{Mailbox, format_mailbox_list, parse_mailbox_list};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use id::{ContentId, generate_boundary, generate_message_id};
pub use message::{Attachment, InlineResource, MessageBuilder, MimeMessage, Part, TransferEncoding};

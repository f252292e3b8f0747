//! SMTP reply parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses a complete reply from its lines.
///
/// ```text
/// 250-smtp.example.com
/// 250-PIPELINING
/// 250 STARTTLS
/// ```
///
/// Every line must carry the same code; the last one uses a space separator.
///
/// # Errors
///
/// Returns [`Error::Protocol`] for an empty, short, or inconsistent reply.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let first = lines
        .first()
        .ok_or_else(|| Error::Protocol("Empty reply".into()))?;

    let code = parse_code(first)?;
    let mut message = Vec::with_capacity(lines.len());

    for line in lines {
        if parse_code(line)? != code {
            return Err(Error::Protocol(format!(
                "Reply code changed mid-reply: {line}"
            )));
        }
        match line.get(4..) {
            Some(text) => message.push(text.to_string()),
            None if line.len() == 3 => message.push(String::new()),
            None => return Err(Error::Protocol(format!("Malformed reply line: {line}"))),
        }
    }

    Ok(Reply::new(ReplyCode::new(code), message))
}

/// Returns true if `line` terminates a (possibly multi-line) reply.
///
/// A bare three-digit code is accepted as terminal too; some servers send
/// `250` without text.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    let bytes = line.as_bytes();
    match bytes.len() {
        0..=2 => false,
        3 => true,
        _ => bytes[3] == b' ',
    }
}

fn parse_code(line: &str) -> Result<u16> {
    let digits = line
        .get(..3)
        .ok_or_else(|| Error::Protocol(format!("Reply too short: {line}")))?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Protocol(format!("Invalid reply code: {digits}")));
    }
    digits
        .parse()
        .map_err(|_| Error::Protocol(format!("Invalid reply code: {digits}")))
}

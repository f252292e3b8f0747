//! Content-transfer and header encodings.
//!
//! Base64 and Quoted-Printable bodies (RFC 2045) and RFC 2047 encoded words
//! for header text.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length for body encodings.
const MAX_LINE_LENGTH: usize = 76;

/// Longest line (without CRLF) a 7bit body may carry.
const MAX_7BIT_LINE: usize = 998;

/// Payload bytes per encoded word: `=?utf-8?B?` and `?=` take 12 of the 75
/// characters, and 60 base64 characters carry 45 bytes.
const MAX_WORD_BYTES: usize = 45;

/// Encodes data as Base64 without line breaks.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped at 76 columns, each line CRLF-terminated.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2 + 2);
    for chunk in encoded.as_bytes().chunks(MAX_LINE_LENGTH) {
        // Base64 output is pure ASCII, so every chunk is valid UTF-8.
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}

/// Returns true if `text` can be sent as 7bit: ASCII only, no bare CR or
/// NUL, and no line longer than 998 octets.
#[must_use]
pub fn is_7bit_safe(text: &str) -> bool {
    text.bytes().all(|b| b.is_ascii() && b != 0)
        && text.split('\n').all(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            line.len() <= MAX_7BIT_LINE && !line.contains('\r')
        })
}

/// Normalizes line endings of text to CRLF.
#[must_use]
pub fn normalize_crlf(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut lines = text.split('\n').peekable();
    while let Some(line) = lines.next() {
        out.push_str(line.strip_suffix('\r').unwrap_or(line));
        if lines.peek().is_some() {
            out.push_str("\r\n");
        }
    }
    out
}

/// Encodes text using Quoted-Printable (RFC 2045 section 6.7).
///
/// Hard line breaks are kept as CRLF; long lines get soft breaks so no
/// encoded line exceeds 76 characters; trailing whitespace is encoded.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::with_capacity(text.len() * 3 / 2);
    let mut lines = text.split('\n').peekable();

    while let Some(line) = lines.next() {
        let line = line.strip_suffix('\r').unwrap_or(line).as_bytes();
        let mut line_length = 0;

        for (i, &byte) in line.iter().enumerate() {
            let is_last = i + 1 == line.len();
            let literal = match byte {
                b'!'..=b'<' | b'>'..=b'~' => true,
                b' ' | b'\t' => !is_last,
                _ => false,
            };
            let width = if literal { 1 } else { 3 };

            // Leave room for the '=' of a soft break.
            if line_length + width > MAX_LINE_LENGTH - 1 {
                result.push_str("=\r\n");
                line_length = 0;
            }

            if literal {
                result.push(byte as char);
            } else {
                let _ = write!(result, "={byte:02X}");
            }
            line_length += width;
        }

        if lines.peek().is_some() {
            result.push_str("\r\n");
        }
    }

    result
}

/// Encodes header text as RFC 2047 encoded words when it is not plain
/// printable ASCII.
///
/// Words are split on character boundaries so that none exceeds the
/// 75-character limit, and joined with folding whitespace.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if !needs_encoding(text) {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk_start = 0;
    let mut chunk_len = 0;
    for (idx, ch) in text.char_indices() {
        if chunk_len + ch.len_utf8() > MAX_WORD_BYTES {
            words.push(&text[chunk_start..idx]);
            chunk_start = idx;
            chunk_len = 0;
        }
        chunk_len += ch.len_utf8();
    }
    words.push(&text[chunk_start..]);

    words
        .into_iter()
        .map(|w| format!("=?utf-8?B?{}?=", encode_base64(w.as_bytes())))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Returns true if header text must be wrapped in encoded words.
#[must_use]
pub fn needs_encoding(text: &str) -> bool {
    text.chars()
        .any(|c| !(c.is_ascii_graphic() || c == ' ' || c == '\t'))
        || text.contains("=?")
}

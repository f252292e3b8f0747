//! MIME header handling.

use crate::error::{Error, Result};
use std::fmt;

/// Column after which header lines are folded.
const FOLD_AT: usize = 78;

/// Ordered collection of header fields.
///
/// Names are matched case-insensitively but written as given; insertion
/// order is the output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header field.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid field name or the value
    /// contains a bare CR or LF (header injection).
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        validate(&name, &value)?;
        self.fields.push((name, value));
        Ok(())
    }

    /// Sets a header field, replacing every existing value.
    ///
    /// # Errors
    ///
    /// Same as [`Headers::add`].
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.remove(&name);
        self.add(name, value)
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Moves every field of `other` to the end of this collection.
    pub fn extend(&mut self, other: Self) {
        self.fields.extend(other.fields);
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns an iterator over all fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

fn validate(name: &str, value: &str) -> Result<()> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic() && b != b':') {
        return Err(Error::InvalidHeader(format!("invalid field name {name:?}")));
    }

    // Pre-folded values (CRLF followed by whitespace) are allowed; anything
    // else that would start a new line is not.
    let bytes = value.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        let ok = match b {
            b'\r' => bytes.get(i + 1) == Some(&b'\n'),
            b'\n' => {
                i > 0
                    && bytes[i - 1] == b'\r'
                    && matches!(bytes.get(i + 1), Some(b' ' | b'\t'))
            }
            _ => true,
        };
        if !ok {
            return Err(Error::InvalidHeader(format!(
                "line break in value of {name}"
            )));
        }
    }
    Ok(())
}

/// Folds one logical header line at whitespace so physical lines stay near
/// 78 columns. Unbreakable runs are left long.
fn fold(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 8);
    for (n, physical) in line.split("\r\n").enumerate() {
        if n > 0 {
            out.push_str("\r\n");
        }
        let mut rest = physical;
        while rest.len() > FOLD_AT {
            let window = &rest[..floor_char_boundary(rest, FOLD_AT)];
            // Never fold right after the field name's colon or at column 0.
            let Some(at) = window.rfind(' ').filter(|&at| at > 0 && !window[..at].ends_with(':'))
            else {
                break;
            };
            out.push_str(&rest[..at]);
            out.push_str("\r\n");
            rest = &rest[at..];
        }
        out.push_str(rest);
    }
    out
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.fields {
            write!(f, "{}\r\n", fold(&format!("{name}: {value}")))?;
        }
        Ok(())
    }
}

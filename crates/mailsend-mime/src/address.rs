//! RFC 5322 mailboxes and address lists.

use crate::encoding::{encode_rfc2047, needs_encoding};
use crate::error::{Error, Result};
use std::fmt;

/// A mailbox: optional display name plus `local@domain` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox {
    /// Display name, if any.
    pub name: Option<String>,
    /// Address spec.
    pub email: String,
}

impl Mailbox {
    /// Creates a mailbox from an address and optional display name.
    ///
    /// An empty name is treated as no name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is not a valid
    /// `local@domain` spec.
    pub fn new(email: impl Into<String>, name: Option<&str>) -> Result<Self> {
        let email = email.into().trim().to_string();
        validate_addr_spec(&email)?;
        Ok(Self {
            name: name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
            email,
        })
    }

    /// Parses a single mailbox such as `"Doe, John" <john@example.com>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the input is not exactly one
    /// mailbox.
    pub fn parse(input: &str) -> Result<Self> {
        let mut list = parse_mailbox_list(input)?;
        match list.len() {
            1 => Ok(list.remove(0)),
            0 => Err(Error::InvalidAddress("empty address".into())),
            n => Err(Error::InvalidAddress(format!(
                "expected one address, found {n}"
            ))),
        }
    }

    /// Returns the domain part of the address.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.email.rsplit_once('@').map_or("", |(_, d)| d)
    }
}

impl fmt::Display for Mailbox {
    /// Header form: the display name is RFC 2047 encoded when non-ASCII and
    /// quoted when it contains specials.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(name) = &self.name else {
            return f.write_str(&self.email);
        };

        if needs_encoding(name) {
            write!(f, "{} <{}>", encode_rfc2047(name), self.email)
        } else if name.chars().all(is_atext_or_space) {
            write!(f, "{name} <{}>", self.email)
        } else {
            f.write_str("\"")?;
            for c in name.chars() {
                if c == '"' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
            write!(f, "\" <{}>", self.email)
        }
    }
}

/// Formats a list of mailboxes for a header value.
#[must_use]
pub fn format_mailbox_list(list: &[Mailbox]) -> String {
    list.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses a comma-separated address list.
///
/// Commas only separate entries at the top level: inside a quoted display
/// name, a comment, or an angle-bracketed address they are literal. Group
/// syntax (`Team: a@x.com, b@y.com;`) is flattened into its members. Empty
/// entries are skipped, so an empty input yields an empty list.
///
/// The list is rejected as a whole if any entry is malformed.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] naming the first bad entry.
pub fn parse_mailbox_list(input: &str) -> Result<Vec<Mailbox>> {
    split_top_level(input)?
        .into_iter()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_entry)
        .collect()
}

/// Splits at top-level commas and group delimiters.
fn split_top_level(input: &str) -> Result<Vec<&str>> {
    let mut entries = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut in_angle = false;
    let mut comment_depth = 0usize;
    let mut in_group = false;

    for (idx, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes || comment_depth > 0 => escaped = true,
            '"' if comment_depth == 0 => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '(' => comment_depth += 1,
            ')' if comment_depth > 0 => comment_depth -= 1,
            ')' => return Err(unbalanced(input, "')'")),
            _ if comment_depth > 0 => {}
            '<' if !in_angle => in_angle = true,
            '>' if in_angle => in_angle = false,
            _ if in_angle => {}
            ':' if !in_group => {
                // Group display name: not an address, discard it.
                in_group = true;
                start = idx + 1;
            }
            ';' if in_group => {
                entries.push(&input[start..idx]);
                in_group = false;
                start = idx + 1;
            }
            ',' => {
                entries.push(&input[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }

    if in_quotes {
        return Err(unbalanced(input, "quote"));
    }
    if comment_depth > 0 {
        return Err(unbalanced(input, "'('"));
    }
    if in_angle {
        return Err(unbalanced(input, "'<'"));
    }
    if in_group {
        return Err(unbalanced(input, "group (missing ';')"));
    }

    entries.push(&input[start..]);
    Ok(entries)
}

fn unbalanced(input: &str, what: &str) -> Error {
    Error::InvalidAddress(format!("unbalanced {what} in {input:?}"))
}

/// Parses one entry: `addr`, `name <addr>`, `"quoted" <addr>`, or
/// `addr (comment)`.
fn parse_entry(entry: &str) -> Result<Mailbox> {
    let (text, comment) = strip_comments(entry);
    let text = text.trim();

    let Some(open) = find_unquoted(text, '<') else {
        if text.contains(char::is_whitespace) {
            return Err(Error::InvalidAddress(format!(
                "display name without <address>: {entry:?}"
            )));
        }
        return Mailbox::new(text, comment.as_deref());
    };

    let close = text[open..]
        .find('>')
        .map(|i| open + i)
        .ok_or_else(|| unbalanced(entry, "'<'"))?;
    if !text[close + 1..].trim().is_empty() {
        return Err(Error::InvalidAddress(format!(
            "unexpected text after address: {entry:?}"
        )));
    }

    let name = unquote_phrase(text[..open].trim())?;
    let name = name.or(comment);
    Mailbox::new(text[open + 1..close].trim(), name.as_deref())
}

/// Removes comments outside quoted strings, returning the rest and the
/// text of the last comment (legacy `addr (Name)` form).
fn strip_comments(entry: &str) -> (String, Option<String>) {
    let mut out = String::with_capacity(entry.len());
    let mut comment = String::new();
    let mut last_comment = None;
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;

    for c in entry.chars() {
        if escaped {
            escaped = false;
            if depth > 0 {
                comment.push(c);
            } else {
                out.push(c);
            }
            continue;
        }
        match c {
            '\\' if in_quotes || depth > 0 => {
                escaped = true;
                if depth == 0 {
                    out.push(c);
                }
            }
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                out.push(c);
            }
            '(' if !in_quotes => {
                if depth > 0 {
                    comment.push(c);
                }
                depth += 1;
            }
            ')' if !in_quotes && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let text = comment.trim().to_string();
                    if !text.is_empty() {
                        last_comment = Some(text);
                    }
                    comment.clear();
                    out.push(' ');
                } else {
                    comment.push(c);
                }
            }
            _ if depth > 0 => comment.push(c),
            _ => out.push(c),
        }
    }

    (out, last_comment)
}

/// Finds `target` outside quoted strings.
fn find_unquoted(text: &str, target: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (idx, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == target && !in_quotes => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Turns a display-name phrase into plain text: quoted parts are unescaped,
/// runs of whitespace collapse to one space.
fn unquote_phrase(phrase: &str) -> Result<Option<String>> {
    let mut out = String::with_capacity(phrase.len());
    let mut in_quotes = false;
    let mut escaped = false;

    for c in phrase.chars() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if !in_quotes && "<>@,;:[]".contains(c) => {
                return Err(Error::InvalidAddress(format!(
                    "special character {c:?} in unquoted display name {phrase:?}"
                )));
            }
            c => out.push(c),
        }
    }

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok(Some(collapsed).filter(|s| !s.is_empty()))
}

const fn is_atext_or_space(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c == ' '
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '/' | '=' | '?' | '^' | '_'
                | '`' | '{' | '|' | '}' | '~'
        )
}

/// Checks `local@domain` syntax.
///
/// The local part may be a quoted string; the domain may be a bracketed
/// literal. Whitespace, control characters and specials outside those forms
/// are rejected.
fn validate_addr_spec(addr: &str) -> Result<()> {
    let invalid = |why: &str| Err(Error::InvalidAddress(format!("{why}: {addr:?}")));

    let Some((local, domain)) = addr.rsplit_once('@') else {
        return invalid("missing '@'");
    };
    if local.is_empty() {
        return invalid("empty local part");
    }
    if domain.is_empty() {
        return invalid("empty domain");
    }
    if addr.chars().any(char::is_control) {
        return invalid("control character");
    }

    let quoted_local = local.len() >= 2 && local.starts_with('"') && local.ends_with('"');
    if !quoted_local
        && (local.starts_with('.')
            || local.ends_with('.')
            || local.contains("..")
            || !local.chars().all(|c| c == '.' || !is_special_or_space(c)))
    {
        return invalid("invalid local part");
    }

    let literal_domain = domain.starts_with('[') && domain.ends_with(']');
    if !literal_domain
        && (domain.starts_with('.')
            || domain.ends_with('.')
            || domain.contains("..")
            || !domain
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '.'))
    {
        return invalid("invalid domain");
    }

    Ok(())
}

fn is_special_or_space(c: char) -> bool {
    c.is_whitespace() || "()<>[]:;@\\,\"".contains(c)
}

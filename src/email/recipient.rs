//! Recipient resolution: raw `To` header to a canonical address.

use std::sync::LazyLock;

use regex::Regex;

use crate::email::types::CanonicalAddress;
use crate::error::AddressError;

static ANGLE_ADDR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\s*([^<>]*?)\s*>").expect("valid angle-address regex"));

static BARE_ADDR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[^\s@<>()\[\],;:"\\]+@[^\s@<>()\[\],;:"\\]+$"#).expect("valid address regex")
});

static QUOTED_ADDR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"(?:[^"\\]|\\.)+"@[^\s@<>()\[\],;:"\\]+$"#).expect("valid quoted address regex")
});

/// Resolve the first address of a `To` header to a lowercase bare address.
///
/// Accepts `Display Name <addr@domain>`, `"Quoted, Name" <addr@domain>`,
/// `addr@domain (comment)`, plain `addr@domain` and quoted local parts such
/// as `"john doe"@domain`. Only the first address of a list is used.
pub fn resolve(to_header: Option<&str>) -> Result<CanonicalAddress, AddressError> {
    let header = to_header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(AddressError::MissingHeader)?;

    let unresolvable = || AddressError::Unresolvable {
        header: header.to_string(),
    };

    let cleaned = strip_quotes_and_comments(header);
    let first = first_mailbox(&cleaned);

    let candidate = match ANGLE_ADDR.captures(first) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => strip_group_name(first).trim(),
    };

    // Obsolete source routes: <@relay.example:user@example.com>
    let candidate = match candidate.rsplit_once(':') {
        Some((route, addr)) if route.starts_with('@') => addr,
        _ => candidate,
    };

    if BARE_ADDR.is_match(candidate) || QUOTED_ADDR.is_match(candidate) {
        Ok(CanonicalAddress::new_unchecked(candidate.to_lowercase()))
    } else {
        Err(unresolvable())
    }
}

/// Drop quoted display names and parenthesised comments, honouring backslash
/// escapes. A quoted string directly followed by `@` is a local part and stays.
fn strip_quotes_and_comments(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    let mut quoted: Option<String> = None;
    let mut comment_depth = 0usize;
    let mut chars = header.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(buf) = quoted.as_mut() {
            match ch {
                '\\' => {
                    buf.push(ch);
                    if let Some(next) = chars.next() {
                        buf.push(next);
                    }
                }
                '"' => {
                    buf.push(ch);
                    if chars.peek() == Some(&'@') {
                        out.push_str(buf);
                    }
                    quoted = None;
                }
                _ => buf.push(ch),
            }
            continue;
        }

        if comment_depth > 0 {
            match ch {
                '\\' => {
                    chars.next();
                }
                '(' => comment_depth += 1,
                ')' => {
                    comment_depth -= 1;
                    if comment_depth == 0 {
                        out.push(' ');
                    }
                }
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => quoted = Some(String::from('"')),
            '(' => comment_depth += 1,
            _ => out.push(ch),
        }
    }
    out
}

/// The first comma-separated mailbox, ignoring commas inside `<...>` or a
/// quoted local part.
fn first_mailbox(list: &str) -> &str {
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut escaped = false;
    for (idx, ch) in list.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quote => escaped = true,
            '"' => in_quote = !in_quote,
            _ if in_quote => {}
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return &list[..idx],
            _ => {}
        }
    }
    list
}

/// `Team: a@x.com` → `a@x.com`; group terminator `;` is dropped.
fn strip_group_name(mailbox: &str) -> &str {
    let mailbox = mailbox.trim().trim_end_matches(';');
    match mailbox.find(':') {
        Some(idx) if !mailbox[..idx].contains('"') => &mailbox[idx + 1..],
        _ => mailbox,
    }
}

//! MIME extraction: subject, raw `To` header and a single body string.

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};

use crate::email::types::ParsedEmail;
use crate::error::ParseError;

/// Subject used when the message has none.
pub const NO_SUBJECT: &str = "(No Subject)";

/// Parse a raw RFC 5322 message.
///
/// Body selection walks the MIME tree in document order: the first
/// `text/html` part wins outright, otherwise the first `text/plain` part.
/// A single-part message uses its own content whatever its type.
pub fn extract(raw: &[u8]) -> Result<ParsedEmail, ParseError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::UnparsableMessage("empty message".to_string()));
    }

    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| ParseError::UnparsableMessage("no parsable headers".to_string()))?;

    let subject = message
        .subject()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_SUBJECT)
        .to_string();

    let to_header = message
        .header_raw("To")
        .map(unfold_header)
        .filter(|s| !s.is_empty());

    let body = select_body(&message);

    Ok(ParsedEmail {
        subject,
        to_header,
        body,
    })
}

fn select_body(message: &Message<'_>) -> String {
    let Some(root) = message.parts.first() else {
        return String::new();
    };
    if !matches!(root.body, PartType::Multipart(_)) {
        return part_content(root);
    }

    let mut parts = Vec::new();
    walk(message, &mut parts);

    let mut plain: Option<String> = None;
    for part in parts {
        match mime_type(part) {
            (ctype, subtype) if ctype == "text" && subtype == "html" => {
                return part_content(part);
            }
            (ctype, subtype) if ctype == "text" && subtype == "plain" && plain.is_none() => {
                plain = Some(part_content(part));
            }
            _ => {}
        }
    }
    plain.unwrap_or_default()
}

/// Collect every part in document order, descending into attached messages.
fn walk<'a, 'x>(message: &'a Message<'x>, out: &mut Vec<&'a MessagePart<'x>>) {
    for part in &message.parts {
        out.push(part);
        if let PartType::Message(inner) = &part.body {
            walk(inner, out);
        }
    }
}

/// Lowercased (type, subtype). Parts without a Content-Type are `text/plain`.
fn mime_type(part: &MessagePart<'_>) -> (String, String) {
    match part.content_type() {
        Some(ct) => (
            ct.ctype().to_ascii_lowercase(),
            ct.subtype().unwrap_or_default().to_ascii_lowercase(),
        ),
        None => ("text".to_string(), "plain".to_string()),
    }
}

fn part_content(part: &MessagePart<'_>) -> String {
    match part.text_contents() {
        Some(text) => text.to_string(),
        None => String::from_utf8_lossy(part.contents()).into_owned(),
    }
}

/// Undo header folding and trim surrounding whitespace.
fn unfold_header(raw: &str) -> String {
    raw.split(['\r', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

//! Raw message bytes → owned [`MimeNode`] tree.
//!
//! `mail-parser` does the heavy lifting (boundaries, transfer encodings,
//! charsets); this module turns its flat part table into a recursive tree.

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::warn;

use crate::model::mime::{MimeNode, MimePart, PartBody};
use crate::parser::header::find_header_end;

/// Maximum nesting depth kept from adversarial input; deeper parts are dropped.
const MAX_DEPTH: usize = 32;

/// Parse a complete raw message into a MIME tree.
///
/// Never fails: when `mail-parser` gives up, everything after the header
/// block is treated as a single `text/plain` body.
pub fn parse_mime(raw_message: &[u8]) -> MimeNode {
    match MessageParser::default().parse(raw_message) {
        Some(message) => message_root(&message, 0),
        None => {
            warn!(len = raw_message.len(), "Unparseable message, using raw body");
            fallback_body(raw_message)
        }
    }
}

fn message_root(message: &Message<'_>, depth: usize) -> MimeNode {
    match message.parts.first() {
        Some(_) => build_node(message, 0, depth),
        None => MimeNode::Part(MimePart {
            content_type: "text/plain".to_string(),
            body: PartBody::Text(String::new()),
        }),
    }
}

fn build_node(message: &Message<'_>, part_id: usize, depth: usize) -> MimeNode {
    let Some(part) = message.parts.get(part_id) else {
        return undecodable("application/octet-stream");
    };
    let content_type = declared_type(part);

    if depth >= MAX_DEPTH {
        warn!(depth, content_type, "MIME nesting too deep, dropping part");
        return undecodable(&content_type);
    }

    match &part.body {
        PartType::Multipart(children) => MimeNode::Multipart {
            content_type,
            children: children
                .iter()
                .map(|&child| build_node(message, child, depth + 1))
                .collect(),
        },
        PartType::Message(nested) => MimeNode::Multipart {
            content_type,
            children: vec![message_root(nested, depth + 1)],
        },
        PartType::Text(text) | PartType::Html(text) => {
            let body = if part.is_encoding_problem {
                PartBody::Undecodable
            } else {
                PartBody::Text(text.to_string())
            };
            MimeNode::Part(MimePart { content_type, body })
        }
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            let body = match (content_type.starts_with("text/"), part.is_encoding_problem) {
                (_, true) => PartBody::Undecodable,
                // A text part mail-parser could not decode as text: accept it only if it is UTF-8.
                (true, false) => match std::str::from_utf8(bytes) {
                    Ok(text) => PartBody::Text(text.to_string()),
                    Err(_) => PartBody::Undecodable,
                },
                (false, false) => PartBody::Binary(bytes.to_vec()),
            };
            MimeNode::Part(MimePart { content_type, body })
        }
    }
}

/// Lower-cased `type/subtype` from the part headers.
///
/// Parts without a `Content-Type` get the RFC 2045 default for their body.
fn declared_type(part: &MessagePart<'_>) -> String {
    match part.content_type() {
        Some(ct) => match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub).to_lowercase(),
            None => ct.ctype().to_lowercase(),
        },
        None => match &part.body {
            PartType::Html(_) => "text/html".to_string(),
            PartType::Message(_) => "message/rfc822".to_string(),
            PartType::Binary(_) | PartType::InlineBinary(_) => {
                "application/octet-stream".to_string()
            }
            PartType::Multipart(_) => "multipart/mixed".to_string(),
            PartType::Text(_) => "text/plain".to_string(),
        },
    }
}

fn undecodable(content_type: &str) -> MimeNode {
    MimeNode::Part(MimePart {
        content_type: content_type.to_string(),
        body: PartBody::Undecodable,
    })
}

/// Everything after the first blank line, as one plain-text part.
fn fallback_body(data: &[u8]) -> MimeNode {
    let body = match find_header_end(data) {
        Some(pos) => {
            let rest = &data[pos..];
            let skip = if rest.starts_with(b"\r\n\r\n") { 4 } else { 2 };
            String::from_utf8_lossy(&rest[skip..]).into_owned()
        }
        None => String::new(),
    };
    MimeNode::Part(MimePart {
        content_type: "text/plain".to_string(),
        body: PartBody::Text(body),
    })
}

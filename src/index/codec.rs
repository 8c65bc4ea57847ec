//! Header metadata ⇄ object tags.
//!
//! Tag values must be short, transport-safe ASCII. The subject is stored
//! base64-encoded; sender and recipient are reduced to their address part.
//! Both directions are total: bad input degrades, it never fails.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::warn;

use crate::model::address::first_address;
use crate::model::tags::{TagSet, FROM_TAG, SUBJECT_TAG, TO_TAG};

/// Shown when the `From` tag is missing or empty.
pub const DEFAULT_SENDER: &str = "Unknown Sender";
/// Shown when the `Subject` tag is missing, empty or not decodable.
pub const DEFAULT_SUBJECT: &str = "No Subject";

/// Longest tag value the backend accepts.
pub const MAX_TAG_VALUE_LEN: usize = 256;
/// Largest subject (UTF-8 bytes) whose base64 form fits in one tag value.
pub const MAX_SUBJECT_BYTES: usize = MAX_TAG_VALUE_LEN / 4 * 3;

/// A tag set with every field resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTags {
    pub sender: String,
    pub subject: String,
    /// Every tag other than `From` and `Subject`, untouched.
    pub rest: TagSet,
}

impl DecodedTags {
    /// The `To` tag, when present and non-empty.
    pub fn recipient(&self) -> Option<&str> {
        self.rest.get(TO_TAG).filter(|to| !to.is_empty())
    }
}

/// Decode a tag set read from the backend.
pub fn decode(tags: &TagSet) -> DecodedTags {
    let mut rest = tags.clone();
    let from = rest.remove(FROM_TAG);
    let subject = rest.remove(SUBJECT_TAG);

    let sender = from
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_SENDER.to_string());

    let subject = subject
        .as_deref()
        .and_then(decode_subject)
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

    DecodedTags {
        sender,
        subject,
        rest,
    }
}

fn decode_subject(encoded: &str) -> Option<String> {
    if encoded.is_empty() {
        return None;
    }
    let decoded = STANDARD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());
    if decoded.is_none() {
        warn!(tag = SUBJECT_TAG, value = encoded, "Undecodable subject tag, using default");
    }
    decoded.filter(|s| !s.is_empty())
}

/// Build the tag set for a message from its raw (RFC 2047-decoded) headers.
///
/// Absent headers produce no tag; unparsable address headers produce `""`.
pub fn encode(from: Option<&str>, subject: Option<&str>, to: Option<&str>) -> TagSet {
    let mut tags = TagSet::new();
    if let Some(subject) = subject {
        let fitted = truncate_utf8(subject, MAX_SUBJECT_BYTES);
        tags.insert(SUBJECT_TAG, STANDARD.encode(fitted.as_bytes()));
    }
    if let Some(from) = from {
        tags.insert(FROM_TAG, address_value(from));
    }
    if let Some(to) = to {
        tags.insert(TO_TAG, address_value(to));
    }
    tags
}

fn address_value(header: &str) -> String {
    first_address(header)
        .chars()
        .filter(|&c| is_tag_safe(c))
        .take(MAX_TAG_VALUE_LEN)
        .collect()
}

fn is_tag_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '+' | '-' | '=' | '.' | '_' | ':' | '/' | '@')
}

/// Longest prefix of `s` that is at most `max` bytes and ends on a char boundary.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

//! Mailbox listing entries and rendered messages.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::mime::MimeNode;
use super::tags::TagSet;

/// One row of the mailbox listing.
///
/// Built fresh for every request from the object descriptor and its tags;
/// `sender` and `subject` are always filled (defaults stand in for missing tags).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailboxEntry {
    /// Storage key of the message object.
    pub key: String,
    /// Sender address, or `"Unknown Sender"`.
    pub sender: String,
    /// Decoded subject, or `"No Subject"`.
    pub subject: String,
    /// Recipient address, when the `To` tag is present.
    pub recipient: Option<String>,
    /// Last-modified timestamp reported by the backend.
    pub last_modified: DateTime<Utc>,
    /// Object size in bytes.
    pub size: u64,
}

/// The displayable body picked out of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "body", rename_all = "lowercase")]
pub enum MessageContent {
    /// A `text/plain` part, verbatim.
    Text(String),
    /// A `text/html` part after sanitizing and linkifying.
    Html(String),
    /// Nothing renderable was found.
    Empty,
}

impl MessageContent {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Html(s) => s,
            Self::Empty => "",
        }
    }

    pub fn is_html(&self) -> bool {
        matches!(self, Self::Html(_))
    }
}

/// A single message ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedMessage {
    pub entry: MailboxEntry,
    /// Tags other than `From`/`Subject`, as stored.
    pub extra_tags: TagSet,
    /// The parsed MIME structure.
    #[serde(skip)]
    pub mime: MimeNode,
    pub content: MessageContent,
}

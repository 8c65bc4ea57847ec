//! Single-message fetch, render and delete.

use std::sync::Arc;

use tracing::{debug, info};

use super::backend::ObjectBackend;
use crate::error::Result;
use crate::index::codec;
use crate::model::mail::{MailboxEntry, RenderedMessage};
use crate::parser::content::ContentExtractor;
use crate::parser::mime;

/// Reads and deletes individual messages by storage key.
///
/// Tags are always fetched fresh here; only listings go through the cache.
pub struct MessageStore {
    backend: Arc<dyn ObjectBackend>,
    extractor: ContentExtractor,
}

impl MessageStore {
    pub fn new(backend: Arc<dyn ObjectBackend>) -> Self {
        Self {
            backend,
            extractor: ContentExtractor::new(),
        }
    }

    /// Fetch, parse and render the message at `key`.
    pub fn get(&self, key: &str) -> Result<RenderedMessage> {
        let object = self.backend.get_object(key)?;
        let tags = self.backend.get_object_tags(key)?;
        debug!(key, size = object.bytes.len(), tags = tags.len(), "Fetched message");

        let decoded = codec::decode(&tags);
        let tree = mime::parse_mime(&object.bytes);
        let content = self.extractor.extract(&tree);

        let entry = MailboxEntry {
            key: key.to_string(),
            recipient: decoded.recipient().map(str::to_string),
            sender: decoded.sender,
            subject: decoded.subject,
            last_modified: object.last_modified,
            size: object.bytes.len() as u64,
        };

        Ok(RenderedMessage {
            entry,
            extra_tags: decoded.rest,
            mime: tree,
            content,
        })
    }

    /// Delete the message at `key`. Tags go with the object.
    ///
    /// Deleting a key that is already gone succeeds.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.backend.delete_object(key)?;
        info!(key, "Deleted message");
        Ok(())
    }
}

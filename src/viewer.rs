//! The mailbox as the presentation layer sees it: list, view, delete.

use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::index::cache::MetadataCache;
use crate::index::mailbox::MailboxIndex;
use crate::model::mail::{MailboxEntry, RenderedMessage};
use crate::store::backend::ObjectBackend;
use crate::store::message::MessageStore;

/// One mailbox namespace over a backend, sharing a tag cache across requests.
///
/// Safe to share between threads; every call is independent.
pub struct Mailbox {
    namespace: String,
    index: MailboxIndex,
    store: MessageStore,
    cache: Arc<MetadataCache>,
}

impl Mailbox {
    pub fn new(
        backend: Arc<dyn ObjectBackend>,
        cache: Arc<MetadataCache>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            index: MailboxIndex::new(backend.clone(), cache.clone()),
            store: MessageStore::new(backend),
            cache,
        }
    }

    /// Build from configuration with a fresh cache.
    pub fn from_config(backend: Arc<dyn ObjectBackend>, config: &Config) -> Self {
        let cache = Arc::new(MetadataCache::new(
            config.cache.capacity,
            config.cache.ttl(),
        ));
        Self::new(backend, cache, config.storage.mailbox_prefix.clone())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// All messages, newest first.
    pub fn list(&self) -> Result<Vec<MailboxEntry>> {
        self.index.list(&self.namespace)
    }

    /// Render one message. Fails with `NotFound` if it is gone.
    pub fn view(&self, key: &str) -> Result<RenderedMessage> {
        self.store.get(key)
    }

    /// Delete one message and forget its cached tags.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(key)?;
        self.cache.invalidate(key);
        debug!(key, "Dropped cached tags for deleted message");
        Ok(())
    }
}

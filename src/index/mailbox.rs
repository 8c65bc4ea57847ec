//! Mailbox listing derived from object tags.

use std::sync::Arc;

use tracing::{info, warn};

use super::cache::MetadataCache;
use super::codec;
use crate::error::Result;
use crate::model::mail::MailboxEntry;
use crate::model::tags::TagSet;
use crate::store::backend::{ObjectBackend, ObjectListing, ObjectSummary};

/// Builds sorted mailbox listings.
///
/// A failing tag fetch for one object does not fail the listing: that entry
/// is shown with the default sender and subject, and the failure is not
/// cached. A failing listing page fails the whole call.
pub struct MailboxIndex {
    backend: Arc<dyn ObjectBackend>,
    cache: Arc<MetadataCache>,
}

impl MailboxIndex {
    pub fn new(backend: Arc<dyn ObjectBackend>, cache: Arc<MetadataCache>) -> Self {
        Self { backend, cache }
    }

    /// Every object under `namespace`, newest first.
    ///
    /// Objects with equal timestamps keep the backend's listing order.
    pub fn list(&self, namespace: &str) -> Result<Vec<MailboxEntry>> {
        let mut entries = Vec::new();
        for object in ObjectListing::new(self.backend.clone(), namespace) {
            entries.push(self.entry_for(object?));
        }

        entries.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        info!(namespace, count = entries.len(), "Listed mailbox");
        Ok(entries)
    }

    fn entry_for(&self, object: ObjectSummary) -> MailboxEntry {
        let backend = &self.backend;
        let tags = self
            .cache
            .get_or_fetch(&object.key, |key| backend.get_object_tags(key))
            .unwrap_or_else(|e| {
                warn!(key = %object.key, error = %e, "Tag fetch failed, showing defaults");
                TagSet::new()
            });

        let decoded = codec::decode(&tags);
        MailboxEntry {
            recipient: decoded.recipient().map(str::to_string),
            sender: decoded.sender,
            subject: decoded.subject,
            key: object.key,
            last_modified: object.last_modified,
            size: object.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::error::MailError;
    use crate::store::backend::{ListPage, StoredObject};
    use crate::store::memory::MemoryBackend;

    /// Fails the first `failures` tag fetches, then delegates.
    struct FlakyTags {
        inner: MemoryBackend,
        failures: AtomicUsize,
        fetches: AtomicUsize,
    }

    impl ObjectBackend for FlakyTags {
        fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ListPage> {
            self.inner.list_page(prefix, token)
        }
        fn get_object(&self, key: &str) -> Result<StoredObject> {
            self.inner.get_object(key)
        }
        fn get_object_tags(&self, key: &str) -> Result<TagSet> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(MailError::backend("get-tags", key, "throttled"));
            }
            self.inner.get_object_tags(key)
        }
        fn put_object_tags(&self, key: &str, tags: &TagSet) -> Result<()> {
            self.inner.put_object_tags(key, tags)
        }
        fn delete_object(&self, key: &str) -> Result<()> {
            self.inner.delete_object(key)
        }
    }

    fn tagged(backend: &MemoryBackend, key: &str, secs: i64, from: &str, subject: &str) {
        let ts = Utc.timestamp_opt(secs, 0).unwrap();
        backend.insert_at(key, b"x".to_vec(), ts);
        let tags: TagSet = [("From", from.to_string()), ("Subject", STANDARD.encode(subject))]
            .into_iter()
            .collect();
        backend.put_object_tags(key, &tags).expect("tags");
    }

    fn index(backend: Arc<MemoryBackend>) -> MailboxIndex {
        MailboxIndex::new(backend, Arc::new(MetadataCache::new(64, None)))
    }

    #[test]
    fn test_sorted_newest_first() {
        let backend = Arc::new(MemoryBackend::with_page_size(2));
        tagged(&backend, "email/a", 100, "a@x.com", "oldest");
        tagged(&backend, "email/b", 300, "b@x.com", "newest");
        tagged(&backend, "email/c", 200, "c@x.com", "middle");

        let entries = index(backend).list("email/").expect("list");
        let subjects: Vec<&str> = entries.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["newest", "middle", "oldest"]);
        assert_eq!(entries[0].sender, "b@x.com");
    }

    #[test]
    fn test_untagged_object_gets_defaults() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert("email/untagged", b"x".to_vec());

        let entries = index(backend).list("email/").expect("list");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sender, codec::DEFAULT_SENDER);
        assert_eq!(entries[0].subject, codec::DEFAULT_SUBJECT);
    }

    #[test]
    fn test_namespace_filter() {
        let backend = Arc::new(MemoryBackend::new());
        tagged(&backend, "email/a", 1, "a@x.com", "in");
        tagged(&backend, "spool/b", 2, "b@x.com", "out");

        let entries = index(backend).list("email/").expect("list");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "email/a");
    }

    #[test]
    fn test_equal_timestamps_keep_listing_order() {
        let backend = Arc::new(MemoryBackend::new());
        for key in ["email/1", "email/2", "email/3"] {
            tagged(&backend, key, 50, "a@x.com", key);
        }
        let entries = index(backend).list("email/").expect("list");
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["email/1", "email/2", "email/3"]);
    }

    #[test]
    fn test_failed_tag_fetch_shows_defaults_then_recovers() {
        let inner = MemoryBackend::new();
        tagged(&inner, "email/a", 10, "a@x.com", "hello");
        let backend = Arc::new(FlakyTags {
            inner,
            failures: AtomicUsize::new(1),
            fetches: AtomicUsize::new(0),
        });
        let index = MailboxIndex::new(backend.clone(), Arc::new(MetadataCache::new(8, None)));

        let first = index.list("email/").expect("listing survives a tag failure");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].sender, codec::DEFAULT_SENDER);
        assert_eq!(first[0].subject, codec::DEFAULT_SUBJECT);

        let second = index.list("email/").expect("list");
        assert_eq!(second[0].sender, "a@x.com");
        assert_eq!(second[0].subject, "hello");
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 2);

        index.list("email/").expect("list");
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 2);
    }
}

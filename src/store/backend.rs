//! The object storage contract and a lazy listing over it.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::tags::TagSet;

/// One object as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    /// Token for the next page; `None` on the last page.
    pub next: Option<String>,
}

/// A fetched object body.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub last_modified: DateTime<Utc>,
}

/// Blob storage with per-object tags.
///
/// Implementations report a missing object as [`MailError::NotFound`] and any
/// other failure as [`MailError::BackendUnavailable`]. Retries, if any, belong
/// to the implementation.
///
/// [`MailError::NotFound`]: crate::error::MailError::NotFound
/// [`MailError::BackendUnavailable`]: crate::error::MailError::BackendUnavailable
pub trait ObjectBackend: Send + Sync {
    /// One page of the objects whose key starts with `prefix`.
    fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ListPage>;

    fn get_object(&self, key: &str) -> Result<StoredObject>;

    /// Tags of an object; an empty set when it has none.
    fn get_object_tags(&self, key: &str) -> Result<TagSet>;

    /// Replace all tags of an object.
    fn put_object_tags(&self, key: &str, tags: &TagSet) -> Result<()>;

    /// Delete an object. Deleting a missing object succeeds.
    fn delete_object(&self, key: &str) -> Result<()>;
}

/// Every object under a prefix, fetched one page at a time as iteration
/// proceeds.
///
/// Finite and single-use. A page error is yielded once and ends the listing.
pub struct ObjectListing {
    backend: Arc<dyn ObjectBackend>,
    prefix: String,
    buffered: std::vec::IntoIter<ObjectSummary>,
    next: Option<String>,
    done: bool,
}

impl ObjectListing {
    pub fn new(backend: Arc<dyn ObjectBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            buffered: Vec::new().into_iter(),
            next: None,
            done: false,
        }
    }

    fn fetch_page(&mut self) -> Result<()> {
        let page = self.backend.list_page(&self.prefix, self.next.as_deref())?;
        tracing::debug!(
            prefix = %self.prefix,
            count = page.objects.len(),
            more = page.next.is_some(),
            "Fetched listing page"
        );
        self.done = page.next.is_none();
        self.next = page.next;
        self.buffered = page.objects.into_iter();
        Ok(())
    }
}

impl Iterator for ObjectListing {
    type Item = Result<ObjectSummary>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(object) = self.buffered.next() {
                return Some(Ok(object));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

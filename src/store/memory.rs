//! In-process object store with S3-style tag limits.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::backend::{ListPage, ObjectBackend, ObjectSummary, StoredObject};
use crate::error::{MailError, Result};
use crate::index::codec::MAX_TAG_VALUE_LEN;
use crate::model::tags::TagSet;

const DEFAULT_PAGE_SIZE: usize = 1000;
const MAX_TAGS: usize = 10;
const MAX_TAG_KEY_LEN: usize = 128;

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    last_modified: DateTime<Utc>,
    tags: TagSet,
}

/// A bucket held in memory. Keys list in lexicographic order.
#[derive(Debug)]
pub struct MemoryBackend {
    objects: RwLock<BTreeMap<String, Entry>>,
    page_size: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Store an object stamped with the current time, dropping any tags.
    pub fn insert(&self, key: &str, bytes: Vec<u8>) {
        self.insert_at(key, bytes, Utc::now());
    }

    /// Store an object with an explicit last-modified time, dropping any tags.
    pub fn insert_at(&self, key: &str, bytes: Vec<u8>, last_modified: DateTime<Utc>) {
        self.write().insert(
            key.to_string(),
            Entry {
                bytes,
                last_modified,
                tags: TagSet::new(),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Entry>> {
        self.objects.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Entry>> {
        self.objects.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectBackend for MemoryBackend {
    fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ListPage> {
        let objects = self.read();
        let start = match token {
            Some(after) => Bound::Excluded(after.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        let mut page: Vec<ObjectSummary> = objects
            .range((start, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(self.page_size + 1)
            .map(|(key, entry)| ObjectSummary {
                key: key.clone(),
                last_modified: entry.last_modified,
                size: entry.bytes.len() as u64,
            })
            .collect();

        let next = if page.len() > self.page_size {
            page.truncate(self.page_size);
            page.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects: page,
            next,
        })
    }

    fn get_object(&self, key: &str) -> Result<StoredObject> {
        self.read()
            .get(key)
            .map(|entry| StoredObject {
                bytes: entry.bytes.clone(),
                last_modified: entry.last_modified,
            })
            .ok_or_else(|| MailError::NotFound(key.to_string()))
    }

    fn get_object_tags(&self, key: &str) -> Result<TagSet> {
        self.read()
            .get(key)
            .map(|entry| entry.tags.clone())
            .ok_or_else(|| MailError::NotFound(key.to_string()))
    }

    fn put_object_tags(&self, key: &str, tags: &TagSet) -> Result<()> {
        check_tag_limits(key, tags)?;
        let mut objects = self.write();
        let entry = objects
            .get_mut(key)
            .ok_or_else(|| MailError::NotFound(key.to_string()))?;
        entry.tags = tags.clone();
        Ok(())
    }

    fn delete_object(&self, key: &str) -> Result<()> {
        self.write().remove(key);
        Ok(())
    }
}

fn check_tag_limits(key: &str, tags: &TagSet) -> Result<()> {
    let invalid = |reason: String| MailError::InvalidTagSet {
        key: key.to_string(),
        reason,
    };
    if tags.len() > MAX_TAGS {
        return Err(invalid(format!("{} tags, at most {MAX_TAGS} allowed", tags.len())));
    }
    for (name, value) in tags.iter() {
        if name.is_empty() || name.chars().count() > MAX_TAG_KEY_LEN {
            return Err(invalid(format!("tag name '{name}' has invalid length")));
        }
        if value.chars().count() > MAX_TAG_VALUE_LEN {
            return Err(invalid(format!("value of '{name}' exceeds {MAX_TAG_VALUE_LEN} chars")));
        }
    }
    Ok(())
}

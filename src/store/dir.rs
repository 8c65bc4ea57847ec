//! A bucket laid out on the local filesystem.
//!
//! Each object is a regular file at `<root>/<key>`. Its tags live in
//! `<root>/.tags/<key>.json` as a flat JSON object, so they disappear when
//! the object is deleted through this backend.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::backend::{ListPage, ObjectBackend, ObjectSummary, StoredObject};
use crate::error::{MailError, Result};
use crate::model::tags::TagSet;

const TAGS_DIR: &str = ".tags";
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Directory-backed [`ObjectBackend`].
#[derive(Debug, Clone)]
pub struct DirBackend {
    root: PathBuf,
    page_size: usize,
}

impl DirBackend {
    /// Open an existing directory as a bucket.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let meta = fs::metadata(&root).map_err(|e| MailError::io(&root, e))?;
        if !meta.is_dir() {
            return Err(MailError::io(
                &root,
                std::io::Error::new(ErrorKind::NotADirectory, "bucket root is not a directory"),
            ));
        }
        Ok(Self {
            root,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an object body, creating parent directories as needed.
    pub fn put_object(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| MailError::backend("put", key, e))?;
        }
        fs::write(&path, bytes).map_err(|e| MailError::backend("put", key, e))
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn tags_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(TAGS_DIR).join(format!("{key}.json")))
    }

    /// All object keys under the root, sorted.
    fn all_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        collect_keys(&self.root, "", &mut keys)?;
        keys.sort();
        Ok(keys)
    }
}

impl ObjectBackend for DirBackend {
    fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ListPage> {
        let mut objects = Vec::new();
        let mut next = None;

        let candidates = self
            .all_keys()?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| token.is_none_or(|after| key.as_str() > after));

        for key in candidates {
            if objects.len() == self.page_size {
                next = objects.last().map(|o: &ObjectSummary| o.key.clone());
                break;
            }
            let path = self.root.join(&key);
            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                // Deleted between the directory scan and now
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(MailError::backend("list", &key, e)),
            };
            objects.push(ObjectSummary {
                last_modified: modified_time(&meta),
                size: meta.len(),
                key,
            });
        }

        Ok(ListPage { objects, next })
    }

    fn get_object(&self, key: &str) -> Result<StoredObject> {
        let path = self.object_path(key)?;
        let bytes = fs::read(&path).map_err(|e| io_to_backend("get", key, e))?;
        let meta = fs::metadata(&path).map_err(|e| io_to_backend("get", key, e))?;
        Ok(StoredObject {
            bytes,
            last_modified: modified_time(&meta),
        })
    }

    fn get_object_tags(&self, key: &str) -> Result<TagSet> {
        if !self.object_path(key)?.is_file() {
            return Err(MailError::NotFound(key.to_string()));
        }
        match fs::read_to_string(self.tags_path(key)?) {
            Ok(json) => serde_json::from_str(&json).map_err(|e| MailError::backend("get-tags", key, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(TagSet::new()),
            Err(e) => Err(MailError::backend("get-tags", key, e)),
        }
    }

    fn put_object_tags(&self, key: &str, tags: &TagSet) -> Result<()> {
        if !self.object_path(key)?.is_file() {
            return Err(MailError::NotFound(key.to_string()));
        }
        let path = self.tags_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| MailError::backend("put-tags", key, e))?;
        }
        let json = serde_json::to_string(tags).map_err(|e| MailError::backend("put-tags", key, e))?;
        fs::write(&path, json).map_err(|e| MailError::backend("put-tags", key, e))
    }

    fn delete_object(&self, key: &str) -> Result<()> {
        for path in [self.object_path(key)?, self.tags_path(key)?] {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(MailError::backend("delete", key, e)),
            }
        }
        Ok(())
    }
}

/// Reject keys that would escape the root or collide with the tag store.
fn validate_key(key: &str) -> Result<()> {
    let bad_segment = key
        .split('/')
        .any(|seg| seg.is_empty() || seg == "." || seg == ".." || seg == TAGS_DIR);
    if key.is_empty() || bad_segment || key.contains('\\') || key.contains('\0') {
        return Err(MailError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn collect_keys(dir: &Path, prefix: &str, keys: &mut Vec<String>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| MailError::backend("list", prefix, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| MailError::backend("list", prefix, e))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if prefix.is_empty() && name == TAGS_DIR {
            continue;
        }
        let key = format!("{prefix}{name}");
        let file_type = entry
            .file_type()
            .map_err(|e| MailError::backend("list", &key, e))?;
        if file_type.is_dir() {
            collect_keys(&entry.path(), &format!("{key}/"), keys)?;
        } else if file_type.is_file() {
            keys.push(key);
        }
    }
    Ok(())
}

fn modified_time(meta: &fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or(DateTime::UNIX_EPOCH)
}

fn io_to_backend(op: &'static str, key: &str, e: std::io::Error) -> MailError {
    if e.kind() == ErrorKind::NotFound {
        MailError::NotFound(key.to_string())
    } else {
        MailError::backend(op, key, e)
    }
}

//! Centralized error types for blobmail.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the blobmail library.
///
/// Tag and MIME decode problems are not errors here: they degrade to
/// default values and are only logged.
#[derive(Error, Debug)]
pub enum MailError {
    /// The object does not exist in the backend.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Transport, permission or other backend failure. Not retried here.
    #[error("Storage backend failed during {op} of '{key}': {reason}")]
    BackendUnavailable {
        op: &'static str,
        key: String,
        reason: String,
    },

    /// The object key cannot be mapped onto the backend.
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// The backend rejected a tag set (too many tags, oversized values, ...).
    #[error("Invalid tag set for '{key}': {reason}")]
    InvalidTagSet { key: String, reason: String },

    /// A delivery notification could not be understood.
    #[error("Invalid delivery event: {0}")]
    InvalidEvent(String),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, MailError>`.
pub type Result<T> = std::result::Result<T, MailError>;

impl MailError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `BackendUnavailable` variant.
    pub fn backend(op: &'static str, key: impl Into<String>, reason: impl ToString) -> Self {
        Self::BackendUnavailable {
            op,
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// `true` when the error means "the object is gone".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_predicate() {
        assert!(MailError::NotFound("email/abc".into()).is_not_found());
        assert!(!MailError::backend("get", "email/abc", "timeout").is_not_found());
    }

    #[test]
    fn test_backend_message() {
        let err = MailError::backend("delete", "email/abc", "access denied");
        assert_eq!(
            err.to_string(),
            "Storage backend failed during delete of 'email/abc': access denied"
        );
    }
}

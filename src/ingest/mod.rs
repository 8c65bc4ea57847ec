//! Delivery-time tagging.
//!
//! Runs once per newly delivered message, independently of the viewer. It
//! reads the raw message, encodes its `From`/`To`/`Subject` headers and
//! writes them back as the object's tag set. That tag set is the only thing
//! the viewer later relies on.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{MailError, Result};
use crate::index::codec;
use crate::model::tags::TagSet;
use crate::parser::header::MessageHeaders;
use crate::store::backend::ObjectBackend;

/// Writes tag sets for freshly delivered messages.
pub struct IngestionTagger {
    backend: Arc<dyn ObjectBackend>,
    prefix: Option<String>,
}

impl IngestionTagger {
    /// `prefix` is the key prefix deliveries land under, without trailing slash.
    pub fn new(backend: Arc<dyn ObjectBackend>, prefix: Option<String>) -> Self {
        let prefix = prefix
            .map(|p| p.trim_end_matches('/').to_string())
            .filter(|p| !p.is_empty());
        Self { backend, prefix }
    }

    /// Storage key of a delivered message.
    pub fn object_key(&self, message_id: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{message_id}"),
            None => message_id.to_string(),
        }
    }

    /// Tag the message delivered as `message_id` and return what was written.
    ///
    /// Missing headers simply produce fewer tags. If the body cannot be
    /// read (other than because it does not exist) an empty tag set is still
    /// written so the viewer falls back to its defaults.
    pub fn tag_incoming(&self, message_id: &str) -> Result<TagSet> {
        let key = self.object_key(message_id);
        info!(message_id, key = %key, "Tagging delivered message");

        let headers = match self.backend.get_object(&key) {
            Ok(object) => MessageHeaders::parse(&object.bytes),
            Err(e) if e.is_not_found() => return Err(e),
            Err(e) => {
                warn!(key = %key, error = %e, "Could not read message, writing partial tags");
                MessageHeaders::default()
            }
        };

        let tags = codec::encode(
            headers.from.as_deref(),
            headers.subject.as_deref(),
            headers.to.as_deref(),
        );
        if tags.is_empty() {
            warn!(key = %key, "No From/To/Subject headers found");
        }

        self.backend.put_object_tags(&key, &tags)?;
        info!(key = %key, tags = tags.len(), "Tagged message");
        Ok(tags)
    }

    /// Tag every message in `message_ids`, in order.
    ///
    /// A failure for one id does not stop the rest; each outcome is returned
    /// next to its id.
    pub fn tag_all<'a, I>(&self, message_ids: I) -> Vec<(&'a str, Result<TagSet>)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        message_ids
            .into_iter()
            .map(|id| {
                let outcome = self.tag_incoming(id);
                if let Err(e) = &outcome {
                    warn!(message_id = id, error = %e, "Tagging failed, continuing");
                }
                (id, outcome)
            })
            .collect()
    }
}

/// A delivery notification in the SES receipt format.
///
/// Only the message ids are read; everything else is ignored.
#[derive(Debug, Deserialize)]
pub struct IngestEvent {
    #[serde(rename = "Records")]
    records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    ses: SesPayload,
}

#[derive(Debug, Deserialize)]
struct SesPayload {
    mail: SesMail,
}

#[derive(Debug, Deserialize)]
struct SesMail {
    #[serde(rename = "messageId")]
    message_id: String,
}

impl IngestEvent {
    pub fn from_json(json: &str) -> Result<Self> {
        let event: Self =
            serde_json::from_str(json).map_err(|e| MailError::InvalidEvent(e.to_string()))?;
        if event.records.is_empty() {
            return Err(MailError::InvalidEvent("no records".to_string()));
        }
        Ok(event)
    }

    /// Message ids in record order.
    pub fn message_ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.ses.mail.message_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::codec::decode;
    use crate::store::backend::{ListPage, StoredObject};
    use crate::store::memory::MemoryBackend;

    /// Body reads fail with a transport error; tags go to the inner store.
    struct UnreadableBodies(MemoryBackend);

    impl ObjectBackend for UnreadableBodies {
        fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ListPage> {
            self.0.list_page(prefix, token)
        }
        fn get_object(&self, key: &str) -> Result<StoredObject> {
            Err(MailError::backend("get", key, "connection reset"))
        }
        fn get_object_tags(&self, key: &str) -> Result<TagSet> {
            self.0.get_object_tags(key)
        }
        fn put_object_tags(&self, key: &str, tags: &TagSet) -> Result<()> {
            self.0.put_object_tags(key, tags)
        }
        fn delete_object(&self, key: &str) -> Result<()> {
            self.0.delete_object(key)
        }
    }

    const RAW: &[u8] = concat!(
        "From: \"Ada Lovelace\" <ada@example.com>\r\n",
        "To: Bob <bob@example.com>\r\n",
        "Subject: =?UTF-8?B?Q2Fmw6kgbWVldGluZw==?=\r\n",
        "\r\n",
        "See you there.\r\n"
    )
    .as_bytes();

    #[test]
    fn test_object_key_prefix() {
        let backend = Arc::new(MemoryBackend::new());
        let plain = IngestionTagger::new(backend.clone(), None);
        assert_eq!(plain.object_key("abc"), "abc");
        let prefixed = IngestionTagger::new(backend, Some("incoming/".to_string()));
        assert_eq!(prefixed.object_key("abc"), "incoming/abc");
    }

    #[test]
    fn test_tag_incoming_writes_tags() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert("incoming/m1", RAW.to_vec());
        let tagger = IngestionTagger::new(backend.clone(), Some("incoming".to_string()));

        let written = tagger.tag_incoming("m1").expect("tag");
        assert_eq!(backend.get_object_tags("incoming/m1").expect("tags"), written);

        let decoded = decode(&written);
        assert_eq!(decoded.sender, "ada@example.com");
        assert_eq!(decoded.subject, "Café meeting");
        assert_eq!(decoded.recipient(), Some("bob@example.com"));
    }

    #[test]
    fn test_headerless_message_gets_empty_tags() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert("m2", b"\r\njust a body".to_vec());
        let tagger = IngestionTagger::new(backend, None);
        let written = tagger.tag_incoming("m2").expect("tag");
        assert!(written.is_empty());
    }

    #[test]
    fn test_unreadable_body_still_writes_tags() {
        let inner = MemoryBackend::new();
        inner.insert("m3", RAW.to_vec());
        inner
            .put_object_tags("m3", &[("Stale", "yes")].into_iter().collect())
            .expect("seed tags");
        let backend = Arc::new(UnreadableBodies(inner));
        let tagger = IngestionTagger::new(backend.clone(), None);

        let written = tagger.tag_incoming("m3").expect("partial tagging succeeds");
        assert!(written.is_empty());
        assert!(backend.get_object_tags("m3").expect("tags").is_empty());

        let decoded = decode(&written);
        assert_eq!(decoded.sender, codec::DEFAULT_SENDER);
        assert_eq!(decoded.subject, codec::DEFAULT_SUBJECT);
    }

    #[test]
    fn test_tag_all_continues_past_failures() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert("m1", RAW.to_vec());
        backend.insert("m3", RAW.to_vec());
        let tagger = IngestionTagger::new(backend.clone(), None);

        let outcomes = tagger.tag_all(["m1", "ghost", "m3"]);
        let ids: Vec<&str> = outcomes.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["m1", "ghost", "m3"]);
        assert!(outcomes[0].1.is_ok());
        assert!(outcomes[1].1.as_ref().unwrap_err().is_not_found());
        assert!(outcomes[2].1.is_ok());
        assert_eq!(
            decode(&backend.get_object_tags("m3").expect("tags")).sender,
            "ada@example.com"
        );
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let tagger = IngestionTagger::new(Arc::new(MemoryBackend::new()), None);
        assert!(tagger.tag_incoming("ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn test_parse_event() {
        let json = r#"{"Records":[
            {"eventSource":"aws:ses","ses":{"mail":{"messageId":"id-1","source":"a@x.com"}}},
            {"ses":{"mail":{"messageId":"id-2"}}}
        ]}"#;
        let event = IngestEvent::from_json(json).expect("event");
        assert_eq!(event.message_ids().collect::<Vec<_>>(), vec!["id-1", "id-2"]);
    }

    #[test]
    fn test_parse_bad_event() {
        assert!(matches!(
            IngestEvent::from_json(r#"{"Records":[]}"#),
            Err(MailError::InvalidEvent(_))
        ));
        assert!(IngestEvent::from_json("not json").is_err());
    }
}

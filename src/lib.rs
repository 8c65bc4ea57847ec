//! `blobmail`: a mailbox view over blob storage.
//!
//! Incoming messages are stored as opaque objects. At delivery time their
//! sender, recipient and subject are written into the object's tags; the
//! viewer then lists, sorts and renders messages from those tags and the raw
//! bytes alone, with no database in between.

pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod model;
pub mod parser;
pub mod store;
pub mod viewer;

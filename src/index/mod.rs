//! The tag-based mailbox index: codec, cache and listing.

pub mod cache;
pub mod codec;
pub mod mailbox;

//! Message parsing: header extraction, MIME tree construction and content selection.

pub mod content;
pub mod header;
pub mod mime;

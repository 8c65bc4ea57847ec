//! Object storage: the backend contract, two implementations, and the
//! single-message store built on top of them.

pub mod backend;
pub mod dir;
pub mod memory;
pub mod message;

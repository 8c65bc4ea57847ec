//! Core data model: tag sets, listing entries, MIME trees and addresses.

pub mod address;
pub mod mail;
pub mod mime;
pub mod tags;

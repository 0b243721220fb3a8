//! Core data model types for decoded messages, addresses, attachments and records.

pub mod address;
pub mod attachment;
pub mod issue;
pub mod mail;

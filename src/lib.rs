//! `mailkeep` — archive broadcast email as decoded records and image previews.
//!
//! Raw messages are decoded despite wrong or missing charset declarations,
//! their MIME tree is walked for bodies and attachments, image attachments
//! and PDF pages are rendered to deduplicated image files, and one JSON
//! record is written per message UID.

pub mod archive;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod render;
pub mod store;

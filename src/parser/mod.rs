//! Message decoding: charsets, transfer encodings, headers and the MIME tree.

pub mod charset;
pub mod classify;
pub mod eml;
pub mod header;
pub mod mime;
pub mod transfer;

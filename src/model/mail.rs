//! Decoded message types and the persisted record.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::address::EmailAddress;
use super::attachment::Attachment;
use super::issue::DecodeIssue;

/// Decoded header fields of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Sender for display: `"Name <address>"`, a bare address, or a placeholder.
    pub from: String,

    /// Parsed sender, absent when the header was missing or undecodable.
    pub sender: Option<EmailAddress>,

    /// Decoded `To:` header.
    pub to: String,

    /// Decoded `Cc:` header.
    pub cc: String,

    /// `Date:` header as written by the sender.
    pub date: String,

    /// `Date:` header parsed to UTC, if any known format matched.
    pub timestamp: Option<DateTime<Utc>>,

    /// Decoded subject, or a placeholder.
    pub subject: String,

    /// Everything that had to be guessed or substituted.
    pub issues: Vec<DecodeIssue>,
}

/// Bodies and attachments of one message, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageContent {
    /// Decoded `text/plain` parts.
    pub text: Vec<String>,

    /// Decoded `text/html` parts.
    pub html: Vec<String>,

    /// Named parts with their transfer-decoded bytes.
    pub attachments: Vec<Attachment>,

    /// Charset guesses made while decoding bodies.
    pub issues: Vec<DecodeIssue>,
}

/// The structured document persisted for each processed message.
///
/// Keyed by `uid`; reprocessing a message overwrites its record.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProcessedRecord {
    /// Message identifier assigned by the source mailbox.
    pub uid: String,

    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cc: String,
    pub date: String,

    /// Normalized form of `date`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    pub subject: String,
    pub text_contents: Vec<String>,
    pub html_contents: Vec<String>,

    /// Sanitized attachment filenames, in document order.
    pub attachments: Vec<String>,

    /// Rendered image paths, one per rendered slot (duplicates share a path).
    pub images: Vec<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DecodeIssue>,
}

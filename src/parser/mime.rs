//! MIME tree traversal: text and HTML bodies plus named attachments.
//!
//! `mail-parser` provides the part tree and per-part headers. Payloads are
//! taken from the raw message by offset and decoded here, so that the
//! tolerant transfer decoders and the charset ladder apply to every part.

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::model::attachment::Attachment;
use crate::model::mail::MessageContent;
use crate::parser::charset::CharsetResolver;
use crate::parser::eml::{skip_from_line, split_headers};
use crate::parser::transfer::TransferEncoding;

/// Maximum nesting of multipart containers and embedded messages.
const MAX_DEPTH: usize = 10;

/// Charset assumed for text parts that do not declare one.
const DEFAULT_CHARSET: &str = "utf-8";

/// Where a leaf part ends up.
///
/// A body variant carries a filename when the part is also listed as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartKind {
    Text(Option<String>),
    Html(Option<String>),
    Attachment(String),
    Ignored,
}

/// Classify a leaf by MIME type, filename and disposition.
///
/// Text and HTML parts are always bodies; a named one explicitly marked
/// `attachment` is listed as an attachment as well. Any other part with a
/// filename is an attachment, inline images included.
pub fn classify(mime_type: &str, filename: Option<&str>, disposition_attachment: bool) -> PartKind {
    let named = filename.filter(|f| !f.trim().is_empty());
    let attached = named.filter(|_| disposition_attachment).map(String::from);
    match (mime_type, named) {
        ("text/plain", _) => PartKind::Text(attached),
        ("text/html", _) => PartKind::Html(attached),
        (_, Some(name)) => PartKind::Attachment(name.to_string()),
        (_, None) => PartKind::Ignored,
    }
}

/// Walk a raw message and collect its bodies and attachments in document order.
///
/// Never fails: parts that cannot be decoded are logged and skipped.
pub fn extract_content(raw_message: &[u8], resolver: &CharsetResolver) -> MessageContent {
    let mut walker = Walker {
        resolver,
        content: MessageContent::default(),
    };
    walker.walk_message(skip_from_line(raw_message), 0);
    walker.content
}

struct Walker<'r> {
    resolver: &'r CharsetResolver,
    content: MessageContent,
}

impl Walker<'_> {
    fn walk_message(&mut self, bytes: &[u8], depth: usize) {
        if depth > MAX_DEPTH {
            warn!(depth, "Embedded message nested too deeply, skipped");
            return;
        }

        match MessageParser::default().parse(bytes) {
            Some(msg) if !msg.parts.is_empty() => self.walk_part(&msg, 0, depth),
            _ => {
                debug!(len = bytes.len(), "MIME parse failed, treating body as plain text");
                let (_, body) = split_headers(bytes);
                if !body.is_empty() {
                    let decoded = self.resolver.decode_assuming(body, None, Some(DEFAULT_CHARSET));
                    self.content.issues.extend(decoded.issue);
                    self.content.text.push(decoded.text);
                }
            }
        }
    }

    fn walk_part(&mut self, msg: &Message<'_>, id: usize, depth: usize) {
        let Some(part) = msg.parts.get(id) else {
            warn!(part = id, "MIME part index out of range");
            return;
        };

        match &part.body {
            PartType::Multipart(children) => {
                if depth >= MAX_DEPTH {
                    warn!(depth, "Multipart nested too deeply, skipped");
                    return;
                }
                for child in children {
                    self.walk_part(msg, *child as usize, depth + 1);
                }
            }
            PartType::Message(_) => {
                if let Some(bytes) = payload(msg, part) {
                    self.walk_message(&bytes, depth + 1);
                }
            }
            _ => self.visit_leaf(msg, part),
        }
    }

    fn visit_leaf(&mut self, msg: &Message<'_>, part: &MessagePart<'_>) {
        let mime_type = mime_type(part);
        let disposition_attachment = part
            .content_disposition()
            .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"));
        let kind = classify(&mime_type, part.attachment_name(), disposition_attachment);
        if kind == PartKind::Ignored {
            debug!(mime_type = %mime_type, "Unnamed non-text part ignored");
            return;
        }

        let Some(bytes) = payload(msg, part) else {
            return;
        };

        let (is_text, attached) = match kind {
            PartKind::Text(attached) => (true, attached),
            PartKind::Html(attached) => (false, attached),
            PartKind::Attachment(filename) => {
                self.content.attachments.push(Attachment {
                    filename,
                    content_type: mime_type,
                    data: bytes,
                });
                return;
            }
            PartKind::Ignored => return,
        };

        let declared = part.content_type().and_then(|ct| ct.attribute("charset"));
        let decoded = self
            .resolver
            .decode_assuming(&bytes, declared, Some(DEFAULT_CHARSET));
        if let Some(issue) = decoded.issue {
            debug!(%issue, "Body charset guessed");
            self.content.issues.push(issue);
        }
        if is_text {
            self.content.text.push(decoded.text);
        } else {
            self.content.html.push(decoded.text);
        }
        if let Some(filename) = attached {
            self.content.attachments.push(Attachment {
                filename,
                content_type: mime_type,
                data: bytes,
            });
        }
    }
}

/// Lowercase `type/subtype`; parts without a Content-Type are `text/plain`.
fn mime_type(part: &MessagePart<'_>) -> String {
    match part.content_type() {
        Some(ct) => match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub).to_ascii_lowercase(),
            None => ct.ctype().to_ascii_lowercase(),
        },
        None => "text/plain".to_string(),
    }
}

/// Raw body of a part with its transfer encoding reversed.
///
/// `None` when the part has no body or the encoding is corrupt.
fn payload(msg: &Message<'_>, part: &MessagePart<'_>) -> Option<Vec<u8>> {
    let start = part.offset_body as usize;
    let end = part.offset_end as usize;
    let raw = msg.raw_message.get(start..end).filter(|b| !b.is_empty())?;

    let encoding = part
        .content_transfer_encoding()
        .map(TransferEncoding::from_header)
        .unwrap_or(TransferEncoding::Identity);

    match encoding.decode(raw) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(error = %e, ?encoding, "Undecodable MIME part skipped");
            None
        }
    }
}

//! Attachments extracted from a message.

/// Longest filename kept after sanitizing, in characters.
const MAX_FILENAME_LEN: usize = 150;

/// Name used when sanitizing leaves nothing usable.
pub const PLACEHOLDER_FILENAME: &str = "attachment";

/// Extensions treated as renderable images when the content type says nothing useful.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"];

/// A named leaf part of a message.
///
/// `data` holds the transfer-decoded bytes, never a charset-decoded string,
/// so binary content survives untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// Filename exactly as declared in the message (may contain unsafe characters).
    pub filename: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Transfer-decoded payload.
    pub data: Vec<u8>,
}

/// How the archive treats an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Rendered directly by the image renderer.
    Image,
    /// Rasterized page by page.
    Pdf,
    /// Listed in the record, nothing rendered.
    Other,
}

impl Attachment {
    /// Filename safe to use as a single path component.
    pub fn safe_filename(&self) -> String {
        sanitize_filename(&self.filename)
    }

    /// Classify by content type, falling back to the filename extension.
    pub fn kind(&self) -> AttachmentKind {
        let content_type = self.content_type.to_ascii_lowercase();
        if content_type.starts_with("image/") {
            return AttachmentKind::Image;
        }
        if content_type == "application/pdf" || content_type == "application/x-pdf" {
            return AttachmentKind::Pdf;
        }

        let extension = std::path::Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("pdf") => AttachmentKind::Pdf,
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => AttachmentKind::Image,
            _ => AttachmentKind::Other,
        }
    }
}

/// Sanitize an attachment filename for use as a path component.
///
/// Control characters and path-delimiter-like characters become `_`,
/// surrounding dots and whitespace are trimmed (so `..` cannot escape a
/// directory), and the result is truncated. An empty result falls back to
/// [`PLACEHOLDER_FILENAME`].
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
            {
                '_'
            } else {
                c
            }
        })
        .take(MAX_FILENAME_LEN)
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        PLACEHOLDER_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(filename: &str, content_type: &str) -> Attachment {
        Attachment {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            data: Vec::new(),
        }
    }

    #[test]
    fn test_sanitize_replaces_delimiters() {
        assert_eq!(sanitize_filename("foto:ek.jpg"), "foto_ek.jpg");
        assert_eq!(sanitize_filename("a/b\\c:d*e"), "a_b_c_d_e");
        assert_eq!(sanitize_filename("report\u{0}\n.pdf"), "report__.pdf");
    }

    #[test]
    fn test_sanitize_keeps_unicode_and_spaces() {
        assert_eq!(sanitize_filename("Sınav Takvimi.pdf"), "Sınav Takvimi.pdf");
    }

    #[test]
    fn test_sanitize_never_empty() {
        assert_eq!(sanitize_filename(""), PLACEHOLDER_FILENAME);
        assert_eq!(sanitize_filename(".."), PLACEHOLDER_FILENAME);
        assert_eq!(sanitize_filename("  . "), PLACEHOLDER_FILENAME);
    }

    #[test]
    fn test_sanitize_strips_traversal() {
        let name = sanitize_filename("../../etc/passwd");
        assert!(!name.contains('/'));
        assert!(!name.starts_with('.'));
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(400);
        assert_eq!(sanitize_filename(&long).chars().count(), MAX_FILENAME_LEN);
    }

    #[test]
    fn test_kind_from_content_type() {
        assert_eq!(attachment("a.bin", "image/png").kind(), AttachmentKind::Image);
        assert_eq!(attachment("a.bin", "application/pdf").kind(), AttachmentKind::Pdf);
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(
            attachment("Duyuru.PDF", "application/octet-stream").kind(),
            AttachmentKind::Pdf
        );
        assert_eq!(
            attachment("afis.jpeg", "application/octet-stream").kind(),
            AttachmentKind::Image
        );
        assert_eq!(
            attachment("notes.docx", "application/octet-stream").kind(),
            AttachmentKind::Other
        );
    }
}

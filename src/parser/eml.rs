//! Reading bare `.eml` files and splitting a message into header and body.

use std::path::Path;

use crate::error::{ArchiveError, Result};

/// Read a `.eml` file verbatim.
pub fn read_eml(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ArchiveError::FileNotFound(path.to_path_buf())
        } else {
            ArchiveError::io(path, e)
        }
    })
}

/// Split a message at its first blank line.
///
/// Returns `(headers, body)`; a message without a blank line is all headers.
pub fn split_headers(data: &[u8]) -> (&[u8], &[u8]) {
    match find_header_end(data) {
        Some((end, sep)) => (&data[..end], &data[end + sep..]),
        None => (data, &[]),
    }
}

/// Offset of the blank line ending the headers and the separator length.
fn find_header_end(data: &[u8]) -> Option<(usize, usize)> {
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if data[i..].starts_with(b"\r\n\r\n") {
            return Some((i, 4));
        }
    }
    None
}

/// Skip a BOM and the `From ` separator line mbox exports leave on messages.
pub fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_header_end() {
        // "From: a@b.com\n" = 14 bytes, "Subject: Hi\n" = 12 bytes
        let data = b"From: a@b.com\nSubject: Hi\n\nBody\n";
        assert_eq!(find_header_end(data), Some((25, 2)));
    }

    #[test]
    fn test_split_headers_crlf() {
        let data = b"From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n";
        let (headers, body) = split_headers(data);
        assert_eq!(headers, b"From: a@b.com\r\nSubject: Hi");
        assert_eq!(body, b"Body\r\n");
    }

    #[test]
    fn test_split_headers_without_body() {
        let (headers, body) = split_headers(b"Subject: only\n");
        assert_eq!(headers, b"Subject: only\n");
        assert!(body.is_empty());
    }

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
        let plain = b"\xEF\xBB\xBFSubject: Test\n\nBody\n";
        assert!(skip_from_line(plain).starts_with(b"Subject:"));
    }

    #[test]
    fn test_read_eml_missing() {
        let err = read_eml("/definitely/not/here.eml").unwrap_err();
        assert!(matches!(err, ArchiveError::FileNotFound(_)));
    }
}

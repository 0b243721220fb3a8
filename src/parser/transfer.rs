//! Content-Transfer-Encoding decoders (RFC 2045) shared by bodies and headers.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use thiserror::Error;

/// Base64 engine that accepts missing padding and non-canonical trailing bits,
/// both common in mail produced by sloppy clients.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// A payload whose wire encoding could not be reversed.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// The transfer encodings that need reversing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// `7bit`, `8bit`, `binary` or absent.
    Identity,
    QuotedPrintable,
    Base64,
}

impl TransferEncoding {
    /// Parse a `Content-Transfer-Encoding` value; unknown values mean identity.
    pub fn from_header(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "quoted-printable" => Self::QuotedPrintable,
            "base64" => Self::Base64,
            _ => Self::Identity,
        }
    }

    /// Reverse the encoding.
    pub fn decode(self, input: &[u8]) -> Result<Vec<u8>, TransferError> {
        match self {
            Self::Identity => Ok(input.to_vec()),
            Self::QuotedPrintable => Ok(decode_quoted_printable(input, false)),
            Self::Base64 => decode_base64(input),
        }
    }
}

/// Decode base64, ignoring embedded whitespace and line breaks.
pub fn decode_base64(input: &[u8]) -> Result<Vec<u8>, TransferError> {
    let compact: Vec<u8> = input
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(LENIENT_BASE64.decode(compact)?)
}

/// Decode quoted-printable.
///
/// `header_mode` selects the RFC 2047 "Q" variant, where `_` stands for a
/// space. Malformed escapes are kept literally instead of failing, and soft
/// line breaks (`=` at end of line, optionally followed by whitespace) are
/// removed.
pub fn decode_quoted_printable(input: &[u8], header_mode: bool) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b'_' if header_mode => {
                result.push(b' ');
                i += 1;
            }
            b'=' => {
                let rest = &input[i + 1..];
                if let (Some(hi), Some(lo)) = (
                    rest.first().and_then(|b| hex_value(*b)),
                    rest.get(1).and_then(|b| hex_value(*b)),
                ) {
                    result.push((hi << 4) | lo);
                    i += 3;
                } else if let Some(skip) = soft_break_len(rest) {
                    i += 1 + skip;
                } else {
                    result.push(b'=');
                    i += 1;
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Length of a soft line break following `=`: optional spaces/tabs, then a newline.
fn soft_break_len(rest: &[u8]) -> Option<usize> {
    let ws = rest
        .iter()
        .take_while(|b| **b == b' ' || **b == b'\t')
        .count();
    let after = &rest[ws..];
    if after.starts_with(b"\r\n") {
        Some(ws + 2)
    } else if after.starts_with(b"\n") {
        Some(ws + 1)
    } else if after.is_empty() {
        Some(ws)
    } else {
        None
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

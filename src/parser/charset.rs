//! Charset resolution with a fallback ladder.
//!
//! Mail in the wild routinely declares the wrong charset (or none at all).
//! [`CharsetResolver`] tries the declared charset first, then a configured
//! list of common charsets, and finally a lossy UTF-8 decode that cannot fail.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, warn};

use crate::config::CharsetConfig;
use crate::model::issue::DecodeIssue;

/// Input accepted by [`CharsetResolver::resolve`].
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// Already decoded; returned unchanged.
    Text(&'a str),
    /// Raw bytes in some charset.
    Bytes(&'a [u8]),
}

impl<'a> From<&'a str> for Payload<'a> {
    fn from(s: &'a str) -> Self {
        Payload::Text(s)
    }
}

impl<'a> From<&'a [u8]> for Payload<'a> {
    fn from(b: &'a [u8]) -> Self {
        Payload::Bytes(b)
    }
}

/// Result of a charset decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// The decoded text (never absent).
    pub text: String,
    /// Canonical name of the charset that produced `text`; `None` for text passthrough.
    pub charset: Option<&'static str>,
    /// Set when the declared charset was not the one used.
    pub issue: Option<DecodeIssue>,
}

impl Decoded {
    fn exact(text: String, charset: Option<&'static str>) -> Self {
        Self {
            text,
            charset,
            issue: None,
        }
    }
}

/// Decodes bytes to text, trying the declared charset before a fixed ladder.
#[derive(Debug, Clone)]
pub struct CharsetResolver {
    fallbacks: Vec<&'static Encoding>,
}

impl Default for CharsetResolver {
    fn default() -> Self {
        Self::from_config(&CharsetConfig::default())
    }
}

impl CharsetResolver {
    /// Build a resolver from an ordered list of charset labels.
    ///
    /// Unknown labels are dropped with a warning; duplicates are kept once.
    pub fn new<S: AsRef<str>>(fallbacks: &[S]) -> Self {
        let mut ladder: Vec<&'static Encoding> = Vec::with_capacity(fallbacks.len());
        for label in fallbacks {
            match lookup(label.as_ref()) {
                Some(encoding) if !ladder.contains(&encoding) => ladder.push(encoding),
                Some(_) => {}
                None => warn!(charset = label.as_ref(), "Unknown fallback charset ignored"),
            }
        }
        Self { fallbacks: ladder }
    }

    /// Build a resolver from the `[charset]` config section.
    pub fn from_config(config: &CharsetConfig) -> Self {
        Self::new(&config.fallbacks)
    }

    /// Resolve an optional payload. `None` yields empty text; text is returned as-is.
    pub fn resolve(&self, payload: Option<Payload<'_>>, declared: Option<&str>) -> Decoded {
        match payload {
            None => Decoded::exact(String::new(), None),
            Some(Payload::Text(text)) => Decoded::exact(text.to_string(), None),
            Some(Payload::Bytes(bytes)) => self.decode(bytes, declared),
        }
    }

    /// Decode bytes, never failing.
    ///
    /// The declared charset wins whenever the bytes are valid in it. Otherwise
    /// each fallback is tried in order, and if every one rejects the input the
    /// bytes are decoded as UTF-8 with replacement characters.
    pub fn decode(&self, bytes: &[u8], declared: Option<&str>) -> Decoded {
        self.decode_assuming(bytes, declared, None)
    }

    /// Like [`decode`](Self::decode), trying `assumed` first when nothing usable is declared.
    ///
    /// The issue still reports what was actually declared, so a part without
    /// a charset parameter shows `declared: None`.
    pub fn decode_assuming(&self, bytes: &[u8], declared: Option<&str>, assumed: Option<&str>) -> Decoded {
        let declared_encoding = declared.and_then(lookup);
        if let (Some(label), None) = (declared, declared_encoding) {
            debug!(charset = label, "Declared charset not recognized");
        }
        let assumed_encoding = assumed.and_then(lookup);
        let expected = match declared {
            Some(_) => declared_encoding,
            None => assumed_encoding,
        };

        let candidates = declared_encoding
            .or(assumed_encoding)
            .into_iter()
            .chain(self.fallbacks.iter().copied());

        let mut tried: Vec<&'static Encoding> = Vec::new();
        for encoding in candidates {
            if tried.contains(&encoding) {
                continue;
            }
            tried.push(encoding);

            if let Some(text) = decode_strict(encoding, bytes) {
                let silent = expected == Some(encoding) || (declared.is_none() && assumed_encoding.is_none());
                let issue = (!silent).then(|| DecodeIssue::CharsetAmbiguous {
                    declared: declared.map(String::from),
                    used: encoding.name().to_string(),
                });
                return Decoded {
                    text: text.into_owned(),
                    charset: Some(encoding.name()),
                    issue,
                };
            }
        }

        warn!(
            declared = declared.unwrap_or("none"),
            len = bytes.len(),
            "No charset decoded cleanly, using lossy UTF-8"
        );
        Decoded {
            text: String::from_utf8_lossy(strip_bom(bytes)).into_owned(),
            charset: Some(UTF_8.name()),
            issue: Some(DecodeIssue::CharsetAmbiguous {
                declared: declared.map(String::from),
                used: "utf-8 (lossy)".to_string(),
            }),
        }
    }

    /// Convenience: decode and keep only the text.
    pub fn decode_text(&self, bytes: &[u8], declared: Option<&str>) -> String {
        self.decode(bytes, declared).text
    }
}

/// Look up a charset label, tolerating quotes and a few common misspellings.
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    let normalized = label.trim().trim_matches('"').trim().to_ascii_lowercase();
    let normalized = match normalized.as_str() {
        "latin-1" | "latin_1" => "latin1",
        "utf_8" => "utf-8",
        "cp-1254" => "cp1254",
        other => other,
    };
    Encoding::for_label(normalized.as_bytes())
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &bytes[3..]
    } else {
        bytes
    }
}

fn decode_strict<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    let bytes = if encoding == UTF_8 {
        strip_bom(bytes)
    } else {
        bytes
    };
    encoding.decode_without_bom_handling_and_without_replacement(bytes)
}

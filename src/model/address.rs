//! Email address parsing (RFC 5322 §3.4), enough for display and matching.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A mailbox: optional display name plus bare address.
///
/// # Examples
/// - `"Duyuru Servisi <duyuru@ornek.edu.tr>"` → `display_name = "Duyuru Servisi"`, `address = "duyuru@ornek.edu.tr"`
/// - `"list@example.com"` → `display_name = ""`, `address = "list@example.com"`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Parse one mailbox from a decoded header value.
    ///
    /// Accepts `addr`, `<addr>`, `Name <addr>` and `"Quoted, Name" <addr>`.
    /// Anything else is kept whole as the address.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let angle = trimmed.rfind('<').and_then(|start| {
            let len = trimmed[start..].find('>')?;
            Some((start, start + len))
        });

        match angle {
            Some((start, end)) => Self {
                display_name: unquote(&trimmed[..start]),
                address: trimmed[start + 1..end].trim().to_string(),
            },
            None => Self {
                display_name: String::new(),
                address: trimmed.to_string(),
            },
        }
    }

    /// Parse a comma-separated address list, respecting quoted names and angle brackets.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut segments = Vec::new();
        let mut in_quotes = false;
        let mut in_angle = false;
        let mut start = 0;

        for (i, ch) in raw.char_indices() {
            match ch {
                '"' => in_quotes = !in_quotes,
                '<' if !in_quotes => in_angle = true,
                '>' if !in_quotes => in_angle = false,
                ',' if !in_quotes && !in_angle => {
                    segments.push(&raw[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        segments.push(&raw[start..]);

        segments
            .into_iter()
            .map(Self::parse)
            .filter(|a| !a.address.is_empty())
            .collect()
    }

    /// `"Name <address>"`, or the bare address when there is no name.
    pub fn display(&self) -> String {
        self.to_string()
    }

    /// Case-insensitive comparison of the bare address.
    pub fn is(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address.trim())
    }
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
        .trim()
        .to_string()
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name.is_empty() {
            f.write_str(&self.address)
        } else {
            write!(f, "{} <{}>", self.display_name, self.address)
        }
    }
}

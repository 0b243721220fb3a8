//! RFC 5322 header parsing: folding, encoded-words (RFC 2047), and date parsing.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::address::EmailAddress;
use crate::model::issue::DecodeIssue;
use crate::model::mail::Envelope;
use crate::parser::charset::CharsetResolver;
use crate::parser::transfer::{decode_base64, decode_quoted_printable};

/// Shown when a message has no `From:` header.
pub const SENDER_UNKNOWN: &str = "sender unknown";

/// Shown when the `From:` header could not be decoded.
pub const SENDER_UNDECODABLE: &str = "sender undecodable";

/// Shown when the `Subject:` header could not be decoded.
pub const SUBJECT_UNDECODABLE: &str = "subject undecodable";

/// Unfolded message headers, in order, with lowercase names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Parse a raw header block (everything before the first blank line).
    ///
    /// The bytes go through the charset ladder first, so stray 8-bit
    /// headers come out as readable text instead of replacement characters.
    pub fn parse(raw_headers: &[u8], resolver: &CharsetResolver) -> Self {
        let text = resolver.decode_text(raw_headers, None);
        Self {
            fields: unfold_headers(&text),
        }
    }

    /// First value for a header name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values for a header name, in order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        let name = name.to_ascii_lowercase();
        self.fields
            .iter()
            .filter(move |(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Number of header fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no header field was found.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Build the decoded [`Envelope`] from parsed headers.
///
/// Never fails: headers that cannot be decoded are replaced by placeholder
/// strings (sender, subject) or kept raw (recipients), and every substitution
/// is recorded in [`Envelope::issues`].
pub fn decode_envelope(headers: &Headers, resolver: &CharsetResolver) -> Envelope {
    let mut issues = Vec::new();

    let (from, sender) = match decode_from(headers.get("from"), resolver) {
        Ok(Some(addr)) => (addr.display(), Some(addr)),
        Ok(None) => (SENDER_UNKNOWN.to_string(), None),
        Err(issue) => {
            warn!(%issue, "Could not decode sender");
            issues.push(issue);
            (SENDER_UNDECODABLE.to_string(), None)
        }
    };

    let subject = match decode_header_value("subject", headers.get("subject"), resolver) {
        Ok(subject) => subject,
        Err(issue) => {
            warn!(%issue, "Could not decode subject");
            issues.push(issue);
            SUBJECT_UNDECODABLE.to_string()
        }
    };

    let mut decode_or_raw = |name: &str| {
        let raw = headers.get(name);
        decode_header_value(name, raw, resolver).unwrap_or_else(|issue| {
            debug!(%issue, "Keeping raw header value");
            issues.push(issue);
            raw.unwrap_or_default().to_string()
        })
    };
    let to = decode_or_raw("to");
    let cc = decode_or_raw("cc");

    let date = headers.get("date").unwrap_or_default().to_string();
    let timestamp = parse_date(&date);

    Envelope {
        from,
        sender,
        to,
        cc,
        date,
        timestamp,
        subject,
        issues,
    }
}

/// Decode a header value containing encoded words.
///
/// An absent or empty value decodes to the empty string.
pub fn decode_header_value(
    name: &str,
    raw: Option<&str>,
    resolver: &CharsetResolver,
) -> Result<String, DecodeIssue> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(String::new());
    };
    decode_encoded_words(raw, resolver).map_err(|e| DecodeIssue::HeaderMalformed {
        header: name.to_string(),
        reason: e.to_string(),
    })
}

/// Decode the `From:` header into an address.
///
/// `Ok(None)` means the header is absent or blank.
pub fn decode_from(
    raw: Option<&str>,
    resolver: &CharsetResolver,
) -> Result<Option<EmailAddress>, DecodeIssue> {
    let decoded = decode_header_value("from", raw, resolver)?;
    if decoded.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(EmailAddress::parse(&decoded)))
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    result
}

/// An encoded word whose payload could not be decoded.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("encoded word {word:?}: {reason}")]
pub struct MalformedWord {
    pub word: String,
    pub reason: String,
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Whitespace between adjacent encoded words is dropped, and adjacent words
/// in the same charset are decoded together so a multi-byte character split
/// across two words survives. Text that merely looks like the start of an
/// encoded word is kept literally.
pub fn decode_encoded_words(
    input: &str,
    resolver: &CharsetResolver,
) -> Result<String, MalformedWord> {
    let mut result = String::with_capacity(input.len());
    let mut pending: Option<(String, Vec<u8>)> = None;
    let mut remaining = input;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        match parse_encoded_word(&remaining[start + 2..])? {
            Some(word) => {
                let adjacent = pending.is_some() && before.trim().is_empty();
                if !adjacent {
                    flush_pending(&mut pending, &mut result, resolver);
                    result.push_str(before);
                }
                match pending.as_mut() {
                    Some((charset, bytes)) if charset.eq_ignore_ascii_case(word.charset) => {
                        bytes.extend_from_slice(&word.bytes);
                    }
                    _ => {
                        flush_pending(&mut pending, &mut result, resolver);
                        pending = Some((word.charset.to_string(), word.bytes));
                    }
                }
                remaining = &remaining[start + 2 + word.consumed..];
            }
            None => {
                flush_pending(&mut pending, &mut result, resolver);
                result.push_str(before);
                result.push_str("=?");
                remaining = &remaining[start + 2..];
            }
        }
    }

    flush_pending(&mut pending, &mut result, resolver);
    result.push_str(remaining);
    Ok(result)
}

fn flush_pending(
    pending: &mut Option<(String, Vec<u8>)>,
    out: &mut String,
    resolver: &CharsetResolver,
) {
    if let Some((charset, bytes)) = pending.take() {
        out.push_str(&resolver.decode_text(&bytes, Some(&charset)));
    }
}

struct EncodedWord<'a> {
    charset: &'a str,
    bytes: Vec<u8>,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

/// Parse `charset?encoding?text?=` (the part after `=?`).
///
/// `Ok(None)` if the input does not have the shape of an encoded word.
fn parse_encoded_word(s: &str) -> Result<Option<EncodedWord<'_>>, MalformedWord> {
    let Some(first_q) = s.find('?') else {
        return Ok(None);
    };
    let charset_field = &s[..first_q];
    if charset_field.is_empty() || charset_field.contains(char::is_whitespace) {
        return Ok(None);
    }
    // RFC 2231 language suffix: "UTF-8*tr"
    let charset = charset_field.split('*').next().unwrap_or(charset_field);

    let rest = &s[first_q + 1..];
    let Some(second_q) = rest.find('?') else {
        return Ok(None);
    };
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let Some(end) = rest2.find("?=") else {
        return Ok(None);
    };
    let encoded_text = &rest2[..end];
    let consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding {
        "B" | "b" => decode_base64(encoded_text.as_bytes()).map_err(|e| MalformedWord {
            word: format!("=?{}", &s[..consumed]),
            reason: e.to_string(),
        })?,
        "Q" | "q" => decode_quoted_printable(encoded_text.as_bytes(), true),
        _ => return Ok(None),
    };

    Ok(Some(EncodedWord {
        charset,
        bytes,
        consumed,
    }))
}

/// Formats tried, in order, once a date is stripped of its weekday.
const DATE_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Well-known timezone abbreviations and their numeric offsets.
const NAMED_ZONES: &[(&str, &str)] = &[
    ("UT", "+0000"),
    ("GMT", "+0000"),
    ("UTC", "+0000"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
    ("EET", "+0200"),
    ("EEST", "+0300"),
    ("TRT", "+0300"),
];

/// Parse an email date string in the formats seen in practice.
///
/// Supports RFC 2822, ISO 8601, IMAP-style `DD-MON-YYYY`, trailing comments
/// such as `(UTC)`, and named timezones.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let normalized = normalize_date(trimmed);
    for fmt in DATE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    debug!(date = trimmed, "Could not parse date");
    None
}

/// Strip weekday and comments, turn `16-JUL-2025` into `16 Jul 2025`,
/// and replace a trailing zone name by its offset.
fn normalize_date(s: &str) -> String {
    let without_comment = match s.find('(') {
        Some(pos) => s[..pos].trim(),
        None => s,
    };
    let without_weekday = match without_comment.split_once(',') {
        Some((head, tail)) if head.trim().chars().all(|c| c.is_ascii_alphabetic()) => tail.trim(),
        _ => without_comment,
    };

    let mut tokens: Vec<String> = without_weekday
        .split_whitespace()
        .map(String::from)
        .collect();

    if let Some(first) = tokens.first_mut() {
        let parts: Vec<&str> = first.split('-').collect();
        if parts.len() == 3 && parts[1].chars().all(|c| c.is_ascii_alphabetic()) {
            let month = title_case(parts[1]);
            *first = format!("{} {} {}", parts[0], month, parts[2]);
        }
    }

    if let Some(last) = tokens.last_mut() {
        if let Some((_, offset)) = NAMED_ZONES
            .iter()
            .find(|(name, _)| last.eq_ignore_ascii_case(name))
        {
            *last = offset.to_string();
        }
    }

    tokens.join(" ")
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> CharsetResolver {
        CharsetResolver::default()
    }

    fn decode(input: &str) -> String {
        decode_encoded_words(input, &resolver()).unwrap()
    }

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_turkish_q_word() {
        assert_eq!(decode("=?ISO-8859-9?Q?S=FDnav_Takvimi?="), "Sınav Takvimi");
    }

    #[test]
    fn test_decode_multiple_encoded_words() {
        assert_eq!(
            decode("=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="),
            "Hola mundo"
        );
    }

    #[test]
    fn test_decode_split_multibyte_character() {
        // "ş" (C5 9F) split across two encoded words
        assert_eq!(decode("=?UTF-8?Q?=C5?= =?UTF-8?Q?=9Fehir?="), "şehir");
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        assert_eq!(decode("Re: =?UTF-8?B?SG9sYQ==?= there"), "Re: Hola there");
    }

    #[test]
    fn test_decode_plain_passthrough() {
        assert_eq!(decode("Normal subject =? not encoded"), "Normal subject =? not encoded");
    }

    #[test]
    fn test_decode_unknown_charset_still_decodes() {
        assert_eq!(decode("=?x-unknown?Q?abc?="), "abc");
    }

    #[test]
    fn test_malformed_base64_is_reported() {
        let err = decode_encoded_words("=?UTF-8?B?!!!!?=", &resolver()).unwrap_err();
        assert!(err.word.starts_with("=?UTF-8?B?"));
    }

    #[test]
    fn test_unfold_headers() {
        let text = "Subject: This is a long\n\tsubject line\nFrom: user@example.com\n";
        let headers = unfold_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "subject");
        assert_eq!(headers[0].1, "This is a long subject line");
    }

    #[test]
    fn test_headers_lookup_is_case_insensitive() {
        let headers = Headers::parse(b"X-Thing: a\r\nTo: x@y.z\r\nx-thing: b\r\n", &resolver());
        assert_eq!(headers.get("TO"), Some("x@y.z"));
        assert_eq!(headers.get_all("x-thing").collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn test_envelope_from_with_display_name() {
        let headers = Headers::parse(
            b"From: =?UTF-8?B?RHV5dXJ1IFNlcnZpc2k=?= <duyuru@example.edu>\r\nSubject: Hi\r\n",
            &resolver(),
        );
        let env = decode_envelope(&headers, &resolver());
        assert_eq!(env.from, "Duyuru Servisi <duyuru@example.edu>");
        assert_eq!(env.sender.unwrap().address, "duyuru@example.edu");
        assert!(env.issues.is_empty());
    }

    #[test]
    fn test_envelope_bare_address() {
        let headers = Headers::parse(b"From: list@example.com\r\n", &resolver());
        assert_eq!(decode_envelope(&headers, &resolver()).from, "list@example.com");
    }

    #[test]
    fn test_envelope_placeholders() {
        let headers = Headers::parse(b"Subject: =?UTF-8?B?@@@@?=\r\n", &resolver());
        let env = decode_envelope(&headers, &resolver());
        assert_eq!(env.from, SENDER_UNKNOWN);
        assert_eq!(env.subject, SUBJECT_UNDECODABLE);
        assert_eq!(env.issues.len(), 1);
        assert!(matches!(
            &env.issues[0],
            DecodeIssue::HeaderMalformed { header, .. } if header == "subject"
        ));
    }

    #[test]
    fn test_envelope_undecodable_sender() {
        let headers = Headers::parse(b"From: =?UTF-8?B?***?= <a@b.c>\r\n", &resolver());
        let env = decode_envelope(&headers, &resolver());
        assert_eq!(env.from, SENDER_UNDECODABLE);
        assert!(env.sender.is_none());
    }

    #[test]
    fn test_envelope_keeps_raw_recipient_on_failure() {
        let headers = Headers::parse(b"To: =?UTF-8?B?***?= <a@b.c>\r\n", &resolver());
        let env = decode_envelope(&headers, &resolver());
        assert_eq!(env.to, "=?UTF-8?B?***?= <a@b.c>");
        assert_eq!(env.issues.len(), 1);
    }

    #[test]
    fn test_envelope_latin5_raw_header_bytes() {
        let headers = Headers::parse(b"Subject: Duyuru \xDD\xFEleri\r\n", &resolver());
        let env = decode_envelope(&headers, &resolver());
        assert_eq!(env.subject, "Duyuru İşleri");
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-04");
    }

    #[test]
    fn test_parse_date_with_comment() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0300 (+03)").unwrap();
        assert_eq!(dt.format("%H").to_string(), "07");
    }

    #[test]
    fn test_parse_date_named_tz() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 EST").unwrap();
        assert_eq!(dt.format("%H").to_string(), "15");
    }

    #[test]
    fn test_parse_date_iso8601() {
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
    }

    #[test]
    fn test_parse_date_imap_style() {
        let dt = parse_date("16-JUL-2025 03:01:03 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2025-07-16");
        assert!(parse_date("16-JUL-2025 03:01:03").is_some());
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("").is_none());
        assert!(parse_date("yesterday-ish").is_none());
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("Mon, 16-JUL-2025 03:01:03 GMT"), "16 Jul 2025 03:01:03 +0000");
        assert_eq!(normalize_date("04 Jan 2024 10:00:00"), "04 Jan 2024 10:00:00");
    }
}

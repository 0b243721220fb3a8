//! Tagged reasons for a lossy or substituted decode.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a decoded value is not an exact rendering of its input.
///
/// Decoding never fails outright. Instead, the decoders return the best text
/// they could produce together with one of these tags, and the caller decides
/// whether to keep the text or substitute a placeholder.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DecodeIssue {
    /// The declared charset was missing, unknown or wrong; another one was used.
    #[error("declared charset {declared:?} did not apply, decoded as {used}")]
    CharsetAmbiguous {
        declared: Option<String>,
        used: String,
    },

    /// A header could not be decoded and was replaced.
    #[error("malformed {header} header: {reason}")]
    HeaderMalformed { header: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_kebab_case_tag() {
        let issue = DecodeIssue::HeaderMalformed {
            header: "subject".into(),
            reason: "bad base64".into(),
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["kind"], "header-malformed");
        assert_eq!(json["header"], "subject");

        let issue = DecodeIssue::CharsetAmbiguous {
            declared: Some("utf-8".into()),
            used: "windows-1254".into(),
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["kind"], "charset-ambiguous");
    }
}

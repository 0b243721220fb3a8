//! Separating personal mail from broadcast mail.

use crate::model::address::EmailAddress;
use crate::parser::charset::CharsetResolver;
use crate::parser::header::{decode_header_value, Headers};

/// Marker some servers put in `To:` for Bcc-only deliveries.
const UNDISCLOSED: &str = "undisclosed-recipients";

/// True when a message looks addressed to the owner personally.
///
/// That is the case when the owner address appears in To, Cc or Bcc, when
/// To names undisclosed recipients, or when To is missing altogether.
/// Broadcast lists normally put the list address in To, so none of these hold.
pub fn is_personal(headers: &Headers, owner: Option<&str>, resolver: &CharsetResolver) -> bool {
    let decode = |name: &str| {
        headers
            .get_all(name)
            .map(|raw| decode_header_value(name, Some(raw), resolver).unwrap_or_else(|_| raw.to_string()))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let to = decode("to");
    if to.trim().is_empty() || to.to_ascii_lowercase().contains(UNDISCLOSED) {
        return true;
    }

    let Some(owner) = owner.filter(|o| !o.trim().is_empty()) else {
        return false;
    };
    [to, decode("cc"), decode("bcc")]
        .iter()
        .flat_map(|value| EmailAddress::parse_list(value))
        .any(|addr| addr.is(owner))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn personal(raw: &str, owner: Option<&str>) -> bool {
        let resolver = CharsetResolver::default();
        let headers = Headers::parse(raw.as_bytes(), &resolver);
        is_personal(&headers, owner, &resolver)
    }

    #[test]
    fn test_broadcast_is_not_personal() {
        assert!(!personal("To: students@uni.edu\r\nCc: staff@uni.edu\r\n", Some("me@uni.edu")));
        assert!(!personal("To: students@uni.edu\r\n", None));
    }

    #[test]
    fn test_owner_in_any_recipient_field() {
        let owner = Some("Me@Uni.edu");
        assert!(personal("To: Me <me@uni.edu>\r\n", owner));
        assert!(personal("To: list@uni.edu\r\nCc: a@b.c, me@uni.edu\r\n", owner));
        assert!(personal("To: list@uni.edu\r\nBcc: me@uni.edu\r\n", owner));
    }

    #[test]
    fn test_undisclosed_and_missing_to() {
        assert!(personal("To: undisclosed-recipients:;\r\n", None));
        assert!(personal("Subject: no recipients\r\n", None));
    }
}

//! On-disk stores keyed by message UID: raw messages, records and the processed set.

pub mod processed;
pub mod raw;
pub mod records;

use crate::error::{ArchiveError, Result};

/// Check that a UID can be used verbatim as a filename stem.
///
/// Rejects empty UIDs, `.` and `..`, path separators and control characters.
pub fn validate_uid(uid: &str) -> Result<()> {
    let invalid = uid.is_empty()
        || uid == "."
        || uid == ".."
        || uid
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control());
    if invalid {
        return Err(ArchiveError::InvalidUid(uid.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_uid() {
        for ok in ["1", "4711", "msg-2024.01", "ÅÄÖ"] {
            assert!(validate_uid(ok).is_ok(), "{ok}");
        }
        for bad in ["", ".", "..", "a/b", "..\\x", "a\nb", "\0"] {
            assert!(
                matches!(validate_uid(bad), Err(ArchiveError::InvalidUid(_))),
                "{bad:?}"
            );
        }
    }
}

//! The set of UIDs already processed, one per line on disk.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ArchiveError, Result};

/// UIDs that need no further processing.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    path: PathBuf,
    uids: BTreeSet<String>,
}

impl ProcessedSet {
    /// Load the set from `path`. A missing file is an empty set.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let uids = match std::fs::read_to_string(&path) {
            Ok(text) => text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => return Err(ArchiveError::io(&path, e)),
        };
        debug!(path = %path.display(), count = uids.len(), "Loaded processed set");
        Ok(Self { path, uids })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.uids.contains(uid)
    }

    /// Returns `false` if the UID was already present.
    pub fn insert(&mut self, uid: impl Into<String>) -> bool {
        self.uids.insert(uid.into())
    }

    pub fn len(&self) -> usize {
        self.uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.uids.iter().map(String::as_str)
    }

    /// Write the set back, one UID per line.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }
        let mut text = String::new();
        for uid in &self.uids {
            text.push_str(uid);
            text.push('\n');
        }
        std::fs::write(&self.path, text).map_err(|e| ArchiveError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("processed_mails.txt");

        let mut set = ProcessedSet::load(&path).unwrap();
        assert!(set.is_empty());
        assert!(set.insert("10"));
        assert!(set.insert("2"));
        assert!(!set.insert("10"));
        set.persist().unwrap();

        let reloaded = ProcessedSet::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("10"));
        assert!(!reloaded.contains("3"));
    }

    #[test]
    fn test_blank_lines_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.txt");
        std::fs::write(&path, "1\n\n  2 \r\n").unwrap();
        let set = ProcessedSet::load(&path).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), ["1", "2"]);
    }
}

//! Processed records as `{content_dir}/{uid}.json`.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ArchiveError, Result};
use crate::model::mail::ProcessedRecord;
use crate::store::validate_uid;

/// Directory of JSON records, one per UID.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, uid: &str) -> Result<PathBuf> {
        validate_uid(uid)?;
        Ok(self.dir.join(format!("{uid}.json")))
    }

    /// Write a record, replacing any previous one for the same UID.
    ///
    /// The JSON goes to a temporary file in the same directory first, so a
    /// reader sees either the old record or the new one.
    pub fn write(&self, record: &ProcessedRecord) -> Result<PathBuf> {
        let path = self.path_for(&record.uid)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| ArchiveError::io(&self.dir, e))?;

        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| ArchiveError::serialization(&path, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| ArchiveError::io(&self.dir, e))?;
        tmp.write_all(&json).map_err(|e| ArchiveError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| ArchiveError::io(&path, e.error))?;

        debug!(uid = %record.uid, path = %path.display(), "Wrote record");
        Ok(path)
    }

    /// Read the record for `uid`, if one was written.
    pub fn read(&self, uid: &str) -> Result<Option<ProcessedRecord>> {
        let path = self.path_for(uid)?;
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ArchiveError::io(&path, e)),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| ArchiveError::serialization(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(uid: &str, subject: &str) -> ProcessedRecord {
        ProcessedRecord {
            uid: uid.into(),
            from: "a@b.c".into(),
            to: "list@b.c".into(),
            cc: String::new(),
            date: String::new(),
            timestamp: None,
            subject: subject.into(),
            text_contents: vec!["hello".into()],
            html_contents: Vec::new(),
            attachments: Vec::new(),
            images: Vec::new(),
            issues: Vec::new(),
        }
    }

    #[test]
    fn test_write_then_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("content"));
        assert_eq!(store.read("3").unwrap(), None);

        store.write(&record("3", "first")).unwrap();
        let path = store.write(&record("3", "second")).unwrap();

        assert_eq!(path.file_name().unwrap(), "3.json");
        assert_eq!(store.read("3").unwrap().unwrap().subject, "second");
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 1);
    }

    #[test]
    fn test_json_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let path = store.write(&record("4", "s")).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        for field in ["uid", "from", "to", "date", "subject", "text_contents", "html_contents", "attachments", "images"] {
            assert!(json.get(field).is_some(), "{field}");
        }
        assert!(json.get("issues").is_none());
    }
}

//! Raw message store: `{raw_dir}/{uid}.eml`.
//!
//! Stored bytes are kept as first seen; only [`RawStore::replace`] rewrites them.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ArchiveError, Result};
use crate::store::validate_uid;

const EXTENSION: &str = "eml";

/// Directory of verbatim messages, one file per UID.
#[derive(Debug, Clone)]
pub struct RawStore {
    dir: PathBuf,
}

impl RawStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the raw bytes of `uid`.
    pub fn path_for(&self, uid: &str) -> Result<PathBuf> {
        validate_uid(uid)?;
        Ok(self.dir.join(format!("{uid}.{EXTENSION}")))
    }

    /// Store raw bytes for `uid`. Bytes already stored are left untouched.
    pub fn save(&self, uid: &str, raw: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(uid)?;
        if path.exists() {
            debug!(uid, "Raw message already stored");
            return Ok(path);
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| ArchiveError::io(&self.dir, e))?;
        std::fs::write(&path, raw).map_err(|e| ArchiveError::io(&path, e))?;
        debug!(uid, bytes = raw.len(), "Stored raw message");
        Ok(path)
    }

    /// Store raw bytes for `uid`, replacing whatever was stored before.
    pub fn replace(&self, uid: &str, raw: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(uid)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| ArchiveError::io(&self.dir, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| ArchiveError::io(&self.dir, e))?;
        tmp.write_all(raw).map_err(|e| ArchiveError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| ArchiveError::io(&path, e.error))?;
        debug!(uid, bytes = raw.len(), "Replaced raw message");
        Ok(path)
    }

    /// Raw bytes for `uid`, or `None` if nothing is stored.
    pub fn load(&self, uid: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(uid)?;
        match std::fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ArchiveError::io(&path, e)),
        }
    }

    /// Every stored UID, sorted.
    pub fn uids(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArchiveError::io(&self.dir, e)),
        };

        let mut uids: Vec<String> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == EXTENSION))
            .filter_map(|path| path.file_stem()?.to_str().map(String::from))
            .collect();
        uids.sort();
        Ok(uids)
    }
}

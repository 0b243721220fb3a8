//! Content-addressed reuse of rendered images.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{ArchiveError, Result};

/// SHA-256 of an image's exact input bytes, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint raw bytes. Equal inputs always give equal fingerprints.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint(format!("{:x}", hasher.finalize()))
}

/// Maps fingerprints to the file produced for them.
///
/// One instance covers one dedup scope: a message, a run, or (when built
/// with [`ImageDeduplicator::load`]) everything recorded in an index file.
#[derive(Debug, Default)]
pub struct ImageDeduplicator {
    seen: BTreeMap<Fingerprint, PathBuf>,
    index_path: Option<PathBuf>,
}

impl ImageDeduplicator {
    /// Empty in-memory deduplicator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a persistent index, dropping entries whose file no longer exists.
    ///
    /// A missing index file is an empty index.
    pub fn load(index_path: impl Into<PathBuf>) -> Result<Self> {
        let index_path = index_path.into();
        let seen = if index_path.exists() {
            let data = std::fs::read(&index_path).map_err(|e| ArchiveError::io(&index_path, e))?;
            let stored: BTreeMap<Fingerprint, PathBuf> = serde_json::from_slice(&data)
                .map_err(|e| ArchiveError::serialization(&index_path, e))?;
            let total = stored.len();
            let live: BTreeMap<_, _> = stored.into_iter().filter(|(_, p)| p.exists()).collect();
            debug!(path = %index_path.display(), total, live = live.len(), "Loaded image index");
            live
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            seen,
            index_path: Some(index_path),
        })
    }

    /// Load a persistent index, starting empty when the file cannot be used.
    ///
    /// A corrupt index is moved aside to `{name}.corrupt` so the next
    /// [`persist`](Self::persist) does not overwrite it.
    pub fn open(index_path: impl Into<PathBuf>) -> Self {
        let index_path = index_path.into();
        match Self::load(&index_path) {
            Ok(dedup) => dedup,
            Err(e) => {
                if matches!(e, ArchiveError::Serialization { .. }) {
                    let mut aside = index_path.clone().into_os_string();
                    aside.push(".corrupt");
                    match std::fs::rename(&index_path, &aside) {
                        Ok(()) => warn!(
                            error = %e,
                            moved_to = %Path::new(&aside).display(),
                            "Image index unreadable, starting a new one"
                        ),
                        Err(rename_err) => warn!(
                            error = %e,
                            rename_error = %rename_err,
                            "Image index unreadable, starting a new one"
                        ),
                    }
                } else {
                    warn!(error = %e, "Image index unreadable, starting a new one");
                }
                Self {
                    seen: BTreeMap::new(),
                    index_path: Some(index_path),
                }
            }
        }
    }

    /// Write the index back to the file it was loaded from. No-op when in-memory.
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.index_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }
        let json = serde_json::to_vec_pretty(&self.seen)
            .map_err(|e| ArchiveError::serialization(path, e))?;
        std::fs::write(path, json).map_err(|e| ArchiveError::io(path, e))?;
        Ok(())
    }

    /// Return the path already produced for `digest`, or run `save` and remember its result.
    ///
    /// `save` is not called when the fingerprint is known. When it fails,
    /// nothing is recorded and the error is passed through.
    pub fn record_or_reuse<F, E>(&mut self, digest: &Fingerprint, save: F) -> std::result::Result<PathBuf, E>
    where
        F: FnOnce() -> std::result::Result<PathBuf, E>,
    {
        if let Some(path) = self.seen.get(digest) {
            debug!(fingerprint = %digest, path = %path.display(), "Reusing rendered image");
            return Ok(path.clone());
        }
        let path = save()?;
        self.seen.insert(digest.clone(), path.clone());
        Ok(path)
    }

    /// Path recorded for a fingerprint, if any.
    pub fn get(&self, digest: &Fingerprint) -> Option<&Path> {
        self.seen.get(digest).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

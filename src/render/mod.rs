//! Producing deduplicated image files from attachments and PDF pages.

pub mod dedup;
pub mod image;
pub mod pdf;

use std::path::PathBuf;

use tracing::warn;

use self::dedup::{fingerprint, ImageDeduplicator};
use self::image::ImageRenderer;

/// Renderer and deduplicator paired: every image is fingerprinted before
/// anything is written, and known content reuses the existing file.
pub struct ImageStore<'a> {
    renderer: &'a ImageRenderer,
    dedup: &'a mut ImageDeduplicator,
}

impl<'a> ImageStore<'a> {
    pub fn new(renderer: &'a ImageRenderer, dedup: &'a mut ImageDeduplicator) -> Self {
        Self { renderer, dedup }
    }

    /// Store one image as `{uid}_{prefix}{index}`, or reuse an identical one.
    ///
    /// Corrupt or unrecognized data is logged and gives `None`.
    pub fn store(&mut self, data: &[u8], uid: &str, prefix: &str, index: usize) -> Option<PathBuf> {
        let digest = fingerprint(data);
        let renderer = self.renderer;
        match self
            .dedup
            .record_or_reuse(&digest, || renderer.render(data, uid, prefix, index))
        {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(uid, prefix, index, error = %e, "Image skipped");
                None
            }
        }
    }
}

//! Turning one raw message into one persisted record.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{Config, DedupScope};
use crate::error::{ArchiveError, Result};
use crate::model::attachment::{Attachment, AttachmentKind};
use crate::model::mail::ProcessedRecord;
use crate::parser::charset::CharsetResolver;
use crate::parser::classify::is_personal;
use crate::parser::eml::{skip_from_line, split_headers};
use crate::parser::header::{decode_envelope, Headers};
use crate::parser::mime::extract_content;
use crate::render::dedup::ImageDeduplicator;
use crate::render::image::ImageRenderer;
use crate::render::pdf::PdfRasterizer;
use crate::render::ImageStore;
use crate::store::processed::ProcessedSet;
use crate::store::raw::RawStore;
use crate::store::records::RecordStore;
use crate::store::validate_uid;

/// Filename prefix of rendered image attachments.
pub const ATTACH_PREFIX: &str = "attach_";

/// What [`RecordAssembler::ingest`] did with a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A record was written.
    Written(ProcessedRecord),
    /// The UID is in the processed set; nothing was done.
    AlreadyProcessed,
    /// Personal mail, left alone and not marked as processed.
    Personal,
}

/// Switches for [`RecordAssembler::ingest`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Process even if the UID is already marked processed.
    pub force: bool,
    /// Leave personal mail alone.
    pub skip_personal: bool,
}

/// Counters for a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub written: usize,
    pub skipped: usize,
    pub missing: usize,
    pub failed: usize,
    pub images: usize,
}

/// Decodes, renders and persists messages.
///
/// Owns the image fingerprint index when its scope outlives one message.
pub struct RecordAssembler {
    config: Config,
    resolver: CharsetResolver,
    raw: RawStore,
    records: RecordStore,
    renderer: ImageRenderer,
    rasterizer: PdfRasterizer,
    shared_dedup: Option<ImageDeduplicator>,
}

impl RecordAssembler {
    /// Build an assembler with `pdftoppm` as the PDF engine.
    ///
    /// Loads the fingerprint index when the dedup scope is persistent; an
    /// unreadable index is replaced by an empty one.
    pub fn new(config: Config) -> Self {
        let shared_dedup = match config.images.dedup_scope {
            DedupScope::Message => None,
            DedupScope::Run => Some(ImageDeduplicator::new()),
            DedupScope::Persistent => Some(ImageDeduplicator::open(config.dedup_index_path())),
        };

        Self {
            resolver: CharsetResolver::from_config(&config.charset),
            raw: RawStore::new(config.archive.raw_path()),
            records: RecordStore::new(config.archive.content_path()),
            renderer: ImageRenderer::new(config.archive.image_path(), &config.images),
            rasterizer: PdfRasterizer::from_config(&config),
            shared_dedup,
            config,
        }
    }

    /// Replace the PDF engine.
    pub fn with_rasterizer(mut self, rasterizer: PdfRasterizer) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn raw_store(&self) -> &RawStore {
        &self.raw
    }

    pub fn record_store(&self) -> &RecordStore {
        &self.records
    }

    /// True when the message looks addressed to the configured owner.
    pub fn is_personal(&self, raw: &[u8]) -> bool {
        let (header_bytes, _) = split_headers(skip_from_line(raw));
        let headers = Headers::parse(header_bytes, &self.resolver);
        is_personal(
            &headers,
            self.config.archive.owner_address.as_deref(),
            &self.resolver,
        )
    }

    /// Process a newly fetched message unless the processed set says otherwise.
    ///
    /// Written UIDs are inserted into `processed`; persisting it is up to the caller.
    /// With `force`, `raw` also replaces the stored raw message so a later
    /// replay sees the same bytes.
    pub fn ingest(
        &mut self,
        uid: &str,
        raw: &[u8],
        processed: &mut ProcessedSet,
        options: IngestOptions,
    ) -> Result<Outcome> {
        validate_uid(uid)?;
        if !options.force && processed.contains(uid) {
            debug!(uid, "Already processed");
            return Ok(Outcome::AlreadyProcessed);
        }
        if options.skip_personal && self.is_personal(raw) {
            info!(uid, "Personal mail skipped");
            return Ok(Outcome::Personal);
        }

        if options.force {
            if let Err(e) = self.raw.replace(uid, raw) {
                warn!(uid, error = %e, "Could not replace raw message; continuing");
            }
        }
        let record = self.process_message(uid, raw)?;
        processed.insert(uid);
        Ok(Outcome::Written(record))
    }

    /// Store the raw bytes, build the record and write it.
    ///
    /// Only an invalid UID or a failure to write the record is an error.
    /// Everything else degrades: a raw message that cannot be stored is
    /// logged, undecodable headers get placeholders, corrupt images and
    /// failed PDFs are skipped.
    pub fn process_message(&mut self, uid: &str, raw: &[u8]) -> Result<ProcessedRecord> {
        validate_uid(uid)?;
        if let Err(e) = self.raw.save(uid, raw) {
            warn!(uid, error = %e, "Could not store raw message; continuing");
        }

        let (header_bytes, _) = split_headers(skip_from_line(raw));
        let headers = Headers::parse(header_bytes, &self.resolver);
        let envelope = decode_envelope(&headers, &self.resolver);
        let content = extract_content(raw, &self.resolver);

        let mut message_dedup = ImageDeduplicator::new();
        let dedup = match self.shared_dedup.as_mut() {
            Some(shared) => shared,
            None => &mut message_dedup,
        };
        let mut store = ImageStore::new(&self.renderer, dedup);
        let images = render_attachments(
            uid,
            &content.attachments,
            &mut store,
            &self.rasterizer,
            &self.config.pdf_temp_dir(),
        );

        let mut issues = envelope.issues;
        issues.extend(content.issues);

        let record = ProcessedRecord {
            uid: uid.to_string(),
            from: envelope.from,
            to: envelope.to,
            cc: envelope.cc,
            date: envelope.date,
            timestamp: envelope.timestamp,
            subject: envelope.subject,
            text_contents: content.text,
            html_contents: content.html,
            attachments: content
                .attachments
                .iter()
                .map(Attachment::safe_filename)
                .collect(),
            images,
            issues,
        };
        self.records.write(&record)?;

        if let Some(shared) = &self.shared_dedup {
            if let Err(e) = shared.persist() {
                warn!(error = %e, "Could not save image index; continuing");
            }
        }

        info!(
            uid,
            subject = %record.subject,
            attachments = record.attachments.len(),
            images = record.images.len(),
            "Message archived"
        );
        Ok(record)
    }

    /// Reprocess a message from the raw store.
    ///
    /// `Ok(None)` (with a warning) when nothing is stored for `uid`.
    pub fn process_stored(&mut self, uid: &str) -> Result<Option<ProcessedRecord>> {
        match self.raw.load(uid)? {
            Some(raw) => self.process_message(uid, &raw).map(Some),
            None => {
                warn!(uid, "No raw content stored, skipped");
                Ok(None)
            }
        }
    }

    /// Reprocess several stored messages, logging failures and carrying on.
    ///
    /// `on_progress` is called once per UID, after it was handled.
    pub fn replay<S: AsRef<str>>(
        &mut self,
        uids: &[S],
        mut on_progress: impl FnMut(&str),
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for uid in uids {
            let uid = uid.as_ref();
            match self.process_stored(uid) {
                Ok(Some(record)) => {
                    report.written += 1;
                    report.images += record.images.len();
                }
                Ok(None) => report.missing += 1,
                Err(e) => {
                    warn!(uid, error = %e, "Reprocessing failed");
                    report.failed += 1;
                }
            }
            on_progress(uid);
        }
        report
    }
}

/// Render image attachments and PDF pages in document order.
fn render_attachments(
    uid: &str,
    attachments: &[Attachment],
    store: &mut ImageStore<'_>,
    rasterizer: &PdfRasterizer,
    temp_dir: &Path,
) -> Vec<PathBuf> {
    let mut images = Vec::new();
    let mut image_index = 0;
    let mut pdf_index = 0;

    for attachment in attachments {
        match attachment.kind() {
            AttachmentKind::Image => {
                images.extend(store.store(&attachment.data, uid, ATTACH_PREFIX, image_index));
                image_index += 1;
            }
            AttachmentKind::Pdf => match materialize_pdf(temp_dir, &attachment.data) {
                // The temporary file is removed when `pdf` drops.
                Ok(pdf) => images.extend(rasterizer.rasterize(pdf.path(), uid, &mut pdf_index, store)),
                Err(e) => {
                    warn!(uid, attachment = %attachment.filename, error = %e, "Could not stage PDF")
                }
            },
            AttachmentKind::Other => {
                debug!(uid, attachment = %attachment.filename, "Attachment not rendered")
            }
        }
    }
    images
}

/// Copy PDF bytes to a uniquely named temporary file.
fn materialize_pdf(dir: &Path, data: &[u8]) -> Result<NamedTempFile> {
    std::fs::create_dir_all(dir).map_err(|e| ArchiveError::io(dir, e))?;
    let mut file = tempfile::Builder::new()
        .prefix("temp_")
        .suffix(".pdf")
        .tempfile_in(dir)
        .map_err(|e| ArchiveError::io(dir, e))?;
    file.write_all(data)
        .and_then(|()| file.flush())
        .map_err(|e| ArchiveError::io(file.path(), e))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialized_pdf_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let pdf = materialize_pdf(&dir.path().join("tmp"), b"%PDF-1.4").unwrap();
            let name = pdf.path().file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("temp_") && name.ends_with(".pdf"));
            assert_eq!(std::fs::read(pdf.path()).unwrap(), b"%PDF-1.4");
            pdf.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_uid_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut assembler = RecordAssembler::new(Config::with_root(dir.path()));
        let err = assembler
            .process_message("../x", b"Subject: hi\r\n\r\nbody")
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidUid(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_raw_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut assembler = RecordAssembler::new(Config::with_root(dir.path()));
        assert_eq!(assembler.process_stored("404").unwrap(), None);

        let report = assembler.replay(&["404", "bad/uid"], |_| {});
        assert_eq!(report.missing, 1);
        assert_eq!(report.failed, 1);
    }
}

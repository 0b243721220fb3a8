//! Rasterizing the first pages of a PDF through an external engine.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, error, warn, Level};

use crate::config::{Config, OutputFormat};
use crate::render::ImageStore;

/// Filename prefix of rendered PDF pages.
pub const PDF_PREFIX: &str = "pdf_";

/// Why a PDF produced no pages.
#[derive(Error, Debug)]
pub enum PdfError {
    /// The engine executable is missing or cannot be run. A setup problem.
    #[error("PDF engine '{program}' is unavailable: {source}")]
    EngineUnavailable { program: PathBuf, source: io::Error },

    /// The engine ran and rejected the document.
    #[error("PDF engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("I/O error while rasterizing: {0}")]
    Io(#[from] io::Error),
}

impl PdfError {
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, Self::EngineUnavailable { .. })
    }

    /// Severity this failure is logged at.
    pub fn level(&self) -> Level {
        if self.is_engine_unavailable() {
            Level::ERROR
        } else {
            Level::WARN
        }
    }
}

/// Something that turns a PDF file into page images.
pub trait RasterEngine {
    /// Encoded images of pages `1..=max_pages`, in page order.
    ///
    /// Documents shorter than `max_pages` yield all their pages.
    fn render_pages(&self, pdf: &Path, max_pages: u32) -> Result<Vec<Vec<u8>>, PdfError>;
}

/// Poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct Pdftoppm {
    program: PathBuf,
    dpi: u32,
    format: OutputFormat,
}

impl Pdftoppm {
    pub fn new(program: impl Into<PathBuf>, dpi: u32, format: OutputFormat) -> Self {
        Self {
            program: program.into(),
            dpi,
            format,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.pdf.engine, config.pdf.dpi, config.images.format)
    }
}

impl RasterEngine for Pdftoppm {
    fn render_pages(&self, pdf: &Path, max_pages: u32) -> Result<Vec<Vec<u8>>, PdfError> {
        let out = tempfile::Builder::new().prefix("mailkeep-pages-").tempdir()?;
        let format_flag = match self.format {
            OutputFormat::Jpeg => "-jpeg",
            OutputFormat::Png => "-png",
        };

        let output = Command::new(&self.program)
            .args(["-f", "1", "-l"])
            .arg(max_pages.to_string())
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(format_flag)
            .arg(pdf)
            .arg(out.path().join("page"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                    PdfError::EngineUnavailable {
                        program: self.program.clone(),
                        source,
                    }
                }
                _ => PdfError::Io(source),
            })?;

        if !output.status.success() {
            return Err(PdfError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // pdftoppm names pages "page-1.jpg" or "page-01.jpg" depending on page count
        let mut pages: Vec<(u32, PathBuf)> = std::fs::read_dir(out.path())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?;
                let number = stem.rsplit('-').next()?.parse().ok()?;
                Some((number, path))
            })
            .collect();
        pages.sort_by_key(|(number, _)| *number);

        pages
            .into_iter()
            .map(|(_, path)| std::fs::read(path).map_err(PdfError::from))
            .collect()
    }
}

/// Renders capped page ranges and hands every page to an [`ImageStore`].
pub struct PdfRasterizer {
    engine: Box<dyn RasterEngine>,
    max_pages: u32,
}

impl PdfRasterizer {
    pub fn new(engine: Box<dyn RasterEngine>, max_pages: u32) -> Self {
        Self { engine, max_pages }
    }

    /// `pdftoppm` with the configured DPI, format and page cap.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Box::new(Pdftoppm::from_config(config)), config.pdf.max_pages)
    }

    /// Page images of `pdf`, at most `max_pages` of them.
    pub fn pages(&self, pdf: &Path) -> Result<Vec<Vec<u8>>, PdfError> {
        if self.max_pages == 0 {
            return Ok(Vec::new());
        }
        if !pdf.is_file() {
            return Err(PdfError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a file", pdf.display()),
            )));
        }
        let mut pages = self.engine.render_pages(pdf, self.max_pages)?;
        pages.truncate(self.max_pages as usize);
        Ok(pages)
    }

    /// Render `pdf` and store its pages as `{uid}_pdf_{n}`.
    ///
    /// Page numbering starts at `next_index`, which is advanced past every
    /// page produced so several PDFs of one message never collide. Failures
    /// are logged and give an empty list.
    pub fn rasterize(
        &self,
        pdf: &Path,
        uid: &str,
        next_index: &mut usize,
        store: &mut ImageStore<'_>,
    ) -> Vec<PathBuf> {
        let pages = match self.pages(pdf) {
            Ok(pages) => pages,
            Err(e) => {
                if e.level() == Level::ERROR {
                    error!(uid, pdf = %pdf.display(), error = %e, "PDF rasterization unavailable");
                } else {
                    warn!(uid, pdf = %pdf.display(), error = %e, "PDF rasterization failed");
                }
                return Vec::new();
            }
        };

        debug!(uid, pages = pages.len(), first = *next_index, "Rasterized PDF");
        let mut images = Vec::with_capacity(pages.len());
        for page in &pages {
            if let Some(path) = store.store(page, uid, PDF_PREFIX, *next_index) {
                images.push(path);
            }
            *next_index += 1;
        }
        images
    }
}

//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILKEEP_CONFIG` (environment variable)
//! 2. `~/.config/mailkeep/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailkeep\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Nothing in the library reads configuration on its own: a [`Config`] value
//! is handed to each component's constructor.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Archive layout on disk.
    pub archive: ArchiveConfig,
    /// Charset fallback ladder.
    pub charset: CharsetConfig,
    /// Rendered image settings.
    pub images: ImageConfig,
    /// PDF rasterization settings.
    pub pdf: PdfConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the directory for the log file.
    pub log_dir: Option<PathBuf>,
}

/// Where archive artifacts live.
///
/// Relative directories are resolved against `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Archive root directory.
    pub root: PathBuf,
    /// Raw `.eml` store, one file per UID.
    pub raw_dir: PathBuf,
    /// Processed JSON records, one file per UID.
    pub content_dir: PathBuf,
    /// Rendered images.
    pub image_dir: PathBuf,
    /// File holding the set of already processed UIDs.
    pub processed_file: PathBuf,
    /// Address of the mailbox owner, used to recognize personal mail.
    pub owner_address: Option<String>,
}

/// Charset decoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharsetConfig {
    /// Charsets tried, in order, after the declared one fails.
    pub fallbacks: Vec<String>,
}

/// Output format for rendered images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    /// File extension used for rendered files.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// The matching `image` crate format.
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
        }
    }
}

/// How long the image fingerprint index lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupScope {
    /// A fresh index for every message.
    Message,
    /// One index shared by every message of a run.
    Run,
    /// An index persisted on disk and reused across runs.
    Persistent,
}

/// Rendered image settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Target format for every rendered image.
    pub format: OutputFormat,
    /// JPEG quality (1-100) when re-encoding.
    pub jpeg_quality: u8,
    /// Lifetime of the fingerprint index.
    pub dedup_scope: DedupScope,
    /// Index file for the persistent scope (relative to `archive.root`).
    pub dedup_index: PathBuf,
}

/// PDF rasterization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Rasterizer executable (poppler's `pdftoppm`).
    pub engine: PathBuf,
    /// Maximum number of pages rendered per document.
    pub max_pages: u32,
    /// Render resolution.
    pub dpi: u32,
    /// Where attachment bytes are materialized; defaults to the image directory.
    pub temp_dir: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            raw_dir: PathBuf::from("rawcontent"),
            content_dir: PathBuf::from("content"),
            image_dir: PathBuf::from("images"),
            processed_file: PathBuf::from("processed_mails.txt"),
            owner_address: None,
        }
    }
}

impl Default for CharsetConfig {
    fn default() -> Self {
        Self {
            fallbacks: ["utf-8", "iso-8859-9", "latin1", "cp1254", "ascii"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            jpeg_quality: 90,
            dedup_scope: DedupScope::Message,
            dedup_index: PathBuf::from("image_index.json"),
        }
    }
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            engine: PathBuf::from("pdftoppm"),
            max_pages: 4,
            dpi: 200,
            temp_dir: None,
        }
    }
}

impl ArchiveConfig {
    fn resolve(&self, dir: &std::path::Path) -> PathBuf {
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root.join(dir)
        }
    }

    /// Absolute (or root-relative) raw store directory.
    pub fn raw_path(&self) -> PathBuf {
        self.resolve(&self.raw_dir)
    }

    /// Record directory.
    pub fn content_path(&self) -> PathBuf {
        self.resolve(&self.content_dir)
    }

    /// Rendered image directory.
    pub fn image_path(&self) -> PathBuf {
        self.resolve(&self.image_dir)
    }

    /// Processed UID set file.
    pub fn processed_path(&self) -> PathBuf {
        self.resolve(&self.processed_file)
    }
}

impl Config {
    /// Build a configuration rooted at `root`, all other settings default.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let mut cfg = Self::default();
        cfg.archive.root = root.into();
        cfg
    }

    /// Location of the persistent fingerprint index.
    pub fn dedup_index_path(&self) -> PathBuf {
        self.archive.resolve(&self.images.dedup_index)
    }

    /// Directory that receives temporary PDF files.
    pub fn pdf_temp_dir(&self) -> PathBuf {
        match &self.pdf.temp_dir {
            Some(dir) => self.archive.resolve(dir),
            None => self.archive.image_path(),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILKEEP_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailkeep").join("config.toml"))
}

/// Return the directory for the log file.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailkeep")
}

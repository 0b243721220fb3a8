//! Normalizing image bytes to the configured output format.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};
use thiserror::Error;
use tracing::debug;

use crate::config::{ImageConfig, OutputFormat};

/// Why an image could not be rendered. Callers skip the image and continue.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unrecognized image data")]
    Unrecognized,

    #[error("corrupt {format:?} image: {source}")]
    Corrupt {
        format: ImageFormat,
        source: image::ImageError,
    },

    #[error("could not encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("could not write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Writes images as `{uid}_{prefix}{index}.{ext}` into one directory.
#[derive(Debug, Clone)]
pub struct ImageRenderer {
    dir: PathBuf,
    format: OutputFormat,
    jpeg_quality: u8,
}

impl ImageRenderer {
    pub fn new(dir: impl Into<PathBuf>, config: &ImageConfig) -> Self {
        Self {
            dir: dir.into(),
            format: config.format,
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an image with this name would be written to.
    pub fn output_path(&self, uid: &str, prefix: &str, index: usize) -> PathBuf {
        self.dir
            .join(format!("{uid}_{prefix}{index}.{}", self.format.extension()))
    }

    /// Decode `data` and write it in the output format.
    ///
    /// Input already in the output format is written byte for byte once it
    /// decodes; anything else is flattened to RGB and re-encoded.
    pub fn render(
        &self,
        data: &[u8],
        uid: &str,
        prefix: &str,
        index: usize,
    ) -> Result<PathBuf, RenderError> {
        let format = image::guess_format(data).map_err(|_| RenderError::Unrecognized)?;
        let decoded = image::load_from_memory_with_format(data, format)
            .map_err(|source| RenderError::Corrupt { format, source })?;

        let target = self.format.image_format();
        let bytes = if format == target {
            data.to_vec()
        } else {
            let rgb = decoded.to_rgb8();
            let mut buf = Cursor::new(Vec::new());
            let encoded = match self.format {
                OutputFormat::Jpeg => JpegEncoder::new_with_quality(&mut buf, self.jpeg_quality)
                    .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8),
                OutputFormat::Png => PngEncoder::new(&mut buf).write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    ExtendedColorType::Rgb8,
                ),
            };
            encoded.map_err(RenderError::Encode)?;
            buf.into_inner()
        };

        let path = self.output_path(uid, prefix, index);
        std::fs::create_dir_all(&self.dir).map_err(|source| RenderError::Write {
            path: self.dir.clone(),
            source,
        })?;
        std::fs::write(&path, &bytes).map_err(|source| RenderError::Write {
            path: path.clone(),
            source,
        })?;

        debug!(
            path = %path.display(),
            from = ?format,
            converted = format != target,
            "Rendered image"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn encode(format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 3, Rgb([200, 30, 30]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_png_converted_to_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ImageRenderer::new(dir.path(), &ImageConfig::default());
        let path = renderer.render(&encode(ImageFormat::Png), "42", "attach_", 0).unwrap();

        assert_eq!(path, dir.path().join("42_attach_0.jpg"));
        let written = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
        let img = image::load_from_memory(&written).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
    }

    #[test]
    fn test_jpeg_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ImageRenderer::new(dir.path(), &ImageConfig::default());
        let jpeg = encode(ImageFormat::Jpeg);
        let path = renderer.render(&jpeg, "42", "pdf_", 3).unwrap();
        assert_eq!(path.file_name().unwrap(), "42_pdf_3.jpg");
        assert_eq!(std::fs::read(&path).unwrap(), jpeg);
    }

    #[test]
    fn test_png_output_format() {
        let dir = tempfile::tempdir().unwrap();
        let config = ImageConfig {
            format: OutputFormat::Png,
            ..ImageConfig::default()
        };
        let renderer = ImageRenderer::new(dir.path(), &config);
        let path = renderer.render(&encode(ImageFormat::Bmp), "7", "attach_", 1).unwrap();
        assert_eq!(path.extension().unwrap(), "png");
        let written = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_garbage_is_rejected_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ImageRenderer::new(dir.path(), &ImageConfig::default());
        assert!(matches!(
            renderer.render(b"definitely not an image", "1", "attach_", 0),
            Err(RenderError::Unrecognized)
        ));

        let mut truncated = encode(ImageFormat::Png);
        truncated.truncate(20);
        assert!(matches!(
            renderer.render(&truncated, "1", "attach_", 0),
            Err(RenderError::Corrupt { .. })
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

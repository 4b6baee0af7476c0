use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageError, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{FilmError, Result};

/// Export size cap used when the config does not set one.
pub const DEFAULT_MAX_EXPORT_BYTES: u64 = 5 * 1024 * 1024;

// JPEG quality ladder for size-capped export, in percent.
const QUALITY_START: u8 = 100;
const QUALITY_STEP: u8 = 5;
const QUALITY_FLOOR: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Jpeg, ExportFormat::Png, ExportFormat::Webp];

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Jpeg => "JPG",
            ExportFormat::Png => "PNG",
            ExportFormat::Webp => "WebP",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Png => "png",
            ExportFormat::Webp => "webp",
        }
    }

    /// Guesses the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            "png" => Some(ExportFormat::Png),
            "webp" => Some(ExportFormat::Webp),
            _ => None,
        }
    }

    pub fn is_lossless(self) -> bool {
        !matches!(self, ExportFormat::Jpeg)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Encoded file contents plus the settings that produced them.
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
    /// 0..=1; always 1 for lossless formats.
    pub quality: f32,
}

impl EncodedImage {
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| FilmError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, &self.bytes).map_err(|source| FilmError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Opens and decodes an image file into RGBA.
pub fn open_image(path: &Path) -> Result<RgbaImage> {
    match image::open(path) {
        Ok(img) => Ok(img.into_rgba8()),
        Err(ImageError::IoError(source)) => Err(FilmError::Io {
            path: path.to_path_buf(),
            source,
        }),
        Err(err) => Err(FilmError::DecodeFailure(err)),
    }
}

/// Decodes in-memory file contents (JPEG, PNG, WebP, ...) into RGBA.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(DynamicImage::into_rgba8)
        .map_err(FilmError::DecodeFailure)
}

/// Encodes `img` in `format`. `quality` (0..=1) only affects JPEG.
pub fn encode(img: &RgbaImage, format: ExportFormat, quality: f32) -> Result<EncodedImage> {
    let mut bytes = Vec::new();
    let quality = match format {
        ExportFormat::Jpeg => {
            let percent = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
            encode_jpeg(img, percent, &mut bytes)?;
            percent as f32 / 100.0
        }
        ExportFormat::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut bytes,
                CompressionType::Best,
                PngFilterType::Adaptive,
            );
            DynamicImage::ImageRgba8(img.clone())
                .write_with_encoder(encoder)
                .map_err(FilmError::EncodeFailure)?;
            1.0
        }
        ExportFormat::Webp => {
            let encoder = WebPEncoder::new_lossless(&mut bytes);
            DynamicImage::ImageRgba8(img.clone())
                .write_with_encoder(encoder)
                .map_err(FilmError::EncodeFailure)?;
            1.0
        }
    };
    Ok(EncodedImage {
        bytes,
        format,
        quality,
    })
}

fn encode_jpeg(img: &RgbaImage, quality: u8, out: &mut Vec<u8>) -> Result<()> {
    // JPEG has no alpha; the pipeline output is opaque anyway.
    let rgb = DynamicImage::ImageRgba8(img.clone()).into_rgb8();
    let encoder = JpegEncoder::new_with_quality(out, quality);
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(encoder)
        .map_err(FilmError::EncodeFailure)
}

/// Encodes JPEG at full quality, stepping quality down by 0.05 until the
/// file fits in `max_bytes` or quality reaches 0.5.
///
/// When even the floor is too large the smallest attempt is returned inside
/// [`FilmError::EncodeOverLimit`].
pub fn encode_with_limit(img: &RgbaImage, max_bytes: u64) -> Result<EncodedImage> {
    let mut percent = QUALITY_START;
    loop {
        let attempt = encode(img, ExportFormat::Jpeg, percent as f32 / 100.0)?;
        let size = attempt.bytes.len() as u64;
        if size <= max_bytes {
            tracing::debug!(quality = attempt.quality, size, "export fits size cap");
            return Ok(attempt);
        }
        if percent <= QUALITY_FLOOR {
            tracing::warn!(
                quality = attempt.quality,
                size,
                limit = max_bytes,
                "export still over size cap at quality floor"
            );
            return Err(FilmError::EncodeOverLimit {
                limit: max_bytes,
                best: attempt,
            });
        }
        percent = percent.saturating_sub(QUALITY_STEP).max(QUALITY_FLOOR);
    }
}

/// Highest numeric suffix tried before falling back to `-final`.
const MAX_SUFFIX: u32 = 1000;

/// Picks `<stem>.<ext>` in `output_dir`, adding `-2`, `-3`, ... rather than
/// overwriting an existing file.
pub fn build_output_path(source_path: &Path, output_dir: &Path, format: ExportFormat) -> PathBuf {
    next_free_path(source_path, output_dir, format, |p| p.exists())
}

fn next_free_path(
    source_path: &Path,
    output_dir: &Path,
    format: ExportFormat,
    taken: impl Fn(&Path) -> bool,
) -> PathBuf {
    let stem = source_path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("monos");
    let ext = format.extension();
    std::iter::once(output_dir.join(format!("{stem}.{ext}")))
        .chain((2..MAX_SUFFIX).map(|n| output_dir.join(format!("{stem}-{n}.{ext}"))))
        .find(|p| !taken(p))
        .unwrap_or_else(|| output_dir.join(format!("{stem}-final.{ext}")))
}

/// Preview dimensions with the long edge capped at `max_long_edge`, or
/// `None` when the image already fits. Sides round to nearest and never
/// collapse below one pixel.
pub fn fit_long_edge(width: u32, height: u32, max_long_edge: u32) -> Option<(u32, u32)> {
    let long = width.max(height);
    if width == 0 || height == 0 || max_long_edge == 0 || long <= max_long_edge {
        return None;
    }
    let (long, max) = (long as u64, max_long_edge as u64);
    let scale = |side: u32| ((side as u64 * max + long / 2) / long).max(1) as u32;
    Some((scale(width), scale(height)))
}

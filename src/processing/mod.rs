//! Per-pixel film emulation stages.
//!
//! Every stage takes an owned `RgbaImage` and returns it, so the pipeline in
//! [`transform`] can thread one working copy through all of them. Each stage
//! writes 8-bit values back, matching what a byte canvas buffer would hold
//! between passes.

pub mod blur;
pub mod color;
pub mod exposure;
pub mod grain;
pub mod mono;
pub mod transform;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{FilmError, Result};

pub use transform::{transform, transform_raw, transform_seeded};

/// Default mix of the tinted colour over the untinted gray.
pub const TINT_BLEND: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurMode {
    /// Uniform square kernel of side `2 * floor(blur) + 1`.
    #[default]
    Box,
    /// Gaussian blur faded in toward the corners; the centre stays sharp.
    Radial,
}

impl BlurMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "box" => Some(BlurMode::Box),
            "radial" | "lens" | "vignette" => Some(BlurMode::Radial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Knobs that are fixed per product rather than per edit.
pub struct PipelineOptions {
    pub tint_blend: f32,
    pub blur_mode: BlurMode,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            tint_blend: TINT_BLEND,
            blur_mode: BlurMode::Box,
        }
    }
}

/// Wraps raw interleaved RGBA bytes, checking the length against the dimensions.
pub fn pixel_buffer_from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<RgbaImage> {
    let len = data.len();
    let expected = width as usize * height as usize * 4;
    if len != expected {
        return Err(FilmError::InvalidBuffer { width, height, len });
    }
    RgbaImage::from_raw(width, height, data).ok_or(FilmError::InvalidBuffer { width, height, len })
}

/// ITU-R BT.601 luma on 0..255 channel values.
pub(crate) fn luma(r: f32, g: f32, b: f32) -> f32 {
    r * 0.299 + g * 0.587 + b * 0.114
}

pub(crate) fn quantize(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

use std::path::PathBuf;

use crate::export::EncodedImage;

/// Errors produced by the film pipeline and the surrounding session/export code.
#[derive(Debug, thiserror::Error)]
pub enum FilmError {
    /// Raw pixel data does not describe a `width * height` RGBA image.
    #[error("pixel buffer of {len} bytes does not match {width}x{height} RGBA")]
    InvalidBuffer { width: u32, height: u32, len: usize },

    /// A parameter value could not be clamped into range (NaN or infinite).
    #[error("invalid value {value} for parameter `{field}`")]
    InvalidParameter { field: &'static str, value: f32 },

    /// Unknown parameter name coming from a caller (CLI, config).
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),

    #[error("failed to decode image: {0}")]
    DecodeFailure(#[source] image::ImageError),

    #[error("failed to encode image: {0}")]
    EncodeFailure(#[source] image::ImageError),

    /// Export could not get under the size cap even at the quality floor.
    /// `best` holds the smallest attempt so the caller can still use it.
    #[error("encoded image is {} bytes at quality {:.2}, over the {limit} byte limit", .best.bytes.len(), .best.quality)]
    EncodeOverLimit { limit: u64, best: EncodedImage },

    #[error("no film preset named `{0}`")]
    PresetNotFound(String),

    /// A newer render request replaced this one before it ran.
    #[error("render superseded by a newer request")]
    Superseded,

    #[error("failed to serialize config: {0}")]
    ConfigFormat(#[from] toml::ser::Error),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = FilmError> = std::result::Result<T, E>;

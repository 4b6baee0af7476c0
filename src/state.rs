use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FilmError, Result};
use crate::processing::color::rgb_to_hsl;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Colour cast applied on top of the monochrome image.
pub struct Tint {
    /// Degrees, wrapped into 0..360.
    pub hue: f32,
    /// Percent, -100..=100.
    pub saturation: f32,
    /// Channel offset; positive warms, negative cools.
    pub temperature: f32,
}

impl Default for Tint {
    fn default() -> Self {
        Self {
            hue: 0.0,
            saturation: 0.0,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Lightness bias per tonal range, in percent.
pub struct PaperTone {
    pub base: f32,
    pub highlight: f32,
    pub shadow: f32,
}

impl Default for PaperTone {
    fn default() -> Self {
        Self {
            base: 0.0,
            highlight: 0.0,
            shadow: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Full parameter set for one pipeline run.
///
/// `Default` is the identity: running the pipeline with it only converts the
/// image to grayscale.
pub struct FilmParameters {
    /// Brightness multiplier in percent, 100 leaves the image unchanged.
    pub exposure: f32,
    /// Signed percent fed straight into the contrast curve, 0 is identity.
    pub contrast: f32,
    pub grain: f32,
    pub blur: f32,
    pub tint: Tint,
    pub paper_tone: PaperTone,
}

impl Default for FilmParameters {
    fn default() -> Self {
        Self {
            exposure: 100.0,
            contrast: 0.0,
            grain: 0.0,
            blur: 0.0,
            tint: Tint::default(),
            paper_tone: PaperTone::default(),
        }
    }
}

impl FilmParameters {
    pub fn get(&self, field: ParamField) -> f32 {
        match field {
            ParamField::Exposure => self.exposure,
            ParamField::Contrast => self.contrast,
            ParamField::Grain => self.grain,
            ParamField::Blur => self.blur,
            ParamField::TintHue => self.tint.hue,
            ParamField::TintSaturation => self.tint.saturation,
            ParamField::Temperature => self.tint.temperature,
            ParamField::PaperBase => self.paper_tone.base,
            ParamField::PaperHighlight => self.paper_tone.highlight,
            ParamField::PaperShadow => self.paper_tone.shadow,
        }
    }

    fn slot(&mut self, field: ParamField) -> &mut f32 {
        match field {
            ParamField::Exposure => &mut self.exposure,
            ParamField::Contrast => &mut self.contrast,
            ParamField::Grain => &mut self.grain,
            ParamField::Blur => &mut self.blur,
            ParamField::TintHue => &mut self.tint.hue,
            ParamField::TintSaturation => &mut self.tint.saturation,
            ParamField::Temperature => &mut self.tint.temperature,
            ParamField::PaperBase => &mut self.paper_tone.base,
            ParamField::PaperHighlight => &mut self.paper_tone.highlight,
            ParamField::PaperShadow => &mut self.paper_tone.shadow,
        }
    }

    /// Stores `value` into `field` after clamping it into the field's range.
    ///
    /// Returns the value actually stored. Out-of-range values are clamped and
    /// logged; NaN and infinities are rejected.
    pub fn set(&mut self, field: ParamField, value: f32) -> Result<f32> {
        let stored = field.normalize(value)?;
        if stored != value && field != ParamField::TintHue {
            tracing::warn!(
                field = field.name(),
                requested = value,
                stored,
                "parameter out of range, clamped"
            );
        }
        *self.slot(field) = stored;
        Ok(stored)
    }

    /// Returns a copy with every field clamped into range.
    pub fn sanitized(&self) -> Result<Self> {
        let mut out = *self;
        for field in ParamField::ALL {
            out.set(field, self.get(field))?;
        }
        Ok(out)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Addressable scalar fields of [`FilmParameters`].
pub enum ParamField {
    Exposure,
    Contrast,
    Grain,
    Blur,
    TintHue,
    TintSaturation,
    Temperature,
    PaperBase,
    PaperHighlight,
    PaperShadow,
}

impl ParamField {
    pub const ALL: [ParamField; 10] = [
        ParamField::Exposure,
        ParamField::Contrast,
        ParamField::Grain,
        ParamField::Blur,
        ParamField::TintHue,
        ParamField::TintSaturation,
        ParamField::Temperature,
        ParamField::PaperBase,
        ParamField::PaperHighlight,
        ParamField::PaperShadow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ParamField::Exposure => "exposure",
            ParamField::Contrast => "contrast",
            ParamField::Grain => "grain",
            ParamField::Blur => "blur",
            ParamField::TintHue => "tint.hue",
            ParamField::TintSaturation => "tint.saturation",
            ParamField::Temperature => "tint.temperature",
            ParamField::PaperBase => "paper.base",
            ParamField::PaperHighlight => "paper.highlight",
            ParamField::PaperShadow => "paper.shadow",
        }
    }

    pub fn range(self) -> RangeInclusive<f32> {
        match self {
            ParamField::Exposure => 0.0..=200.0,
            ParamField::Contrast => -100.0..=100.0,
            ParamField::Grain | ParamField::Blur => 0.0..=100.0,
            ParamField::TintHue => 0.0..=360.0,
            ParamField::TintSaturation
            | ParamField::Temperature
            | ParamField::PaperBase
            | ParamField::PaperHighlight
            | ParamField::PaperShadow => -100.0..=100.0,
        }
    }

    fn normalize(self, value: f32) -> Result<f32> {
        if !value.is_finite() {
            return Err(FilmError::InvalidParameter {
                field: self.name(),
                value,
            });
        }
        if self == ParamField::TintHue {
            return Ok(value.rem_euclid(360.0));
        }
        let range = self.range();
        Ok(value.clamp(*range.start(), *range.end()))
    }
}

impl fmt::Display for ParamField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamField {
    type Err = FilmError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        let field = match key.as_str() {
            "exposure" | "brightness" => ParamField::Exposure,
            "contrast" => ParamField::Contrast,
            "grain" => ParamField::Grain,
            "blur" => ParamField::Blur,
            "hue" | "tint.hue" => ParamField::TintHue,
            "saturation" | "tint.saturation" => ParamField::TintSaturation,
            "temperature" | "tint.temperature" => ParamField::Temperature,
            "paper" | "paper.base" | "papertone.base" => ParamField::PaperBase,
            "paper.highlight" | "papertone.highlight" => ParamField::PaperHighlight,
            "paper.shadow" | "papertone.shadow" => ParamField::PaperShadow,
            _ => return Err(FilmError::UnknownParameter(s.to_string())),
        };
        Ok(field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Slider conventions for contrast found in front ends.
pub enum ContrastScale {
    /// -50..100 or -100..100 sliders, 0 = identity. Same as the stored value.
    Signed,
    /// 0..200 sliders where 100 = identity.
    Percent,
}

impl ContrastScale {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "signed" => Some(ContrastScale::Signed),
            "percent" => Some(ContrastScale::Percent),
            _ => None,
        }
    }

    pub fn to_signed(self, value: f32) -> f32 {
        match self {
            ContrastScale::Signed => value,
            ContrastScale::Percent => value - 100.0,
        }
    }

    pub fn from_signed(self, value: f32) -> f32 {
        match self {
            ContrastScale::Signed => value,
            ContrastScale::Percent => value + 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Flat colour wash from the simple preset schema.
pub struct HexTint {
    /// `#RRGGBB`.
    pub color: String,
    /// Percent of the colour mixed in.
    pub intensity: f32,
}

impl HexTint {
    pub fn rgb(&self) -> Option<[u8; 3]> {
        parse_hex_color(&self.color)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Simple preset schema: brightness offset, contrast, grain and an optional hex tint.
pub struct LegacySettings {
    pub contrast: f32,
    pub brightness: f32,
    pub grain: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint: Option<HexTint>,
}

impl LegacySettings {
    /// Maps the simple schema onto the HSL + paper tone model.
    ///
    /// The hex colour becomes hue, saturation scaled by intensity, and a
    /// midtone paper bias toward the colour's lightness.
    pub fn to_parameters(&self) -> FilmParameters {
        let mut params = FilmParameters {
            exposure: 100.0 + self.brightness,
            contrast: self.contrast,
            grain: self.grain,
            ..FilmParameters::default()
        };
        if let Some(tint) = self.tint.as_ref() {
            if let Some([r, g, b]) = tint.rgb() {
                let (h, s, l) = rgb_to_hsl(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
                let amount = tint.intensity.clamp(0.0, 100.0);
                params.tint.hue = h * 360.0;
                params.tint.saturation = s * amount;
                params.paper_tone.base = (l - 0.5) * amount;
            } else {
                tracing::warn!(color = %tint.color, "ignoring malformed tint colour");
            }
        }
        params
    }
}

fn parse_hex_color(raw: &str) -> Option<[u8; 3]> {
    let hex = raw.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

use image::RgbaImage;
use rayon::prelude::*;

use crate::state::FilmParameters;

use super::quantize;

/// Lightness above which the highlight paper offset applies.
const HIGHLIGHT_FROM: f32 = 0.7;
/// Lightness below which the shadow paper offset applies.
const SHADOW_BELOW: f32 = 0.3;

/// Applies tint, paper tone and temperature, then mixes the result over the
/// untinted pixel with weight `blend`.
pub fn apply(mut img: RgbaImage, params: &FilmParameters, blend: f32) -> RgbaImage {
    let tint = params.tint;
    let paper = params.paper_tone;
    if tint.hue.abs() < 0.001
        && tint.saturation.abs() < 0.001
        && tint.temperature.abs() < 0.001
        && paper.base.abs() < 0.001
        && paper.highlight.abs() < 0.001
        && paper.shadow.abs() < 0.001
    {
        return img;
    }

    let blend = blend.clamp(0.0, 1.0);
    let hue_shift_unit = tint.hue / 360.0;
    let sat_shift = tint.saturation / 100.0;
    let temp = tint.temperature;

    img.par_chunks_exact_mut(4).for_each(|px| {
        let r = px[0] as f32 / 255.0;
        let g = px[1] as f32 / 255.0;
        let b = px[2] as f32 / 255.0;

        let (h, s, l) = rgb_to_hsl(r, g, b);
        let h = wrap_unit(h + hue_shift_unit);
        let s = (s + sat_shift).clamp(0.0, 1.0);
        let offset = if l > HIGHLIGHT_FROM {
            paper.highlight
        } else if l < SHADOW_BELOW {
            paper.shadow
        } else {
            paper.base
        };
        let l = (l + offset / 100.0).clamp(0.0, 1.0);

        let (r2, g2, b2) = hsl_to_rgb(h, s, l);
        let mut tinted = [
            (r2 * 255.0).round(),
            (g2 * 255.0).round(),
            (b2 * 255.0).round(),
        ];

        // Warm pushes red up and blue down, green follows at half strength.
        tinted[0] = (tinted[0] + temp).clamp(0.0, 255.0);
        tinted[1] = (tinted[1] + temp * 0.5).clamp(0.0, 255.0);
        tinted[2] = (tinted[2] - temp).clamp(0.0, 255.0);

        for c in 0..3 {
            px[c] = quantize(tinted[c] * blend + px[c] as f32 * (1.0 - blend));
        }
    });

    img
}

fn wrap_unit(mut v: f32) -> f32 {
    while v < 0.0 {
        v += 1.0;
    }
    while v >= 1.0 {
        v -= 1.0;
    }
    v
}

/// RGB in 0..1 to (hue, saturation, lightness), all in 0..1.
pub(crate) fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g.max(b));
    let min = r.min(g.min(b));
    let l = (max + min) * 0.5;
    let d = max - min;

    if d <= 1e-6 {
        return (0.0, 0.0, l);
    }

    let s = d / (1.0 - (2.0 * l - 1.0).abs());
    let mut h = if (max - r).abs() < f32::EPSILON {
        ((g - b) / d) % 6.0
    } else if (max - g).abs() < f32::EPSILON {
        ((b - r) / d) + 2.0
    } else {
        ((r - g) / d) + 4.0
    };
    h /= 6.0;
    h = wrap_unit(h);
    (h, s.clamp(0.0, 1.0), l.clamp(0.0, 1.0))
}

pub(crate) fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s <= 1e-6 {
        return (l, l, l);
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);
    (r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0))
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    t = wrap_unit(t);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

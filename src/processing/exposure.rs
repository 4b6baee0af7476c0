use image::RgbaImage;
use rayon::prelude::*;

use crate::state::FilmParameters;

use super::quantize;

/// Applies the exposure multiplier and then the contrast curve.
///
/// Both steps write back 8-bit values, so a pixel pushed past 255 by exposure
/// stays clipped before contrast sees it.
pub fn apply(mut img: RgbaImage, params: &FilmParameters) -> RgbaImage {
    let expose = (params.exposure - 100.0).abs() >= 0.001;
    let stretch = params.contrast.abs() >= 0.001;
    if !expose && !stretch {
        return img;
    }

    let gain = params.exposure / 100.0;
    let factor = contrast_factor(params.contrast);

    img.par_chunks_exact_mut(4).for_each(|px| {
        for c in 0..3 {
            let mut v = px[c];
            if expose {
                v = quantize(v as f32 * gain);
            }
            if stretch {
                v = quantize(factor * (v as f32 - 128.0) + 128.0);
            }
            px[c] = v;
        }
    });
    img
}

/// Slope of the contrast stretch around mid-gray for a signed contrast value.
pub fn contrast_factor(contrast: f32) -> f32 {
    (259.0 * (contrast + 255.0)) / (255.0 * (259.0 - contrast))
}

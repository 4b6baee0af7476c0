use std::f64::consts::PI;

use image::RgbaImage;
use rand::Rng;
use rayon::prelude::*;

use super::{luma, quantize};

/// Per-pixel monochrome noise, one value per pixel in row-major order.
///
/// Generated before blur and added after it, so grain stays crisp over a
/// softened image.
#[derive(Debug, Clone, PartialEq)]
pub struct GrainField {
    width: u32,
    height: u32,
    noise: Vec<f32>,
}

impl GrainField {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn values(&self) -> &[f32] {
        &self.noise
    }
}

/// Draws the grain field for `img`. Returns `None` without touching `rng`
/// when `grain` is zero.
///
/// Noise amplitude is `grain * (1 - luminance²) * 0.5`, so shadows and
/// midtones carry more texture than highlights.
pub fn synthesize<R: Rng + ?Sized>(img: &RgbaImage, grain: f32, rng: &mut R) -> Option<GrainField> {
    if grain <= 0.0 {
        return None;
    }

    // Sequential on purpose: the draw order fixes the pattern for a given seed.
    let noise = img
        .pixels()
        .map(|px| {
            let lum = luma(px[0] as f32, px[1] as f32, px[2] as f32) / 255.0;
            let amount = grain * (1.0 - lum * lum) * 0.5;
            gaussian(rng) * amount
        })
        .collect();

    Some(GrainField {
        width: img.width(),
        height: img.height(),
        noise,
    })
}

/// Adds the same noise value to R, G and B of each pixel.
pub fn composite(mut img: RgbaImage, field: &GrainField) -> RgbaImage {
    debug_assert_eq!(img.dimensions(), field.dimensions());
    img.par_chunks_exact_mut(4)
        .zip(field.noise.par_iter())
        .for_each(|(px, &n)| {
            for c in 0..3 {
                px[c] = quantize(px[c] as f32 + n);
            }
        });
    img
}

/// Standard normal sample via the Box-Muller transform.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    let u1 = open_unit(rng);
    let u2 = open_unit(rng);
    ((-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()) as f32
}

fn open_unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let u: f64 = rng.r#gen();
        if u > 0.0 {
            return u;
        }
    }
}

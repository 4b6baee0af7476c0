use std::time::Instant;

use image::RgbaImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::Result;
use crate::state::FilmParameters;

use super::{PipelineOptions, blur, color, exposure, grain, mono, pixel_buffer_from_raw};

/// Runs the full film pipeline on a copy of `input`.
///
/// Order: grayscale → exposure → contrast → tint/paper tone → grain synthesis
/// → blur → grain composite. Parameters are clamped into range first; only
/// the grain stage reads from `rng`, and only when `grain > 0`.
pub fn transform<R: Rng + ?Sized>(
    input: &RgbaImage,
    params: &FilmParameters,
    options: &PipelineOptions,
    rng: &mut R,
) -> Result<RgbaImage> {
    let params = params.sanitized()?;
    let started = Instant::now();

    let mut out = mono::apply(input.clone());
    out = exposure::apply(out, &params);
    out = color::apply(out, &params, options.tint_blend);
    let grain_field = grain::synthesize(&out, params.grain, rng);
    out = blur::apply(out, params.blur, options.blur_mode);
    if let Some(field) = grain_field.as_ref() {
        out = grain::composite(out, field);
    }
    force_opaque(&mut out);

    tracing::debug!(
        width = out.width(),
        height = out.height(),
        grain = params.grain,
        blur = params.blur,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "film transform finished"
    );
    Ok(out)
}

/// [`transform`] with grain drawn from a `StdRng` seeded by `seed`.
pub fn transform_seeded(
    input: &RgbaImage,
    params: &FilmParameters,
    options: &PipelineOptions,
    seed: u64,
) -> Result<RgbaImage> {
    let mut rng = StdRng::seed_from_u64(seed);
    transform(input, params, options, &mut rng)
}

/// [`transform`] over raw interleaved RGBA bytes, validating the length first.
pub fn transform_raw<R: Rng + ?Sized>(
    width: u32,
    height: u32,
    data: &[u8],
    params: &FilmParameters,
    options: &PipelineOptions,
    rng: &mut R,
) -> Result<RgbaImage> {
    let input = pixel_buffer_from_raw(width, height, data.to_vec())?;
    transform(&input, params, options, rng)
}

fn force_opaque(img: &mut RgbaImage) {
    img.par_chunks_exact_mut(4).for_each(|px| px[3] = 255);
}

use image::RgbaImage;
use imageproc::filter::gaussian_blur_f32;
use rayon::prelude::*;

use super::{BlurMode, quantize};

/// Radial mask stops as (distance from centre / half-diagonal, blur weight).
const RADIAL_STOPS: [(f32, f32); 3] = [(0.0, 0.0), (0.6, 0.2), (1.0, 1.0)];

/// Blurs the colour channels. `blur <= 0` returns the image untouched.
pub fn apply(img: RgbaImage, blur: f32, mode: BlurMode) -> RgbaImage {
    if blur <= 0.0 || img.width() == 0 || img.height() == 0 {
        return img;
    }
    match mode {
        BlurMode::Box => box_blur(img, blur.floor() as usize),
        BlurMode::Radial => radial_blur(img, blur),
    }
}

/// Uniform `(2r+1)²` average with edge pixels repeated, done as two 1-D passes.
pub fn box_blur(mut img: RgbaImage, radius: usize) -> RgbaImage {
    if radius == 0 || img.width() == 0 || img.height() == 0 {
        return img;
    }
    let width = img.width() as usize;
    let height = img.height() as usize;

    let mut horizontal = vec![[0.0_f32; 3]; width * height];
    horizontal
        .par_chunks_exact_mut(width)
        .zip(img.par_chunks_exact(width * 4))
        .for_each(|(out, row)| {
            let line: Vec<[f32; 3]> = row
                .chunks_exact(4)
                .map(|px| [px[0] as f32, px[1] as f32, px[2] as f32])
                .collect();
            blur_line(&line, radius, out);
        });

    let columns: Vec<Vec<[f32; 3]>> = (0..width)
        .into_par_iter()
        .map(|x| {
            let line: Vec<[f32; 3]> = (0..height).map(|y| horizontal[y * width + x]).collect();
            let mut out = vec![[0.0_f32; 3]; height];
            blur_line(&line, radius, &mut out);
            out
        })
        .collect();

    img.par_chunks_exact_mut(width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let v = columns[x][y];
                px[0] = quantize(v[0]);
                px[1] = quantize(v[1]);
                px[2] = quantize(v[2]);
            }
        });
    img
}

/// Running-sum box filter over one line, clamping reads to the line ends.
fn blur_line(src: &[[f32; 3]], radius: usize, out: &mut [[f32; 3]]) {
    let n = src.len() as isize;
    let r = radius as isize;
    let size = (2 * radius + 1) as f64;
    let at = |i: isize| src[i.clamp(0, n - 1) as usize];

    let mut acc = [0.0_f64; 3];
    for k in -r..=r {
        let px = at(k);
        for c in 0..3 {
            acc[c] += px[c] as f64;
        }
    }
    for (i, slot) in out.iter_mut().enumerate() {
        let i = i as isize;
        for c in 0..3 {
            slot[c] = (acc[c] / size) as f32;
        }
        let leaving = at(i - r);
        let entering = at(i + r + 1);
        for c in 0..3 {
            acc[c] += entering[c] as f64 - leaving[c] as f64;
        }
    }
}

/// Gaussian blur (sigma = `blur`) blended in by distance from the centre.
pub fn radial_blur(mut img: RgbaImage, blur: f32) -> RgbaImage {
    let blurred = gaussian_blur_f32(&img, blur);
    let width = img.width() as usize;
    let cx = img.width() as f32 / 2.0;
    let cy = img.height() as f32 / 2.0;
    let max_r = (cx * cx + cy * cy).sqrt().max(f32::EPSILON);

    img.par_chunks_exact_mut(4)
        .zip(blurred.par_chunks_exact(4))
        .enumerate()
        .for_each(|(i, (px, soft))| {
            let x = (i % width) as f32 + 0.5 - cx;
            let y = (i / width) as f32 + 0.5 - cy;
            let w = radial_weight((x * x + y * y).sqrt() / max_r);
            for c in 0..3 {
                px[c] = quantize(px[c] as f32 * (1.0 - w) + soft[c] as f32 * w);
            }
        });
    img
}

/// Piecewise-linear interpolation through [`RADIAL_STOPS`].
fn radial_weight(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    for pair in RADIAL_STOPS.windows(2) {
        let (t0, w0) = pair[0];
        let (t1, w1) = pair[1];
        if t <= t1 {
            return w0 + (w1 - w0) * (t - t0) / (t1 - t0);
        }
    }
    RADIAL_STOPS[RADIAL_STOPS.len() - 1].1
}

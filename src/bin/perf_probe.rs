use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use image::{ImageBuffer, Rgba, RgbaImage};
use rayon::prelude::*;

use monos::config::EditorConfig;
use monos::export;
use monos::presets;
use monos::processing::transform_seeded;

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "webp", "tif", "tiff", "bmp"];
const SYNTHETIC_EDGE: u32 = 4000;

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy()) else {
        return false;
    };
    exts.iter().any(|known| ext.eq_ignore_ascii_case(known))
}

fn list_image_files(dir: &Path, limit: usize) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("read_dir failed for {}", dir.display()))?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_extension(p, IMAGE_EXTS))
        .collect();
    files.sort();
    files.truncate(limit);
    Ok(files)
}

fn median_ms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    }
}

fn synthetic_image() -> RgbaImage {
    ImageBuffer::from_fn(SYNTHETIC_EDGE, SYNTHETIC_EDGE * 2 / 3, |x, y| {
        let v = ((x ^ y) & 0xff) as u8;
        Rgba([v, v.wrapping_add(40), 255 - v, 255])
    })
}

fn preview_copy(img: &RgbaImage, max_edge: u32) -> RgbaImage {
    match export::fit_long_edge(img.width(), img.height(), max_edge) {
        Some((w, h)) => image::imageops::thumbnail(img, w, h),
        None => img.clone(),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let dir = args.next().map(PathBuf::from);
    let count = args
        .next()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(20);
    let preset_name = args.next().unwrap_or_else(|| "tri-x-400".to_string());

    let config = EditorConfig::load();
    let options = config.pipeline_options();
    let params = presets::lookup(&preset_name)?.params;

    let images: Vec<(String, RgbaImage)> = match dir.as_deref() {
        Some(dir) => {
            let files = list_image_files(dir, count)?;
            if files.is_empty() {
                anyhow::bail!("No images found in {}", dir.display());
            }
            files
                .iter()
                .map(|path| {
                    let img = export::open_image(path)
                        .with_context(|| format!("open failed for {}", path.display()))?;
                    Ok((path.display().to_string(), img))
                })
                .collect::<Result<_>>()?
        }
        None => vec![("synthetic".to_string(), synthetic_image())],
    };
    eprintln!("Using {} images, preset {}", images.len(), preset_name);

    let mut preview_samples = Vec::with_capacity(images.len());
    for (_, img) in &images {
        let preview = preview_copy(img, config.preview_max_edge);
        let t0 = Instant::now();
        let _out = transform_seeded(&preview, &params, &options, 1)?;
        preview_samples.push(t0.elapsed().as_secs_f64() * 1000.0);
    }

    let mut full_samples = Vec::with_capacity(images.len());
    for (_, img) in &images {
        let t0 = Instant::now();
        let _out = transform_seeded(img, &params, &options, 1)?;
        full_samples.push(t0.elapsed().as_secs_f64() * 1000.0);
    }

    let export_start = Instant::now();
    let sizes: Vec<u64> = images
        .par_iter()
        .map(|(name, img)| -> Result<u64> {
            let out = transform_seeded(img, &params, &options, 1)?;
            let encoded = match export::encode_with_limit(&out, config.export_max_bytes) {
                Ok(encoded) => encoded,
                Err(monos::FilmError::EncodeOverLimit { best, .. }) => best,
                Err(err) => return Err(err).with_context(|| format!("export failed for {name}")),
            };
            Ok(encoded.bytes.len() as u64)
        })
        .collect::<Result<_>>()?;
    let export_wall_s = export_start.elapsed().as_secs_f64();
    let images_per_sec = images.len() as f64 / export_wall_s.max(1e-9);

    println!("METRIC image_count={}", images.len());
    println!("METRIC preview_ms_median={:.2}", median_ms(&preview_samples));
    println!("METRIC full_ms_median={:.2}", median_ms(&full_samples));
    println!("METRIC export_wall_s={:.2}", export_wall_s);
    println!("METRIC export_images_per_sec={:.3}", images_per_sec);
    println!(
        "METRIC export_bytes_max={}",
        sizes.iter().copied().max().unwrap_or(0)
    );

    Ok(())
}

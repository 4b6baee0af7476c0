use image::RgbaImage;
use rayon::prelude::*;

use super::{luma, quantize};

/// Replaces R, G and B with their BT.601 luma.
pub fn apply(mut img: RgbaImage) -> RgbaImage {
    img.par_chunks_exact_mut(4).for_each(|px| {
        let y = quantize(luma(px[0] as f32, px[1] as f32, px[2] as f32));
        px[0] = y;
        px[1] = y;
        px[2] = y;
    });
    img
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Rgba, RgbaImage};

    use super::apply;

    fn one_pixel(rgba: [u8; 4]) -> RgbaImage {
        ImageBuffer::from_pixel(1, 1, Rgba(rgba))
    }

    #[test]
    fn pure_primaries_use_bt601_weights() {
        assert_eq!(apply(one_pixel([255, 0, 0, 255])).get_pixel(0, 0).0, [76, 76, 76, 255]);
        assert_eq!(apply(one_pixel([0, 255, 0, 255])).get_pixel(0, 0).0, [150, 150, 150, 255]);
        assert_eq!(apply(one_pixel([0, 0, 255, 255])).get_pixel(0, 0).0, [29, 29, 29, 255]);
    }

    #[test]
    fn gray_input_is_unchanged() {
        let out = apply(one_pixel([128, 128, 128, 255]));
        assert_eq!(out.get_pixel(0, 0).0, [128, 128, 128, 255]);
    }

    #[test]
    fn alpha_is_left_for_the_pipeline() {
        let out = apply(one_pixel([10, 20, 30, 40]));
        assert_eq!(out.get_pixel(0, 0)[3], 40);
    }
}

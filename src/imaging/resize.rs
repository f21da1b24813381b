//! Scale with a pixel-count ceiling.

use image::imageops::{self, FilterType};

use crate::models::Bitmap;

/// Output dimensions for `width x height` scaled by `scale`, shrunk uniformly so the
/// pixel count stays within `cap_pixels`.
pub fn capped_dimensions(width: u32, height: u32, scale: f32, cap_pixels: f64) -> (u32, u32) {
    let scale = f64::from(scale.max(0.01));
    let mut w = (f64::from(width) * scale).round().max(1.0);
    let mut h = (f64::from(height) * scale).round().max(1.0);

    let pixels = w * h;
    if cap_pixels > 0.0 && pixels > cap_pixels {
        let k = (cap_pixels / pixels).sqrt();
        w = (w * k).floor().max(1.0);
        h = (h * k).floor().max(1.0);
    }

    (w as u32, h as u32)
}

/// Resize `src` by `scale`, capped at `cap_pixels`. Always returns a new buffer.
pub fn resize_with_cap(src: &Bitmap, scale: f32, cap_pixels: f64) -> Bitmap {
    let (w, h) = capped_dimensions(src.width(), src.height(), scale, cap_pixels);
    if (w, h) == src.dimensions() {
        return src.clone();
    }
    imageops::resize(src, w, h, FilterType::CatmullRom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncapped_scale() {
        assert_eq!(capped_dimensions(100, 50, 2.0, 1_000_000.0), (200, 100));
    }

    #[test]
    fn test_cap_respected_and_aspect_kept() {
        let cap = 1.2 * 1_000_000.0;
        for (w, h, scale) in [(2480, 3508, 2.4), (4000, 1000, 3.5), (1000, 1000, 1.8)] {
            let (ow, oh) = capped_dimensions(w, h, scale, cap);
            assert!(f64::from(ow) * f64::from(oh) <= cap, "{}x{} over cap", ow, oh);
            let src_ratio = f64::from(w) / f64::from(h);
            let out_ratio = f64::from(ow) / f64::from(oh);
            assert!(
                (src_ratio - out_ratio).abs() / src_ratio < 0.01,
                "aspect drifted: {} vs {}",
                src_ratio,
                out_ratio
            );
        }
    }

    #[test]
    fn test_tiny_images_stay_non_empty() {
        assert_eq!(capped_dimensions(1, 1, 0.1, 10.0), (1, 1));
    }

    #[test]
    fn test_resize_produces_new_buffer() {
        let src = Bitmap::from_pixel(40, 20, image::Rgb([10, 20, 30]));
        let out = resize_with_cap(&src, 1.5, 1_000_000.0);
        assert_eq!(out.dimensions(), (60, 30));
        assert_eq!(src.dimensions(), (40, 20));
    }
}

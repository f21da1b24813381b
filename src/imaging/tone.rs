//! Grayscale conversion fused with a contrast stretch around mid-gray.

use image::Rgb;

use crate::models::Bitmap;

pub const MIN_CONTRAST: f32 = 0.5;
pub const MAX_CONTRAST: f32 = 2.0;

/// Integer BT.601 luma, exact for equal channels.
pub fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b) + 500) / 1000) as u8
}

fn stretch(value: u8, contrast: f32) -> u8 {
    ((f32::from(value) - 128.0) * contrast + 128.0)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Apply optional grayscale and a contrast factor (clamped to [0.5, 2.0]).
pub fn adjust_tone(src: &Bitmap, grayscale: bool, contrast: f32) -> Bitmap {
    let contrast = contrast.clamp(MIN_CONTRAST, MAX_CONTRAST);
    let mut out = src.clone();
    for pixel in out.pixels_mut() {
        if grayscale {
            let v = stretch(luma(pixel), contrast);
            *pixel = Rgb([v, v, v]);
        } else {
            let [r, g, b] = pixel.0;
            *pixel = Rgb([
                stretch(r, contrast),
                stretch(g, contrast),
                stretch(b, contrast),
            ]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grayscale_equalizes_channels() {
        let src = Bitmap::from_pixel(2, 2, Rgb([200, 100, 50]));
        let out = adjust_tone(&src, true, 1.0);
        let p = out.get_pixel(0, 0);
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
        assert_eq!(p[0], luma(&Rgb([200, 100, 50])));
    }

    #[test]
    fn test_contrast_clamped() {
        let src = Bitmap::from_pixel(1, 1, Rgb([138, 138, 138]));
        // 10.0 behaves like 2.0: 128 + 10 * 2 = 148
        assert_eq!(adjust_tone(&src, true, 10.0).get_pixel(0, 0)[0], 148);
        assert_eq!(adjust_tone(&src, true, 0.0).get_pixel(0, 0)[0], 133);
    }

    #[test]
    fn test_input_untouched() {
        let src = Bitmap::from_pixel(1, 1, Rgb([250, 10, 10]));
        let _ = adjust_tone(&src, true, 1.5);
        assert_eq!(src.get_pixel(0, 0), &Rgb([250, 10, 10]));
    }

    #[test]
    fn test_luma_exact_on_white() {
        assert_eq!(luma(&Rgb([255, 255, 255])), 255);
        assert_eq!(luma(&Rgb([0, 0, 0])), 0);
    }
}

//! Image preprocessing engine.
//!
//! Every stage takes a borrowed bitmap and returns a new one, so stages compose as a
//! chain of pure transforms: resize-with-cap, tone, unsharp mask, binarize.

mod resize;
mod sharpen;
mod threshold;
mod tone;

pub use resize::{capped_dimensions, resize_with_cap};
pub use sharpen::unsharp_mask;
pub use threshold::{binarize, otsu_threshold, sample_stride};
pub use tone::{adjust_tone, luma};

use tracing::debug;

use crate::models::Bitmap;
use crate::presets::{Attempt, ImageOptions};

/// Scale applied by the one-shot fallback.
pub const FALLBACK_SCALE: f32 = 1.6;

/// Parameters for one full preprocessing pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessParams {
    pub scale: f32,
    pub contrast: f32,
    pub sharpen: f32,
    pub grayscale: bool,
    pub binarize: bool,
    pub cap_pixels: f64,
}

impl PreprocessParams {
    pub fn from_options(options: &ImageOptions, cap_pixels: f64) -> Self {
        Self {
            scale: options.scale,
            contrast: options.contrast,
            sharpen: options.sharpen,
            grayscale: options.grayscale,
            binarize: options.binarize,
            cap_pixels,
        }
    }

    /// Low-cost settings for the fallback: grayscale only, small fixed scale.
    pub fn fallback(cap_pixels: f64) -> Self {
        Self {
            scale: FALLBACK_SCALE,
            contrast: 1.0,
            sharpen: 0.0,
            grayscale: true,
            binarize: false,
            cap_pixels,
        }
    }
}

/// Run resize, tone, optional sharpen and optional binarize.
pub fn preprocess(src: &Bitmap, params: &PreprocessParams) -> Bitmap {
    let resized = resize_with_cap(src, params.scale, params.cap_pixels);
    let mut out = adjust_tone(&resized, params.grayscale, params.contrast);
    if params.sharpen > 0.0 {
        out = unsharp_mask(&out, params.sharpen);
    }
    if params.binarize {
        out = binarize(&out);
    }
    debug!(
        "preprocessed {}x{} -> {}x{}",
        src.width(),
        src.height(),
        out.width(),
        out.height()
    );
    out
}

/// Derive an attempt's input from the preprocessed base: grayscale, the attempt's
/// scale multiplier (still capped), and its binarize flag.
pub fn attempt_variant(base: &Bitmap, attempt: &Attempt, cap_pixels: f64) -> Bitmap {
    let resized = resize_with_cap(base, attempt.scale_mul, cap_pixels);
    let gray = adjust_tone(&resized, true, 1.0);
    if attempt.binarize {
        binarize(&gray)
    } else {
        gray
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::SegmentationMode;
    use image::Rgb;

    fn sample() -> Bitmap {
        Bitmap::from_fn(120, 80, |x, y| {
            let v = ((x * 3 + y * 2) % 256) as u8;
            Rgb([v, v / 2, 255 - v])
        })
    }

    #[test]
    fn test_full_pass_respects_cap() {
        let params = PreprocessParams {
            scale: 3.0,
            contrast: 1.2,
            sharpen: 0.6,
            grayscale: true,
            binarize: true,
            cap_pixels: 20_000.0,
        };
        let out = preprocess(&sample(), &params);
        assert!(f64::from(out.width() * out.height()) <= params.cap_pixels);
        assert!(out
            .pixels()
            .all(|p| p.0 == [0, 0, 0] || p.0 == [255, 255, 255]));
    }

    #[test]
    fn test_attempt_variant_shrinks() {
        let base = sample();
        let attempt = Attempt {
            label: "tiny",
            segmentation: SegmentationMode::LINE,
            scale_mul: 0.7,
            binarize: false,
            ordinal: 1,
        };
        let out = attempt_variant(&base, &attempt, 1_000_000.0);
        assert_eq!(out.dimensions(), (84, 56));
        let p = out.get_pixel(10, 10);
        assert_eq!(p[0], p[1]);
    }

    #[test]
    fn test_fallback_params() {
        let params = PreprocessParams::fallback(900_000.0);
        assert!(!params.binarize);
        assert!(params.grayscale);
        assert_eq!(params.scale, FALLBACK_SCALE);
    }
}

//! Global Otsu binarization on a sampled histogram.

use image::Rgb;

use super::tone::luma;
use crate::models::Bitmap;

/// Sample budget for the histogram.
pub const HISTOGRAM_SAMPLES: f64 = 400_000.0;

/// Threshold used when the histogram holds a single class.
const DEFAULT_THRESHOLD: u8 = 127;

/// Sampling stride so that roughly [`HISTOGRAM_SAMPLES`] pixels are visited.
pub fn sample_stride(width: u32, height: u32) -> u32 {
    let pixels = f64::from(width) * f64::from(height);
    ((pixels / HISTOGRAM_SAMPLES).sqrt().floor() as u32).max(1)
}

fn histogram(src: &Bitmap) -> [u64; 256] {
    let stride = sample_stride(src.width(), src.height()) as usize;
    let mut hist = [0u64; 256];
    for y in (0..src.height()).step_by(stride) {
        for x in (0..src.width()).step_by(stride) {
            hist[luma(src.get_pixel(x, y)) as usize] += 1;
        }
    }
    hist
}

/// Threshold maximizing between-class variance. Pixels above it are foreground.
///
/// The first maximum wins, so a histogram with only 0 and 255 yields 0 and an
/// already binary image maps onto itself.
pub fn otsu_threshold(hist: &[u64; 256]) -> u8 {
    let total: u64 = hist.iter().sum();
    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &n)| i as f64 * n as f64)
        .sum();

    let mut weight_bg = 0u64;
    let mut sum_bg = 0.0f64;
    let mut best_variance = 0.0f64;
    let mut threshold = DEFAULT_THRESHOLD;

    for (t, &count) in hist.iter().enumerate() {
        weight_bg += count;
        sum_bg += t as f64 * count as f64;
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            break;
        }
        let mean_bg = sum_bg / weight_bg as f64;
        let mean_fg = (sum_all - sum_bg) / weight_fg as f64;
        let variance = weight_bg as f64 * weight_fg as f64 * (mean_bg - mean_fg).powi(2);
        if variance > best_variance {
            best_variance = variance;
            threshold = t as u8;
        }
    }

    threshold
}

/// Produce a pure black/white copy of `src`.
pub fn binarize(src: &Bitmap) -> Bitmap {
    let threshold = otsu_threshold(&histogram(src));
    let mut out = src.clone();
    for pixel in out.pixels_mut() {
        let v = if luma(pixel) > threshold { 255 } else { 0 };
        *pixel = Rgb([v, v, v]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_page() -> Bitmap {
        Bitmap::from_fn(300, 200, |x, y| {
            // Dark strokes on a light, uneven background.
            let ink = (x / 7 + y / 11) % 5 == 0;
            let v = if ink { 30 + (x % 20) as u8 } else { 190 + (y % 40) as u8 };
            Rgb([v, v, v])
        })
    }

    #[test]
    fn test_output_is_pure_black_and_white() {
        let out = binarize(&gradient_page());
        assert!(out
            .pixels()
            .all(|p| p.0 == [0, 0, 0] || p.0 == [255, 255, 255]));
    }

    #[test]
    fn test_idempotent() {
        let once = binarize(&gradient_page());
        let twice = binarize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_threshold_separates_bimodal_histogram() {
        let mut hist = [0u64; 256];
        hist[40] = 500;
        hist[200] = 1500;
        let t = otsu_threshold(&hist);
        assert!((40..200).contains(&t));
    }

    #[test]
    fn test_flat_image_keeps_default_threshold() {
        let mut hist = [0u64; 256];
        hist[90] = 1000;
        assert_eq!(otsu_threshold(&hist), DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_sample_stride() {
        assert_eq!(sample_stride(100, 100), 1);
        assert_eq!(sample_stride(2000, 2000), 3);
        assert_eq!(sample_stride(4000, 4000), 6);
    }
}

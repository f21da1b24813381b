//! Unsharp mask.

use imageproc::filter::gaussian_blur_f32;

use crate::models::Bitmap;

/// Blur radius of the mask. Mild on purpose; OCR text edges are thin.
const BLUR_SIGMA: f32 = 1.1;

/// Boost the high-frequency residual by `(1 + amount)`, `amount` clamped to [0, 1].
pub fn unsharp_mask(src: &Bitmap, amount: f32) -> Bitmap {
    let gain = 1.0 + amount.clamp(0.0, 1.0);
    let blurred = gaussian_blur_f32(src, BLUR_SIGMA);

    let mut out = src.clone();
    for (pixel, soft) in out.pixels_mut().zip(blurred.pixels()) {
        for c in 0..3 {
            let v = f32::from(pixel[c]);
            let residual = v - f32::from(soft[c]);
            pixel[c] = (v + residual * gain).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

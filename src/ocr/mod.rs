//! OCR engine boundary.
//!
//! The pipeline depends only on the [`OcrEngine`]/[`OcrSession`] traits. The
//! shipped implementation drives the Tesseract CLI.

mod backend;
mod tesseract;

pub use backend::{OcrEngine, OcrError, OcrSession, Recognition, ResourcePaths};
pub use tesseract::{parse_tsv, TesseractEngine};

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// External tools the pipeline can use, and whether each is installed.
pub fn check_tools() -> Vec<(&'static str, bool)> {
    ["tesseract", "pdfinfo", "pdftoppm", "pdftotext"]
        .into_iter()
        .map(|tool| (tool, check_binary(tool)))
        .collect()
}

//! Service layer.
//!
//! Domain logic separated from UI concerns. The CLI drives these services and
//! renders the events they emit.

pub mod ocr;

pub use ocr::{OcrService, Phase, ProgressEvent, RunSummary};

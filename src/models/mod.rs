//! Data models for the recognition pipeline.

mod document;
mod page;

pub use document::{Batch, Document, DocumentKind, QueueSlot, QueuedPage};
pub use page::{
    AttemptOutcome, AttemptRecord, Page, PageError, PageImage, ProcessingResult, Resolution,
    MIN_PRE_EXTRACTED_CHARS,
};

/// Pixel buffer used throughout the pipeline.
pub type Bitmap = image::RgbImage;

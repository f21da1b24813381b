//! ocrflow - adaptive multi-stage OCR for scanned documents and images.
//!
//! Pages move through a per-page pipeline with a wall-clock budget: load,
//! preprocess, a ladder of progressively cheaper recognition attempts, and a
//! one-shot fallback. Recognized text is cleaned up and reflowed for reading.

pub mod cli;
pub mod config;
pub mod export;
pub mod imaging;
pub mod ingest;
pub mod models;
pub mod ocr;
pub mod presets;
pub mod services;
pub mod text;
pub mod work_queue;

//! OCR engine adapter contract.
//!
//! The pipeline talks to a recognizer only through these traits:
//! - [`OcrEngine::initialize`] creates a persistent [`OcrSession`] for a language set.
//! - [`OcrSession::configure`] and [`OcrSession::recognize`] run configured recognition.
//! - [`OcrEngine::recognize_once`] is a stateless call that works without a session.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Bitmap;
use crate::presets::{EngineParams, Languages, SegmentationMode};

/// Errors from OCR engines.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Engine not available: {0}")]
    EngineUnavailable(String),

    #[error("Engine initialization failed: {0}")]
    EngineInit(String),

    #[error("Recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Recognized text and the engine's mean confidence (0-100).
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub confidence: Option<f32>,
}

impl Recognition {
    /// True when the engine returned something worth keeping.
    pub fn is_usable(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Where an engine finds its language data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePaths {
    pub data_dir: Option<PathBuf>,
}

/// A persistent, configured recognizer.
///
/// Callers must not overlap calls on one session; the service keeps it behind an
/// async mutex.
#[async_trait]
pub trait OcrSession: Send {
    /// Set the layout assumption and tuning for subsequent calls.
    async fn configure(
        &mut self,
        mode: SegmentationMode,
        params: &EngineParams,
    ) -> Result<(), OcrError>;

    async fn recognize(&mut self, bitmap: &Bitmap) -> Result<Recognition, OcrError>;
}

/// A recognizer factory plus a stateless fallback path.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs and tool checks.
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// What is needed to make this engine available.
    fn availability_hint(&self) -> String;

    /// Create a session for `languages`.
    async fn initialize(&self, languages: Languages) -> Result<Box<dyn OcrSession>, OcrError>;

    /// One-shot recognition with engine defaults, independent of any session.
    async fn recognize_once(
        &self,
        bitmap: &Bitmap,
        languages: Languages,
        resources: &ResourcePaths,
    ) -> Result<Recognition, OcrError>;
}

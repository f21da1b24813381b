//! Page model: one recognizable unit and its settlement state.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::Bitmap;

/// Minimum length of embedded text for it to replace recognition.
pub const MIN_PRE_EXTRACTED_CHARS: usize = 50;

/// Where a page's pixels come from. Encoded sources are decoded during the
/// pipeline's load stage, under a deadline.
#[derive(Debug, Clone)]
pub enum PageImage {
    /// An image file on disk.
    Path(PathBuf),
    /// An encoded image held in memory, e.g. a rendered PDF page.
    Encoded(Arc<Vec<u8>>),
    /// Already decoded pixels.
    Decoded(Arc<Bitmap>),
}

/// Classified per-page failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PageError {
    #[error("render timed out: {0}")]
    RenderTimeout(String),
    #[error("recognition timed out after {0}s")]
    RecognitionTimeout(u64),
    #[error("OCR failed: {0}")]
    RecognitionFailure(String),
    #[error("page budget exceeded")]
    BudgetExceeded,
    #[error("skipped by user")]
    UserSkipped,
}

/// Result of one ladder rung or the fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub label: String,
    pub outcome: AttemptOutcome,
}

/// How a page reached its terminal state.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Embedded text was long enough; recognition was skipped.
    PreExtracted,
    /// A ladder rung produced text.
    Ladder { label: String },
    /// Only the one-shot fallback produced text.
    Fallback,
    Failed(PageError),
}

/// Outcome handed to [`Page::settle`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    pub text: String,
    pub confidence: Option<f32>,
    pub resolution: Resolution,
}

impl ProcessingResult {
    pub fn failed(error: PageError) -> Self {
        Self {
            text: String::new(),
            confidence: None,
            resolution: Resolution::Failed(error),
        }
    }
}

/// One page of a document.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page number within the document.
    pub number: u32,
    pub image: PageImage,
    pub pre_extracted: Option<String>,
    pub text: String,
    /// 0-100, unset until recognized.
    pub confidence: Option<f32>,
    /// Latest warning or the final failure message.
    pub error: Option<String>,
    pub attempts: Vec<AttemptRecord>,
    resolution: Option<Resolution>,
}

impl Page {
    pub fn new(number: u32, image: PageImage) -> Self {
        Self {
            number,
            image,
            pre_extracted: None,
            text: String::new(),
            confidence: None,
            error: None,
            attempts: Vec::new(),
            resolution: None,
        }
    }

    /// Attach embedded text, keeping it only if it is long enough to trust.
    pub fn with_pre_extracted(mut self, text: Option<String>) -> Self {
        self.pre_extracted = text.filter(|t| t.chars().count() >= MIN_PRE_EXTRACTED_CHARS);
        self
    }

    /// 0 while pending, 1 once settled.
    pub fn progress(&self) -> u8 {
        u8::from(self.resolution.is_some())
    }

    pub fn is_settled(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    /// Record a failed attempt and surface it as the page's current warning.
    pub fn record_warning(&mut self, label: &str, outcome: AttemptOutcome) {
        let reason = match &outcome {
            AttemptOutcome::Failed(reason) => reason.clone(),
            AttemptOutcome::TimedOut => "timed out".to_string(),
            AttemptOutcome::Succeeded => String::new(),
        };
        if !matches!(outcome, AttemptOutcome::Succeeded) {
            self.error = Some(format!("OCR ({}): {}", label, reason));
        }
        self.attempts.push(AttemptRecord {
            label: label.to_string(),
            outcome,
        });
    }

    /// Move the page to its terminal state.
    ///
    /// Returns false and leaves the page untouched if it was already settled, so the
    /// 0 to 1 progress transition happens once.
    pub fn settle(&mut self, result: ProcessingResult) -> bool {
        if self.resolution.is_some() {
            return false;
        }
        match &result.resolution {
            Resolution::Failed(error) => {
                self.error = Some(error.to_string());
            }
            _ => {
                self.text = result.text;
                self.confidence = result.confidence;
                self.error = None;
            }
        }
        self.resolution = Some(result.resolution);
        true
    }
}

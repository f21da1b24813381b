//! OCR service types and events.

use crate::models::{PageError, Resolution};

/// Coarse stage a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Paged sources being rasterized.
    Rendering,
    /// A page moving through the recognition pipeline.
    Recognizing,
    /// A page reached its terminal state.
    PageSettled,
    /// Every queued page settled.
    Finished,
}

/// Best-effort progress notification. Senders use `try_send`, so consumers that
/// fall behind lose events rather than stalling the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub phase: Phase,
    /// Position of the page in the run's queue.
    pub page_index: usize,
    pub total_pages: usize,
    pub filename: String,
    pub overall_percent: u8,
    pub sub_phase_label: Option<String>,
    pub sub_phase_percent: u8,
}

/// Counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_pages: usize,
    pub pre_extracted: usize,
    pub recognized: usize,
    pub via_fallback: usize,
    pub failed: usize,
    pub skipped: usize,
    pub budget_exceeded: usize,
    pub timed_out: usize,
    /// Session creation failed and every call went through the one-shot path.
    pub degraded: bool,
}

impl RunSummary {
    pub fn record(&mut self, resolution: &Resolution) {
        match resolution {
            Resolution::PreExtracted => self.pre_extracted += 1,
            Resolution::Ladder { .. } => self.recognized += 1,
            Resolution::Fallback => self.via_fallback += 1,
            Resolution::Failed(error) => {
                self.failed += 1;
                match error {
                    PageError::UserSkipped => self.skipped += 1,
                    PageError::BudgetExceeded => self.budget_exceeded += 1,
                    PageError::RecognitionTimeout(_) | PageError::RenderTimeout(_) => {
                        self.timed_out += 1
                    }
                    PageError::RecognitionFailure(_) => {}
                }
            }
        }
    }

    pub fn settled(&self) -> usize {
        self.pre_extracted + self.recognized + self.via_fallback + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        summary.record(&Resolution::PreExtracted);
        summary.record(&Resolution::Ladder {
            label: "normal".into(),
        });
        summary.record(&Resolution::Failed(PageError::BudgetExceeded));
        summary.record(&Resolution::Failed(PageError::UserSkipped));
        assert_eq!(summary.settled(), 4);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.budget_exceeded, 1);
        assert_eq!(summary.skipped, 1);
    }
}

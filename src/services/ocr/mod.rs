//! Recognition service.
//!
//! Runs every queued page through the adaptive pipeline with bounded concurrency.
//! Separated from UI concerns: progress is reported as events on an optional channel.

mod ladder;
mod pipeline;
mod progress;
mod types;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::models::Batch;
use crate::ocr::{OcrEngine, ResourcePaths};
use crate::presets::hardware_hint;
use crate::text::TextOptions;
use crate::work_queue::{run_with_concurrency, SkipToken};

pub use ladder::{transition, LadderEvent, LadderState, Terminal};
pub use pipeline::{
    fallback_deadline, is_fast_mode, FALLBACK_CEILING, FALLBACK_GRACE, FAST_MODE_PIXELS,
    LOAD_DEADLINE,
};
pub use progress::{estimate_percent, ProgressEmitter, TICK_INTERVAL};
pub use types::{Phase, ProgressEvent, RunSummary};

use pipeline::{percent, process_page, RunContext};

/// Service for recognizing batches of pages.
pub struct OcrService {
    engine: Arc<dyn OcrEngine>,
    resources: ResourcePaths,
    hardware_hint: usize,
}

impl OcrService {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            resources: ResourcePaths::default(),
            hardware_hint: hardware_hint(),
        }
    }

    /// Resource paths handed to one-shot calls.
    pub fn with_resources(mut self, resources: ResourcePaths) -> Self {
        self.resources = resources;
        self
    }

    /// Override the detected hardware parallelism.
    pub fn with_hardware_hint(mut self, hint: usize) -> Self {
        self.hardware_hint = hint.max(1);
        self
    }

    pub fn engine(&self) -> &dyn OcrEngine {
        self.engine.as_ref()
    }

    /// Recognize every unsettled page in the batch.
    ///
    /// Per-page failures are recorded on the page and never abort the run; every
    /// page ends settled. A session is created once per run. If that fails the run
    /// is degraded and every recognition goes through the stateless one-shot call.
    pub async fn run(
        &self,
        batch: &mut Batch,
        config: &PipelineConfig,
        text: &TextOptions,
        skip: &SkipToken,
        events: Option<mpsc::Sender<ProgressEvent>>,
    ) -> RunSummary {
        let total_pages = batch.total_pages();
        let mut summary = RunSummary {
            total_pages,
            ..Default::default()
        };

        let settled = AtomicUsize::new(batch.settled_pages());
        let pending = batch.pending();
        let jobs = batch.checkout(&pending);
        let needs_engine = jobs.iter().any(|job| job.page.pre_extracted.is_none());

        let session = if needs_engine {
            match self.engine.initialize(config.options.languages).await {
                Ok(session) => Some(Mutex::new(session)),
                Err(e) => {
                    warn!(
                        "{} session unavailable, using one-shot recognition for this run: {}",
                        self.engine.name(),
                        e
                    );
                    summary.degraded = true;
                    None
                }
            }
        } else {
            None
        };

        let preset = config.preset();
        let limit = preset.ocr_concurrency.limit(self.hardware_hint);
        info!(
            "recognizing {} of {} page(s) with preset {} ({} at a time)",
            pending.len(),
            total_pages,
            preset.id,
            limit
        );

        let ctx = RunContext {
            engine: self.engine.as_ref(),
            session: session.as_ref(),
            resources: &self.resources,
            config,
            text,
            skip,
            events: events.as_ref(),
            settled: &settled,
            total_pages,
        };

        let ctx = &ctx;
        let resolutions = run_with_concurrency(jobs, limit, |_, job| {
            process_page(ctx, job.index, job.document_name, job.page)
        })
        .await;

        for resolution in &resolutions {
            summary.record(resolution);
        }

        if let Some(tx) = &events {
            let _ = tx.try_send(ProgressEvent {
                phase: Phase::Finished,
                page_index: total_pages.saturating_sub(1),
                total_pages,
                filename: String::new(),
                overall_percent: percent(total_pages, total_pages),
                sub_phase_label: None,
                sub_phase_percent: 100,
            });
        }

        info!(
            "run finished: {} recognized, {} by fallback, {} embedded, {} failed",
            summary.recognized, summary.via_fallback, summary.pre_extracted, summary.failed
        );
        summary
    }
}

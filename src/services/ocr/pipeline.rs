//! Per-page recognition driver.
//!
//! Walks one page through the ladder state machine: load the bitmap, run the full
//! preprocessing pass, try each rung of the preset's ladder under its own sub-budget,
//! and fall back to a single low-cost one-shot call when no rung produced text.
//! Every step is guarded by a deadline, and the whole page by the configured timeout.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::ladder::{transition, LadderEvent, LadderState, Terminal};
use super::progress::ProgressEmitter;
use super::types::{Phase, ProgressEvent};
use crate::config::PipelineConfig;
use crate::imaging::{attempt_variant, preprocess, PreprocessParams};
use crate::ingest::{decode_page_image, IngestError};
use crate::models::{AttemptOutcome, Bitmap, Page, PageError, ProcessingResult, Resolution};
use crate::ocr::{OcrEngine, OcrError, OcrSession, Recognition, ResourcePaths};
use crate::presets::{Attempt, ImageOptions, Languages};
use crate::text::{postprocess, TextOptions};
use crate::work_queue::{guard, Guarded, PageBudget, SkipToken};

/// Upper bound on decoding a page's pixels.
pub const LOAD_DEADLINE: Duration = Duration::from_secs(20);
/// Longest the fallback may run.
pub const FALLBACK_CEILING: Duration = Duration::from_secs(20);
/// Minimum time granted to the fallback, even when the page budget is spent.
pub const FALLBACK_GRACE: Duration = Duration::from_secs(3);

const RENDER_PHASE: Duration = Duration::from_secs(12);
const PREPROCESS_PHASE: Duration = Duration::from_secs(8);
const POSTPROCESS_PHASE: Duration = Duration::from_secs(2);

/// Bitmaps below this many pixels get the cheaper fast-mode settings.
pub const FAST_MODE_PIXELS: u64 = 1_000_000;

static FAST_MODE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)logo|brand|mark|icon|badge").unwrap());

/// Whether a page should use fast-mode settings: small bitmaps, or sources whose
/// name suggests a logo-like graphic.
pub fn is_fast_mode(bitmap: &Bitmap, name: &str) -> bool {
    u64::from(bitmap.width()) * u64::from(bitmap.height()) < FAST_MODE_PIXELS
        || FAST_MODE_NAME.is_match(name)
}

/// Deadline for the fallback given the time left on the page.
pub fn fallback_deadline(remaining: Duration) -> Duration {
    FALLBACK_CEILING.min(remaining.max(FALLBACK_GRACE))
}

async fn blocking<T, F>(work: F) -> Result<T, String>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| format!("worker failed: {}", e))
}

/// Shared state for every page of one run.
pub(super) struct RunContext<'a> {
    pub engine: &'a dyn OcrEngine,
    /// `None` when session creation failed; every call then goes one-shot.
    pub session: Option<&'a Mutex<Box<dyn OcrSession>>>,
    pub resources: &'a ResourcePaths,
    pub config: &'a PipelineConfig,
    pub text: &'a TextOptions,
    pub skip: &'a SkipToken,
    pub events: Option<&'a mpsc::Sender<ProgressEvent>>,
    pub settled: &'a AtomicUsize,
    pub total_pages: usize,
}

impl RunContext<'_> {
    pub fn overall_percent(&self) -> u8 {
        percent(self.settled.load(Ordering::SeqCst), self.total_pages)
    }
}

pub(super) fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.min(total) * 100 / total) as u8
}

/// Drive one page to its terminal state and settle it.
pub(super) async fn process_page(
    ctx: &RunContext<'_>,
    index: usize,
    name: &str,
    page: &mut Page,
) -> Resolution {
    let result = match page.pre_extracted.clone() {
        Some(text) => ProcessingResult {
            text,
            confidence: Some(100.0),
            resolution: Resolution::PreExtracted,
        },
        None => {
            let timeout = ctx.config.timeout;
            let number = page.number;
            match tokio::time::timeout(timeout, run_ladder(ctx, index, name, page)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "{} page {} hit the {}s timeout",
                        name,
                        number,
                        timeout.as_secs()
                    );
                    ProcessingResult::failed(PageError::RecognitionTimeout(timeout.as_secs()))
                }
            }
        }
    };

    let resolution = result.resolution.clone();
    if !page.settle(result) {
        debug!("{} page {} was already settled", name, page.number);
        return page.resolution().cloned().unwrap_or(resolution);
    }

    match &resolution {
        Resolution::Failed(error) => warn!("{} page {}: {}", name, page.number, error),
        Resolution::Ladder { label } => info!("{} page {}: recognized ({})", name, page.number, label),
        Resolution::Fallback => info!("{} page {}: recognized by fallback", name, page.number),
        Resolution::PreExtracted => info!("{} page {}: used embedded text", name, page.number),
    }

    let done = ctx.settled.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some(tx) = ctx.events {
        let _ = tx.try_send(ProgressEvent {
            phase: Phase::PageSettled,
            page_index: index,
            total_pages: ctx.total_pages,
            filename: name.to_string(),
            overall_percent: percent(done, ctx.total_pages),
            sub_phase_label: None,
            sub_phase_percent: 100,
        });
    }
    resolution
}

async fn run_ladder(
    ctx: &RunContext<'_>,
    index: usize,
    name: &str,
    page: &mut Page,
) -> ProcessingResult {
    let mut run = PageRun {
        ctx,
        name,
        budget: PageBudget::start(ctx.config.preset().page_budget),
        progress: ProgressEmitter::new(
            ctx.events.cloned(),
            index,
            ctx.total_pages,
            name,
            ctx.overall_percent(),
        ),
        options: ctx.config.options,
        bitmap: None,
        base: None,
        attempts: Vec::new(),
        recognized: None,
        last_error: None,
        page,
    };

    let mut state = LadderState::Load;
    loop {
        let event = if run.ctx.skip.take() {
            LadderEvent::Skipped
        } else if state.checks_budget() && run.budget.over_budget() {
            debug!("{} page {}: budget spent entering {:?}", name, run.page.number, state);
            LadderEvent::OverBudget
        } else {
            match state {
                LadderState::Load => run.load().await,
                LadderState::Preprocess => run.preprocess().await,
                LadderState::Attempt(k) => run.attempt(k).await,
                LadderState::Fallback => run.fallback().await,
                LadderState::Done(terminal) => return run.finish(terminal).await,
            }
        };

        state = match transition(state, event, run.attempts.len()) {
            Some(next) => next,
            None => {
                warn!("no transition from {:?} on {:?}", state, event);
                LadderState::Done(Terminal::RecognitionFailure)
            }
        };
        if let LadderState::Done(terminal) = state {
            return run.finish(terminal).await;
        }
    }
}

/// Working state for one page's pipeline.
struct PageRun<'r, 'a> {
    ctx: &'r RunContext<'a>,
    name: &'r str,
    budget: PageBudget,
    progress: ProgressEmitter,
    options: ImageOptions,
    bitmap: Option<Arc<Bitmap>>,
    base: Option<Arc<Bitmap>>,
    attempts: Vec<Attempt>,
    recognized: Option<(Recognition, Resolution)>,
    last_error: Option<String>,
    page: &'r mut Page,
}

impl PageRun<'_, '_> {
    fn cap_pixels(&self) -> f64 {
        self.ctx.config.preset().cap_pixels()
    }

    async fn load(&mut self) -> LadderEvent {
        self.progress.start("Render", RENDER_PHASE);
        let image = self.page.image.clone();
        let deadline = LOAD_DEADLINE.min(self.ctx.config.timeout);
        let decode = async move {
            blocking(move || decode_page_image(&image))
                .await
                .map_err(IngestError::Decode)
                .and_then(|decoded| decoded)
        };

        match guard(decode, deadline, "render").await {
            Guarded::Completed(bitmap) => {
                let fast = is_fast_mode(&bitmap, self.name);
                if fast {
                    debug!("{} page {}: fast mode", self.name, self.page.number);
                    self.options = self.options.fast_mode();
                }
                self.attempts = self
                    .ctx
                    .config
                    .preset()
                    .attempts(fast, self.options.segmentation);
                self.bitmap = Some(bitmap);
                LadderEvent::Loaded
            }
            Guarded::Failed(e) => {
                self.last_error = Some(e.to_string());
                LadderEvent::LoadFailed
            }
            Guarded::TimedOut { after, .. } => {
                self.last_error = Some(format!(
                    "{} page {} after {}s",
                    self.name,
                    self.page.number,
                    after.as_secs()
                ));
                LadderEvent::LoadTimedOut
            }
        }
    }

    async fn preprocess(&mut self) -> LadderEvent {
        self.progress.start("Preprocess", PREPROCESS_PHASE);
        let Some(bitmap) = self.bitmap.clone() else {
            return LadderEvent::PreprocessFailed;
        };
        let params = PreprocessParams::from_options(&self.options, self.cap_pixels());
        match blocking(move || preprocess(&bitmap, &params)).await {
            Ok(base) => {
                self.base = Some(Arc::new(base));
                LadderEvent::Preprocessed
            }
            Err(e) => {
                warn!("{} page {}: preprocessing failed: {}", self.name, self.page.number, e);
                self.last_error = Some(e);
                LadderEvent::PreprocessFailed
            }
        }
    }

    async fn attempt(&mut self, k: usize) -> LadderEvent {
        let (Some(attempt), Some(base)) = (self.attempts.get(k).copied(), self.base.clone()) else {
            return LadderEvent::AttemptFailed;
        };
        let cap_pixels = self.cap_pixels();
        let variant = match blocking(move || attempt_variant(&base, &attempt, cap_pixels)).await {
            Ok(variant) => variant,
            Err(e) => {
                self.fail_attempt(attempt.label, AttemptOutcome::Failed(e));
                return LadderEvent::AttemptFailed;
            }
        };

        // The sub-budget covers waiting for the session as well as recognition.
        let preset = self.ctx.config.preset();
        let sub_budget = preset.attempt_budget.for_remaining(self.budget.remaining());
        let label = format!("OCR ({})", attempt.label);
        self.progress.start(&label, sub_budget);

        let outcome = guard(
            recognize_variant(self.ctx, &variant, attempt, self.options.languages),
            sub_budget,
            &label,
        )
        .await;

        match outcome {
            Guarded::Completed(recognition) if recognition.is_usable() => {
                self.page
                    .record_warning(attempt.label, AttemptOutcome::Succeeded);
                self.recognized = Some((
                    recognition,
                    Resolution::Ladder {
                        label: attempt.label.to_string(),
                    },
                ));
                LadderEvent::AttemptSucceeded
            }
            Guarded::Completed(_) => {
                self.fail_attempt(attempt.label, AttemptOutcome::Failed("no text".into()));
                LadderEvent::AttemptFailed
            }
            Guarded::Failed(e) => {
                self.fail_attempt(attempt.label, AttemptOutcome::Failed(e.to_string()));
                LadderEvent::AttemptFailed
            }
            Guarded::TimedOut { .. } => {
                self.fail_attempt(attempt.label, AttemptOutcome::TimedOut);
                LadderEvent::AttemptFailed
            }
        }
    }

    async fn fallback(&mut self) -> LadderEvent {
        let deadline = fallback_deadline(self.budget.remaining());
        self.progress.start("Fallback", deadline);
        let Some(bitmap) = self.bitmap.clone() else {
            return LadderEvent::FallbackFailed;
        };

        // Starts again from the loaded bitmap, not the preprocessed base.
        let outcome = guard(
            recognize_fallback(
                self.ctx,
                bitmap,
                self.cap_pixels(),
                self.options.languages,
            ),
            deadline,
            "fallback",
        )
        .await;

        match outcome {
            Guarded::Completed(recognition) if recognition.is_usable() => {
                self.page
                    .record_warning("fallback", AttemptOutcome::Succeeded);
                self.recognized = Some((recognition, Resolution::Fallback));
                return LadderEvent::FallbackSucceeded;
            }
            Guarded::Completed(_) => {
                self.fail_attempt("fallback", AttemptOutcome::Failed("no text".into()))
            }
            Guarded::Failed(e) => {
                self.fail_attempt("fallback", AttemptOutcome::Failed(e.to_string()))
            }
            Guarded::TimedOut { .. } => self.fail_attempt("fallback", AttemptOutcome::TimedOut),
        }

        if self.budget.over_budget() {
            LadderEvent::FallbackOverBudget
        } else {
            LadderEvent::FallbackFailed
        }
    }

    fn fail_attempt(&mut self, label: &str, outcome: AttemptOutcome) {
        debug!(
            "{} page {}: attempt {} failed: {:?}",
            self.name, self.page.number, label, outcome
        );
        self.page.record_warning(label, outcome);
        self.last_error = self.page.error.clone();
    }

    async fn finish(mut self, terminal: Terminal) -> ProcessingResult {
        self.progress.stop();
        let reason = self
            .last_error
            .take()
            .unwrap_or_else(|| "no attempt produced text".to_string());

        match terminal {
            Terminal::Recognized | Terminal::RecognizedByFallback => {
                let Some((recognition, resolution)) = self.recognized.take() else {
                    return ProcessingResult::failed(PageError::RecognitionFailure(reason));
                };
                self.progress.start("Post-process", POSTPROCESS_PHASE);
                let languages = self.options.languages;
                let options = *self.ctx.text;
                let raw = recognition.text.clone();
                let text = match blocking(move || postprocess(&raw, languages, &options)).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("post-processing failed, keeping raw text: {}", e);
                        recognition.text
                    }
                };
                self.progress.stop();
                ProcessingResult {
                    text,
                    confidence: recognition.confidence,
                    resolution,
                }
            }
            Terminal::BudgetExceeded => ProcessingResult::failed(PageError::BudgetExceeded),
            Terminal::UserSkipped => ProcessingResult::failed(PageError::UserSkipped),
            Terminal::RenderTimeout => ProcessingResult::failed(PageError::RenderTimeout(reason)),
            Terminal::LoadFailed | Terminal::RecognitionFailure => {
                ProcessingResult::failed(PageError::RecognitionFailure(reason))
            }
        }
    }
}

/// Recognize a rung's bitmap through the session, or one-shot when the run is
/// degraded.
async fn recognize_variant(
    ctx: &RunContext<'_>,
    variant: &Bitmap,
    attempt: Attempt,
    languages: Languages,
) -> Result<Recognition, OcrError> {
    match ctx.session {
        Some(session) => {
            let mut session = session.lock().await;
            session
                .configure(attempt.segmentation, &ctx.config.preset().engine)
                .await?;
            session.recognize(variant).await
        }
        None => {
            ctx.engine
                .recognize_once(variant, languages, ctx.resources)
                .await
        }
    }
}

/// The last-chance path: light preprocessing and a stateless engine call.
async fn recognize_fallback(
    ctx: &RunContext<'_>,
    bitmap: Arc<Bitmap>,
    cap_pixels: f64,
    languages: Languages,
) -> Result<Recognition, OcrError> {
    let params = PreprocessParams::fallback(cap_pixels);
    let prepared = blocking(move || preprocess(&bitmap, &params))
        .await
        .map_err(OcrError::RecognitionFailed)?;
    ctx.engine
        .recognize_once(&prepared, languages, ctx.resources)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_mode_detection() {
        let small = Bitmap::new(800, 600);
        assert!(is_fast_mode(&small, "scan.png"));

        let large = Bitmap::new(1200, 1000);
        assert!(!is_fast_mode(&large, "scan.png"));
        assert!(is_fast_mode(&large, "Company_LOGO.png"));
        assert!(is_fast_mode(&large, "badge-2.jpg"));
    }

    #[test]
    fn test_fallback_deadline() {
        assert_eq!(fallback_deadline(Duration::ZERO), FALLBACK_GRACE);
        assert_eq!(
            fallback_deadline(Duration::from_secs(8)),
            Duration::from_secs(8)
        );
        assert_eq!(fallback_deadline(Duration::from_secs(60)), FALLBACK_CEILING);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 4), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(4, 4), 100);
        assert_eq!(percent(0, 0), 100);
    }
}

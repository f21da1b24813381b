//! Per-page progress emitter.
//!
//! Owned by one page's pipeline run. Each sub-phase starts a ticker that estimates
//! percent-complete from elapsed time against the phase's nominal budget; stopping
//! the phase reports 100. Dropping the emitter stops any running ticker.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::types::{Phase, ProgressEvent};

pub const TICK_INTERVAL: Duration = Duration::from_millis(300);

/// Estimates never claim more than this until the phase actually stops.
const ESTIMATE_CEILING: u8 = 94;

/// Percent estimate for `elapsed` out of `budget`, kept within 1..=94.
pub fn estimate_percent(elapsed: Duration, budget: Duration) -> u8 {
    if budget.is_zero() {
        return ESTIMATE_CEILING;
    }
    let ratio = elapsed.as_secs_f64() / budget.as_secs_f64();
    ((ratio * f64::from(ESTIMATE_CEILING)).floor() as u64).clamp(1, u64::from(ESTIMATE_CEILING))
        as u8
}

pub struct ProgressEmitter {
    tx: Option<mpsc::Sender<ProgressEvent>>,
    template: ProgressEvent,
    label: Option<String>,
    ticker: Option<JoinHandle<()>>,
}

impl ProgressEmitter {
    pub fn new(
        tx: Option<mpsc::Sender<ProgressEvent>>,
        page_index: usize,
        total_pages: usize,
        filename: &str,
        overall_percent: u8,
    ) -> Self {
        Self {
            tx,
            template: ProgressEvent {
                phase: Phase::Recognizing,
                page_index,
                total_pages,
                filename: filename.to_string(),
                overall_percent,
                sub_phase_label: None,
                sub_phase_percent: 0,
            },
            label: None,
            ticker: None,
        }
    }

    fn event(&self, label: &str, percent: u8) -> ProgressEvent {
        ProgressEvent {
            sub_phase_label: Some(label.to_string()),
            sub_phase_percent: percent,
            ..self.template.clone()
        }
    }

    /// Begin a sub-phase, finishing any phase still running.
    pub fn start(&mut self, label: &str, budget: Duration) {
        self.stop();
        let Some(tx) = self.tx.clone() else {
            return;
        };
        self.label = Some(label.to_string());

        let first = self.event(label, 1);
        let _ = tx.try_send(first.clone());
        self.ticker = Some(tokio::spawn(async move {
            let started = Instant::now();
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                let event = ProgressEvent {
                    sub_phase_percent: estimate_percent(started.elapsed(), budget),
                    ..first.clone()
                };
                if tx.try_send(event).is_err() && tx.is_closed() {
                    break;
                }
            }
        }));
    }

    /// Finish the current sub-phase and report it complete.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let (Some(tx), Some(label)) = (&self.tx, self.label.take()) {
            let _ = tx.try_send(self.event(&label, 100));
        }
    }
}

impl Drop for ProgressEmitter {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_percent_bounds() {
        let budget = Duration::from_secs(10);
        assert_eq!(estimate_percent(Duration::ZERO, budget), 1);
        assert_eq!(estimate_percent(Duration::from_secs(5), budget), 47);
        assert_eq!(estimate_percent(Duration::from_secs(60), budget), 94);
        assert_eq!(estimate_percent(Duration::from_secs(1), Duration::ZERO), 94);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_then_completes() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut emitter = ProgressEmitter::new(Some(tx), 0, 1, "scan.png", 0);

        emitter.start("OCR (normal)", Duration::from_secs(3));
        tokio::time::sleep(Duration::from_millis(1000)).await;
        emitter.stop();
        drop(emitter);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(events.len() >= 3);
        assert!(events
            .iter()
            .all(|e| e.sub_phase_label.as_deref() == Some("OCR (normal)")));
        let last = events.last().unwrap();
        assert_eq!(last.sub_phase_percent, 100);
        let ticks: Vec<u8> = events[..events.len() - 1]
            .iter()
            .map(|e| e.sub_phase_percent)
            .collect();
        assert!(ticks.windows(2).all(|w| w[0] <= w[1]));
        assert!(ticks.iter().all(|p| (1..=94).contains(p)));
    }

    #[tokio::test]
    async fn test_without_channel_is_inert() {
        let mut emitter = ProgressEmitter::new(None, 0, 1, "x", 0);
        emitter.start("Render", Duration::from_secs(1));
        assert!(emitter.ticker.is_none());
        emitter.stop();
    }
}

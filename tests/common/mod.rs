//! Scripted OCR engine for pipeline tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use ocrflow::models::{Batch, Bitmap, Document, DocumentKind, Page, PageImage};
use ocrflow::ocr::{OcrEngine, OcrError, OcrSession, Recognition, ResourcePaths};
use ocrflow::presets::{EngineParams, Languages, SegmentationMode};

/// What a recognition call does.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(&'static str),
    Fail,
    Hang,
    After(Duration, &'static str),
}

#[derive(Debug, Default)]
pub struct Stats {
    pub init_calls: AtomicUsize,
    pub session_calls: AtomicUsize,
    pub once_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub configured: Mutex<Vec<u8>>,
}

impl Stats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct InFlight(Arc<Stats>);

impl InFlight {
    fn enter(stats: &Arc<Stats>) -> Self {
        let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(stats.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn answer(reply: Reply) -> Result<Recognition, OcrError> {
    let text = match reply {
        Reply::Text(text) => text,
        Reply::Fail => return Err(OcrError::RecognitionFailed("scripted failure".into())),
        Reply::Hang => std::future::pending().await,
        Reply::After(delay, text) => {
            tokio::time::sleep(delay).await;
            text
        }
    };
    Ok(Recognition {
        text: text.to_string(),
        confidence: Some(87.0),
    })
}

/// Replies are consumed in order; `fallback` answers once the script runs out.
#[derive(Debug, Clone)]
pub struct Script {
    queue: Arc<Mutex<VecDeque<Reply>>>,
    fallback: Reply,
}

impl Script {
    pub fn always(reply: Reply) -> Self {
        Self::sequence(Vec::new(), reply)
    }

    pub fn sequence(replies: Vec<Reply>, then: Reply) -> Self {
        Self {
            queue: Arc::new(Mutex::new(replies.into())),
            fallback: then,
        }
    }

    fn next(&self) -> Reply {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

pub struct MockEngine {
    pub init_fails: bool,
    pub session: Script,
    pub once: Script,
    pub stats: Arc<Stats>,
}

impl MockEngine {
    pub fn new(session: Script, once: Script) -> Self {
        Self {
            init_fails: false,
            session,
            once,
            stats: Arc::new(Stats::default()),
        }
    }

    pub fn hanging() -> Self {
        Self::new(Script::always(Reply::Hang), Script::always(Reply::Hang))
    }

    pub fn failing_init(once: Script) -> Self {
        Self {
            init_fails: true,
            ..Self::new(Script::always(Reply::Fail), once)
        }
    }
}

struct MockSession {
    script: Script,
    stats: Arc<Stats>,
}

#[async_trait]
impl OcrSession for MockSession {
    async fn configure(
        &mut self,
        mode: SegmentationMode,
        _params: &EngineParams,
    ) -> Result<(), OcrError> {
        self.stats.configured.lock().unwrap().push(mode.get());
        Ok(())
    }

    async fn recognize(&mut self, _bitmap: &Bitmap) -> Result<Recognition, OcrError> {
        self.stats.session_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.stats);
        answer(self.script.next()).await
    }
}

#[async_trait]
impl OcrEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        "always available".to_string()
    }

    async fn initialize(&self, _languages: Languages) -> Result<Box<dyn OcrSession>, OcrError> {
        self.stats.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.init_fails {
            return Err(OcrError::EngineInit("scripted init failure".into()));
        }
        Ok(Box::new(MockSession {
            script: self.session.clone(),
            stats: self.stats.clone(),
        }))
    }

    async fn recognize_once(
        &self,
        _bitmap: &Bitmap,
        _languages: Languages,
        _resources: &ResourcePaths,
    ) -> Result<Recognition, OcrError> {
        self.stats.once_calls.fetch_add(1, Ordering::SeqCst);
        answer(self.once.next()).await
    }
}

/// A small page; small enough to take the fast-mode path.
pub fn small_page(number: u32) -> Page {
    Page::new(
        number,
        PageImage::Decoded(Arc::new(Bitmap::from_pixel(64, 48, image::Rgb([240, 240, 240])))),
    )
}

pub fn paged_batch(name: &str, pages: Vec<Page>) -> Batch {
    Batch::new(vec![Document::new(name, DocumentKind::Paged, pages)])
}

//! Ingestion: turn input files into documents and pages.
//!
//! Image files become single-page documents decoded lazily by the pipeline.
//! PDFs are rasterized page by page through poppler, with the embedded text layer
//! extracted alongside so pages that already carry text can skip recognition.

mod password;
mod pdf;

pub use password::{NoPrompt, PasswordPrompt, PasswordReason};
pub use pdf::{open_pdf, PdfSource};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::{Bitmap, Document, DocumentKind, Page, PageImage};
use crate::services::ocr::{Phase, ProgressEvent};
use crate::text::normalize_extracted;
use crate::work_queue::{guard, run_with_concurrency, Guarded};

/// Scale for rasterizing paged sources, relative to 72 dpi.
pub const RENDER_SCALE: f32 = 2.0;
pub const RENDER_TIMEOUT: Duration = Duration::from_secs(20);
pub const TEXT_LAYER_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors that abort ingestion of a batch.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("{0} is password protected")]
    PasswordRequired(String),

    #[error("Incorrect password for {0}")]
    PasswordIncorrect(String),

    #[error("Password entry cancelled for {0}")]
    Cancelled(String),

    #[error("Render timed out: {0}")]
    RenderTimeout(String),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "webp", "bmp", "tif", "tiff", "gif"];

/// Detect what kind of document a file is, by content first and extension second.
pub fn detect_kind(path: &Path) -> Option<DocumentKind> {
    if let Ok(Some(kind)) = infer::get_from_path(path) {
        let mime = kind.mime_type();
        if mime == "application/pdf" {
            return Some(DocumentKind::Paged);
        }
        if mime.starts_with("image/") {
            return Some(DocumentKind::Image);
        }
    }
    let ext = path.extension()?.to_str()?.to_lowercase();
    if ext == "pdf" {
        Some(DocumentKind::Paged)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(DocumentKind::Image)
    } else {
        None
    }
}

/// Decode a page's pixels. Blocking; run it off the async threads.
pub fn decode_page_image(image: &PageImage) -> Result<Arc<Bitmap>, IngestError> {
    match image {
        PageImage::Decoded(bitmap) => Ok(bitmap.clone()),
        PageImage::Path(path) => image::open(path)
            .map(|img| Arc::new(img.to_rgb8()))
            .map_err(|e| IngestError::Decode(format!("{}: {}", path.display(), e))),
        PageImage::Encoded(bytes) => image::load_from_memory(bytes)
            .map(|img| Arc::new(img.to_rgb8()))
            .map_err(|e| IngestError::Decode(e.to_string())),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Turns files into documents.
pub struct Ingestor {
    render_limit: usize,
    render_scale: f32,
    tool_dir: Option<PathBuf>,
    password: Option<String>,
    events: Option<mpsc::Sender<ProgressEvent>>,
}

impl Ingestor {
    pub fn new(render_limit: usize) -> Self {
        Self {
            render_limit,
            render_scale: RENDER_SCALE,
            tool_dir: None,
            password: None,
            events: None,
        }
    }

    pub fn with_tool_dir(mut self, tool_dir: Option<PathBuf>) -> Self {
        self.tool_dir = tool_dir;
        self
    }

    /// Password tried first on encrypted documents.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<ProgressEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Ingest every file, in order. Any failure aborts the whole batch.
    pub async fn ingest(
        &self,
        paths: &[PathBuf],
        prompt: &dyn PasswordPrompt,
    ) -> Result<Vec<Document>, IngestError> {
        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let document = match detect_kind(path) {
                Some(DocumentKind::Image) => Document::new(
                    file_name(path),
                    DocumentKind::Image,
                    vec![Page::new(1, PageImage::Path(path.clone()))],
                ),
                Some(DocumentKind::Paged) => self.ingest_pdf(path, prompt).await?,
                None => return Err(IngestError::Unsupported(path.display().to_string())),
            };
            info!(
                "ingested {} ({} page(s))",
                document.name,
                document.pages.len()
            );
            documents.push(document.with_source_path(path.clone()));
        }
        Ok(documents)
    }

    async fn ingest_pdf(
        &self,
        path: &Path,
        prompt: &dyn PasswordPrompt,
    ) -> Result<Document, IngestError> {
        let name = file_name(path);
        let (source, count) =
            open_pdf(path, self.password.clone(), prompt, self.tool_dir.clone()).await?;

        let numbers: Vec<u32> = (1..=count).collect();
        let source = &source;
        let name_ref = name.as_str();
        let results = run_with_concurrency(numbers, self.render_limit, |index, number| async move {
            self.emit_render(name_ref, index, count as usize);
            self.load_pdf_page(source, number).await
        })
        .await;

        let pages = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(Document::new(name, DocumentKind::Paged, pages))
    }

    async fn load_pdf_page(&self, source: &PdfSource, number: u32) -> Result<Page, IngestError> {
        let text = match guard(source.extract_text(number), TEXT_LAYER_TIMEOUT, "text layer").await
        {
            Guarded::Completed(text) => Some(normalize_extracted(&text)),
            other => {
                if let Some(reason) = other.failure_reason() {
                    warn!("no text layer for page {}: {}", number, reason);
                }
                None
            }
        };

        let label = format!("render page {}", number);
        let png = match guard(source.render(number, self.render_scale), RENDER_TIMEOUT, &label).await
        {
            Guarded::Completed(png) => png,
            Guarded::Failed(e) => return Err(e),
            Guarded::TimedOut { label, .. } => return Err(IngestError::RenderTimeout(label)),
        };

        Ok(Page::new(number, PageImage::Encoded(Arc::new(png))).with_pre_extracted(text))
    }

    fn emit_render(&self, filename: &str, index: usize, total: usize) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(ProgressEvent {
                phase: Phase::Rendering,
                page_index: index,
                total_pages: total,
                filename: filename.to_string(),
                overall_percent: (index * 100 / total.max(1)) as u8,
                sub_phase_label: Some("Render".to_string()),
                sub_phase_percent: 0,
            });
        }
    }
}

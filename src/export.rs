//! Result export: flat text and JSON.

use serde::{Deserialize, Serialize};

use crate::models::{Document, DocumentKind};

/// Output format for recognized batches.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
        }
    }

    pub fn render(&self, documents: &[Document]) -> Result<String, serde_json::Error> {
        match self {
            OutputFormat::Text => Ok(to_text(documents)),
            OutputFormat::Json => to_json(documents),
        }
    }
}

/// Flat text: a header per document and a divider per page of paged sources.
/// Failed pages show their error in place of text.
pub fn to_text(documents: &[Document]) -> String {
    let blocks: Vec<String> = documents
        .iter()
        .map(|doc| match doc.kind {
            DocumentKind::Image => {
                let text = doc.pages.first().map(|p| p.text.trim()).unwrap_or("");
                format!("# Image: {}\n{}\n", doc.name, text)
            }
            DocumentKind::Paged => {
                let pages: Vec<String> = doc
                    .pages
                    .iter()
                    .enumerate()
                    .map(|(i, page)| {
                        let body = if page.text.is_empty() {
                            page.error.as_deref().unwrap_or("")
                        } else {
                            page.text.as_str()
                        };
                        format!("----- Page {} -----\n{}\n", i + 1, body.trim())
                    })
                    .collect();
                format!("# PDF: {}\n{}\n", doc.name, pages.join("\n"))
            }
        })
        .collect();
    blocks.join("\n").trim().to_string()
}

#[derive(Serialize)]
struct PageRecord<'a> {
    page: usize,
    confidence: Option<f32>,
    text: &'a str,
    error: Option<&'a str>,
}

#[derive(Serialize)]
struct DocumentRecord<'a> {
    name: &'a str,
    kind: DocumentKind,
    pages: Vec<PageRecord<'a>>,
}

/// Pretty-printed JSON array of documents with per-page results.
pub fn to_json(documents: &[Document]) -> Result<String, serde_json::Error> {
    let records: Vec<DocumentRecord<'_>> = documents
        .iter()
        .map(|doc| DocumentRecord {
            name: &doc.name,
            kind: doc.kind,
            pages: doc
                .pages
                .iter()
                .enumerate()
                .map(|(i, page)| PageRecord {
                    page: i + 1,
                    confidence: page.confidence,
                    text: &page.text,
                    error: page.error.as_deref(),
                })
                .collect(),
        })
        .collect();
    serde_json::to_string_pretty(&records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bitmap, Page, PageError, PageImage, ProcessingResult, Resolution};
    use std::sync::Arc;

    fn page(number: u32, result: ProcessingResult) -> Page {
        let mut page = Page::new(number, PageImage::Decoded(Arc::new(Bitmap::new(1, 1))));
        page.settle(result);
        page
    }

    fn recognized(text: &str) -> ProcessingResult {
        ProcessingResult {
            text: text.to_string(),
            confidence: Some(91.5),
            resolution: Resolution::Ladder {
                label: "normal".into(),
            },
        }
    }

    fn sample() -> Vec<Document> {
        vec![
            Document::new("logo.png", DocumentKind::Image, vec![page(1, recognized("ACME\n"))]),
            Document::new(
                "report.pdf",
                DocumentKind::Paged,
                vec![
                    page(1, recognized("first page")),
                    page(2, ProcessingResult::failed(PageError::BudgetExceeded)),
                ],
            ),
        ]
    }

    #[test]
    fn test_text_export_layout() {
        let text = to_text(&sample());
        assert_eq!(
            text,
            "# Image: logo.png\nACME\n\n\
             # PDF: report.pdf\n\
             ----- Page 1 -----\nfirst page\n\n\
             ----- Page 2 -----\npage budget exceeded"
        );
    }

    #[test]
    fn test_json_export_fields() {
        let json = to_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let docs = value.as_array().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["kind"], "image");
        assert_eq!(docs[1]["kind"], "paged");
        let pages = docs[1]["pages"].as_array().unwrap();
        assert_eq!(pages[0]["page"], 1);
        assert_eq!(pages[0]["confidence"], 91.5);
        assert!(pages[0]["error"].is_null());
        assert_eq!(pages[1]["error"], "page budget exceeded");
        assert!(pages[1]["confidence"].is_null());
    }

    #[test]
    fn test_empty_batch() {
        assert_eq!(to_text(&[]), "");
        assert_eq!(to_json(&[]).unwrap(), "[]");
    }
}

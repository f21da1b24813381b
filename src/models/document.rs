//! Documents and the in-memory batch they live in.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::page::Page;

/// Source shape of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// A single image file.
    Image,
    /// A multi-page source such as a PDF.
    Paged,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Paged => "paged",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub kind: DocumentKind,
    pub source_path: Option<PathBuf>,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(name: impl Into<String>, kind: DocumentKind, pages: Vec<Page>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            source_path: None,
            pages,
        }
    }

    pub fn with_source_path(mut self, path: PathBuf) -> Self {
        self.source_path = Some(path);
        self
    }
}

/// Unit of recognition work: one page addressed by document and page index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueSlot {
    pub document: usize,
    pub page: usize,
}

/// A queued page borrowed out of the batch for processing.
#[derive(Debug)]
pub struct QueuedPage<'a> {
    pub slot: QueueSlot,
    /// Position across the whole batch, used in progress events.
    pub index: usize,
    pub document_name: &'a str,
    pub page: &'a mut Page,
}

/// Documents held for one session. Nothing is persisted; [`Batch::clear`] is the only
/// way pages go away.
#[derive(Debug, Default)]
pub struct Batch {
    pub documents: Vec<Document>,
}

impl Batch {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn push(&mut self, document: Document) {
        self.documents.push(document);
    }

    /// Queue of every page, in document then page order.
    pub fn queue(&self) -> Vec<QueueSlot> {
        self.documents
            .iter()
            .enumerate()
            .flat_map(|(document, doc)| {
                (0..doc.pages.len()).map(move |page| QueueSlot { document, page })
            })
            .collect()
    }

    /// Slots whose pages have not settled yet.
    pub fn pending(&self) -> Vec<QueueSlot> {
        self.queue()
            .into_iter()
            .filter(|slot| {
                self.page(*slot)
                    .is_some_and(|page| !page.is_settled())
            })
            .collect()
    }

    pub fn page(&self, slot: QueueSlot) -> Option<&Page> {
        self.documents.get(slot.document)?.pages.get(slot.page)
    }

    /// Borrow the pages named by `slots`, in batch order. Slots that don't exist
    /// are ignored.
    pub fn checkout(&mut self, slots: &[QueueSlot]) -> Vec<QueuedPage<'_>> {
        let wanted: HashSet<QueueSlot> = slots.iter().copied().collect();
        let mut checked_out = Vec::with_capacity(wanted.len());
        let mut index = 0;
        for (d, document) in self.documents.iter_mut().enumerate() {
            let name = document.name.as_str();
            for (p, page) in document.pages.iter_mut().enumerate() {
                let slot = QueueSlot {
                    document: d,
                    page: p,
                };
                if wanted.contains(&slot) {
                    checked_out.push(QueuedPage {
                        slot,
                        index,
                        document_name: name,
                        page,
                    });
                }
                index += 1;
            }
        }
        checked_out
    }

    pub fn total_pages(&self) -> usize {
        self.documents.iter().map(|d| d.pages.len()).sum()
    }

    pub fn settled_pages(&self) -> usize {
        self.documents
            .iter()
            .flat_map(|d| d.pages.iter())
            .filter(|p| p.is_settled())
            .count()
    }

    pub fn all_settled(&self) -> bool {
        self.settled_pages() == self.total_pages()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bitmap, PageImage, ProcessingResult, Resolution};
    use std::sync::Arc;

    fn page(n: u32) -> Page {
        Page::new(n, PageImage::Decoded(Arc::new(Bitmap::new(2, 2))))
    }

    #[test]
    fn test_queue_order() {
        let batch = Batch::new(vec![
            Document::new("a.pdf", DocumentKind::Paged, vec![page(1), page(2)]),
            Document::new("b.png", DocumentKind::Image, vec![page(1)]),
        ]);
        assert_eq!(
            batch.queue(),
            vec![
                QueueSlot { document: 0, page: 0 },
                QueueSlot { document: 0, page: 1 },
                QueueSlot { document: 1, page: 0 },
            ]
        );
        assert_eq!(batch.total_pages(), 3);
    }

    #[test]
    fn test_pending_skips_settled_pages() {
        let mut batch = Batch::new(vec![
            Document::new("a.pdf", DocumentKind::Paged, vec![page(1), page(2)]),
            Document::new("b.png", DocumentKind::Image, vec![page(1)]),
        ]);
        batch.documents[0].pages[0].settle(ProcessingResult {
            text: "done".into(),
            confidence: Some(90.0),
            resolution: Resolution::Fallback,
        });

        let pending = batch.pending();
        assert_eq!(
            pending,
            vec![
                QueueSlot { document: 0, page: 1 },
                QueueSlot { document: 1, page: 0 },
            ]
        );

        let checked_out = batch.checkout(&pending);
        let seen: Vec<(usize, &str, u32)> = checked_out
            .iter()
            .map(|q| (q.index, q.document_name, q.page.number))
            .collect();
        assert_eq!(seen, vec![(1, "a.pdf", 2), (2, "b.png", 1)]);
    }

    #[test]
    fn test_checkout_ignores_unknown_slots() {
        let mut batch = Batch::new(vec![Document::new(
            "a.png",
            DocumentKind::Image,
            vec![page(1)],
        )]);
        let slots = [QueueSlot { document: 3, page: 0 }];
        assert!(batch.checkout(&slots).is_empty());
        assert!(batch.page(slots[0]).is_none());
    }

    #[test]
    fn test_all_settled_and_clear() {
        let mut batch = Batch::new(vec![Document::new(
            "a.png",
            DocumentKind::Image,
            vec![page(1)],
        )]);
        assert!(!batch.all_settled());
        batch.documents[0].pages[0].settle(ProcessingResult {
            text: "x".into(),
            confidence: Some(90.0),
            resolution: Resolution::Fallback,
        });
        assert!(batch.all_settled());

        batch.clear();
        assert_eq!(batch.total_pages(), 0);
    }
}

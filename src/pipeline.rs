//! Pipeline orchestrator.
//!
//! Runs the two passes over a raw document:
//!
//! 1. Whole document: strip repeating headers/footers and collect font
//!    statistics.
//! 2. Page by page: reading order, classification, tables, equations and
//!    text reconstruction against the pass-1 statistics.
//!
//! A page that cannot be structured becomes a placeholder node; only a
//! missing or empty document fails the conversion. Cancellation is checked
//! between pages, so a page in flight always completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::error::{Error, Result};
use crate::model::{Block, BlockKind, DocumentNode, Page, RawDocument, StructuredDocument};
use crate::options::ConvertOptions;
use crate::structure::{
    reading_order, Classifier, EquationEngine, FontStatistics, HeaderFooterDetector, PageItem,
    TableEngine, TextReconstructor,
};

/// Cooperative cancellation flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next page boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Progress notification sent while pass 2 runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A page finished pass 2
    PageDone {
        /// 1-based position of the page in the processed range
        page: usize,
        /// Number of pages being processed
        total: usize,
    },
    /// Every page was processed
    Finished,
    /// Processing stopped at a page boundary
    Cancelled,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// Structured nodes produced so far
    pub document: StructuredDocument,
    /// Whether the run stopped early
    pub cancelled: bool,
    /// Number of pages that went through pass 2
    pub pages_processed: usize,
}

/// Two-pass structuring pipeline.
pub struct Pipeline {
    options: ConvertOptions,
    cancel: Option<CancellationToken>,
    progress: Option<Sender<ProgressEvent>>,
}

impl Pipeline {
    /// Create a pipeline with the given options.
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            cancel: None,
            progress: None,
        }
    }

    /// Check this token between pages.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Send progress events to this channel.
    pub fn with_progress(mut self, sender: Sender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Options this pipeline runs with.
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Run both passes over an optional document.
    ///
    /// `None` is the absent-document case and fails with
    /// [`Error::MissingDocument`].
    pub fn run_optional(&self, doc: Option<&RawDocument>) -> Result<Conversion> {
        self.run(doc.ok_or(Error::MissingDocument)?)
    }

    /// Run both passes over a document.
    pub fn run(&self, doc: &RawDocument) -> Result<Conversion> {
        self.options.validate()?;
        if doc.is_empty() {
            return Err(Error::EmptyDocument);
        }

        let limit = self.options.page_limit().unwrap_or(doc.pages.len());
        let selected = &doc.pages[..limit.min(doc.pages.len())];
        log::debug!("Pipeline: {} of {} pages selected", selected.len(), doc.pages.len());

        // Defects are judged before stripping so a page holding only
        // furniture is not reported as broken.
        let defects: Vec<Option<String>> = selected.iter().map(|p| p.defect()).collect();

        // Pass 1
        let pages = if self.options.remove_headers_footers {
            HeaderFooterDetector::new(self.options.min_repeat_fraction).detect_and_strip(selected)
        } else {
            selected.to_vec()
        };
        let usable: Vec<Page> = pages
            .iter()
            .zip(&defects)
            .filter(|(_, defect)| defect.is_none())
            .map(|(p, _)| p.clone())
            .collect();
        let stats = FontStatistics::collect(&usable, &self.options);

        // Pass 2
        let classifier = Classifier::new(stats, &self.options);
        let tables = TableEngine::new(self.options.table.clone());
        let equations = EquationEngine::new(self.options.equation.clone());
        let mut reconstructor = TextReconstructor::new(&self.options);

        let mut document = StructuredDocument::new(doc.metadata.clone());
        let total = pages.len();
        let mut processed = 0;
        let mut cancelled = false;

        for (page, defect) in pages.iter().zip(defects) {
            if self.is_cancelled() {
                log::info!("Pipeline: cancelled after {} of {} pages", processed, total);
                cancelled = true;
                break;
            }
            if processed > 0 {
                document.push(DocumentNode::PageBreak);
            }

            match defect {
                Some(reason) => {
                    log::warn!("Page {} skipped: {}", page.number, reason);
                    document.push(DocumentNode::Placeholder {
                        page_number: page.number,
                        reason,
                    });
                }
                None => {
                    let nodes =
                        self.structure_page(page, &classifier, &tables, &equations, &mut reconstructor);
                    document.nodes.extend(nodes);
                }
            }

            processed += 1;
            self.notify(ProgressEvent::PageDone {
                page: processed,
                total,
            });
        }

        document.nodes.extend(reconstructor.finish());
        document.page_count = processed as u32;

        self.notify(if cancelled {
            ProgressEvent::Cancelled
        } else {
            ProgressEvent::Finished
        });
        log::info!(
            "Pipeline: {} pages, {} nodes{}",
            processed,
            document.len(),
            if cancelled { " (cancelled)" } else { "" }
        );

        Ok(Conversion {
            document,
            cancelled,
            pages_processed: processed,
        })
    }

    fn structure_page(
        &self,
        page: &Page,
        classifier: &Classifier,
        tables: &TableEngine,
        equations: &EquationEngine,
        reconstructor: &mut TextReconstructor,
    ) -> Vec<DocumentNode> {
        let ordered = reading_order(&page.blocks);
        let page_left = left_margin(&ordered);
        let classified = classifier.classify_page(ordered);

        let items: Vec<PageItem> = classified
            .into_iter()
            .filter_map(|block| self.page_item(block, page.number))
            .collect();

        let items = tables.apply(items);
        let items = equations.detect_and_convert(items, page.width);
        let nodes = reconstructor.reconstruct(items, page_left);
        log::debug!("Pipeline: page {} -> {} nodes", page.number, nodes.len());
        nodes
    }

    /// Images become references (or vanish), headers/footers are dropped.
    fn page_item(&self, block: Block, page_number: u32) -> Option<PageItem> {
        match block.kind {
            BlockKind::HeaderFooter => None,
            BlockKind::Image => {
                if !self.options.export_images {
                    return None;
                }
                let path = block.image?;
                Some(PageItem::Node(DocumentNode::ImageRef {
                    path: asset_path(&self.options.image_dir, &path),
                    page_number,
                }))
            }
            _ => Some(PageItem::Block(block)),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    fn notify(&self, event: ProgressEvent) {
        if let Some(ref sender) = self.progress {
            // A dropped receiver only means nobody is watching.
            let _ = sender.send(event);
        }
    }
}

/// Leftmost edge of the page's text blocks.
fn left_margin(blocks: &[Block]) -> f32 {
    let left = blocks
        .iter()
        .filter(|b| !b.is_image() && !b.is_empty())
        .map(|b| b.bbox.x0)
        .fold(f32::INFINITY, f32::min);
    if left.is_finite() {
        left.max(0.0)
    } else {
        0.0
    }
}

/// Prefix a relative asset path with the image directory.
pub fn asset_path(image_dir: &str, path: &str) -> String {
    let dir = image_dir.trim_end_matches('/');
    let is_absolute = path.starts_with('/') || path.contains("://");
    if dir.is_empty() || is_absolute || path.starts_with(&format!("{}/", dir)) {
        path.to_string()
    } else {
        format!("{}/{}", dir, path.trim_start_matches("./"))
    }
}

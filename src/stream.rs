//! Streaming page-scan API: yield page decisions as they are made.
//!
//! [`crate::ingest::scan_pages`] returns only after every page is
//! classified. [`scan_pages_stream`] yields each [`PageDecision`] as soon as
//! its page is done, so a caller can start vision calls for early pages
//! while later ones are still being read. Items arrive in page order.
//!
//! Non-fatal page failures are yielded as `Err(UnitError)` items; the stream
//! continues. Fatal problems (bad TOC, unreadable PDF) are returned before
//! the stream is handed out.

use crate::classify;
use crate::config::IngestConfig;
use crate::error::{IngestError, UnitError};
use crate::model::PageSectionMap;
use crate::output::PageDecision;
use crate::pipeline::input;
use crate::pipeline::render::{self, PdfiumDocument};
use crate::pipeline::source::DocumentSource;
use crate::toc::TocIndex;
use std::path::Path;
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, info};

/// A boxed stream of page decisions.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageDecision, UnitError>> + Send>>;

type Sender = mpsc::Sender<Result<PageDecision, UnitError>>;

/// Classify pages of a PDF, streaming decisions as they are ready.
///
/// # Returns
/// - `Ok(PageStream)`: a stream of `Result<PageDecision, UnitError>`
/// - `Err(IngestError)`: TOC, input or PDF-open failure
pub async fn scan_pages_stream(
    input: impl AsRef<Path>,
    toc_path: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<PageStream, IngestError> {
    let toc = TocIndex::load(toc_path.as_ref())?;
    let resolved = input::resolve_input(input.as_ref())?;
    info!("Streaming page scan: {}", resolved.path().display());

    let page_map = classify::page_section_map(&toc, config.heuristics.page_map_tail);
    let config = config.clone();
    let (tx, rx) = mpsc::channel(config.concurrency.max(1));
    let (opened_tx, opened_rx) = oneshot::channel();

    tokio::task::spawn_blocking(move || {
        let pdfium = match render::bind_pdfium() {
            Ok(p) => p,
            Err(e) => {
                let _ = opened_tx.send(Err(e));
                return;
            }
        };
        let doc = match PdfiumDocument::open(
            &pdfium,
            resolved.path(),
            config.password.as_deref(),
            config.heuristics.block_gap_ratio,
        ) {
            Ok(d) => d,
            Err(e) => {
                let _ = opened_tx.send(Err(e));
                return;
            }
        };
        let _ = opened_tx.send(Ok(()));
        send_decisions(&doc, &page_map, &config, &tx);
        drop(doc);
        drop(resolved);
    });

    opened_rx
        .await
        .map_err(|_| IngestError::Internal("page scan task ended before opening the PDF".into()))??;
    Ok(Box::pin(ReceiverStream::new(rx)))
}

/// Stream decisions for an owned [`DocumentSource`].
pub fn scan_source_stream<S>(source: S, toc: &TocIndex, config: &IngestConfig) -> PageStream
where
    S: DocumentSource + Send + 'static,
{
    let page_map = classify::page_section_map(toc, config.heuristics.page_map_tail);
    let config = config.clone();
    let (tx, rx) = mpsc::channel(config.concurrency.max(1));
    tokio::task::spawn_blocking(move || send_decisions(&source, &page_map, &config, &tx));
    Box::pin(ReceiverStream::new(rx))
}

/// Classify the selected pages in order, sending each result.
///
/// Stops early when the receiver is dropped.
fn send_decisions<S: DocumentSource + ?Sized>(
    source: &S,
    page_map: &PageSectionMap,
    config: &IngestConfig,
    tx: &Sender,
) {
    let selected = config.pages.to_pages(source.page_count());
    let total = selected.len() as u32;
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_ingest_start(total);
    }

    let mut sent = 0;
    for page in selected {
        if let Some(cb) = cb {
            cb.on_page_start(page, total);
        }
        let mut errors = Vec::new();
        let decision = classify::classify_page(source, page, page_map, config, &mut errors);
        for e in errors {
            if let Some(cb) = cb {
                cb.on_page_error(page, total, &e.to_string());
            }
            if tx.blocking_send(Err(e)).is_err() {
                debug!("Page stream receiver dropped at page {}", page);
                return;
            }
        }
        if let Some(cb) = cb {
            cb.on_page_complete(page, total, usize::from(decision.is_some()));
        }
        if let Some(decision) = decision {
            if tx.blocking_send(Ok(decision)).is_err() {
                debug!("Page stream receiver dropped at page {}", page);
                return;
            }
            sent += 1;
        }
    }
    if let Some(cb) = cb {
        cb.on_ingest_complete(total, sent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSelection;
    use crate::pipeline::source::{MemoryDocument, MemoryPage};
    use crate::toc::TocNode;
    use futures::StreamExt;

    fn toc() -> TocIndex {
        TocIndex::from_nodes(&[TocNode {
            title: "2 Wiring".into(),
            page: 2,
            level: 1,
            children: Vec::new(),
        }])
        .unwrap()
    }

    fn doc() -> MemoryDocument {
        MemoryDocument::new(vec![
            MemoryPage::new(600.0, 800.0).raw_text("Cover"),
            MemoryPage::new(600.0, 800.0).raw_text("See Figure 3 for wiring."),
            MemoryPage::new(600.0, 800.0)
                .raw_text("Table 9")
                .failing_render(),
        ])
    }

    #[tokio::test]
    async fn decisions_arrive_in_page_order() {
        let items: Vec<_> = scan_source_stream(doc(), &toc(), &IngestConfig::default())
            .collect()
            .await;
        // page 3's capture failure comes first, then its decision
        assert_eq!(items.len(), 4);
        let pages: Vec<u32> = items
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|d| d.page)
            .collect();
        assert_eq!(pages, vec![1, 2, 3]);
        assert!(matches!(items[2], Err(UnitError::Extraction { page: 3, .. })));
        let first = items[0].as_ref().unwrap();
        assert_eq!(first.section_id.as_deref(), Some("_preamble"));
        assert!(items[1].as_ref().unwrap().vision_required);
    }

    #[tokio::test]
    async fn page_selection_is_honoured() {
        let config = IngestConfig::builder()
            .pages(PageSelection::Single(2))
            .build()
            .unwrap();
        let items: Vec<_> = scan_source_stream(doc(), &toc(), &config).collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().section_id.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn missing_toc_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = scan_pages_stream(
            dir.path().join("doc.pdf"),
            dir.path().join("toc.json"),
            &IngestConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(IngestError::TocLoad(_))));
    }
}

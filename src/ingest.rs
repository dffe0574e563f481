//! Ingest entry points.
//!
//! Two paths over the same document:
//!
//! - **Fine-grained** ([`ingest`], [`ingest_source`]): every page is
//!   extracted and noise-filtered, the pages are merged into one
//!   reading-order stream, orphan figure captions get a recovered snapshot,
//!   and the stream is segmented by the TOC into a [`SectionMap`].
//! - **Coarse** ([`scan_pages`], [`scan_source`]): one decision per page,
//!   either cleaned text or a vision request, plus the forward-filled
//!   page → section map.
//!
//! The TOC is loaded before the document is opened: a TOC error is fatal
//! and nothing else is returned with it.
//!
//! The pass over the document is serial. With pdfium it runs inside a single
//! `spawn_blocking` task that binds the library, opens the document and
//! drops both before returning, whatever the outcome.
//!
//! [`SectionMap`]: crate::model::SectionMap

use crate::classify;
use crate::config::IngestConfig;
use crate::error::{IngestError, UnitError};
use crate::model::{DocumentStream, UnitKind};
use crate::output::{DocumentMetadata, IngestOutput, IngestStats, PageScanOutput};
use crate::pipeline::assemble::{self, RecoveryOutcome};
use crate::pipeline::extract;
use crate::pipeline::input;
use crate::pipeline::render::{self, PdfiumDocument};
use crate::pipeline::source::DocumentSource;
use crate::segment;
use crate::toc::TocIndex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Ingest a PDF into a reading-order stream and a section map.
///
/// # Errors
/// Only fatal problems are returned: unreadable TOC, missing or invalid PDF,
/// wrong password, pdfium unavailable. Per-page and per-image failures are
/// collected in `output.stats.errors`.
///
/// ```rust,no_run
/// use docstream::{ingest, IngestConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let output = ingest("manual.pdf", "toc.json", &IngestConfig::default()).await?;
/// for section in output.sections.iter() {
///     println!("{}: {} units", section.id, section.units.len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn ingest(
    input: impl AsRef<Path>,
    toc_path: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<IngestOutput, IngestError> {
    let total_start = Instant::now();
    let toc = TocIndex::load(toc_path.as_ref())?;
    let resolved = input::resolve_input(input.as_ref())?;
    info!("Ingesting {}", resolved.path().display());

    let path = resolved.path().to_path_buf();
    let task_config = config.clone();
    let (built, metadata) = tokio::task::spawn_blocking(move || {
        with_pdfium_document(&path, &task_config, |doc| {
            (build_stream(doc, &task_config), doc.metadata())
        })
    })
    .await
    .map_err(|e| IngestError::Internal(format!("extraction task failed: {e}")))??;
    drop(resolved);

    Ok(finish(built, &toc, config, Some(metadata), total_start))
}

/// [`ingest`] over any [`DocumentSource`], on the calling thread.
pub fn ingest_source<S: DocumentSource + ?Sized>(
    source: &S,
    toc: &TocIndex,
    config: &IngestConfig,
) -> IngestOutput {
    let total_start = Instant::now();
    let built = build_stream(source, config);
    finish(built, toc, config, None, total_start)
}

/// Blocking wrapper around [`ingest`] for non-async callers.
///
/// Creates a single-use tokio runtime; do not call from inside one.
pub fn ingest_sync(
    input: impl AsRef<Path>,
    toc_path: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<IngestOutput, IngestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IngestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(ingest(input, toc_path, config))
}

/// [`ingest`] PDF bytes held in memory.
///
/// The bytes are written to a managed temp file, removed on return.
pub async fn ingest_from_bytes(
    bytes: &[u8],
    toc_path: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<IngestOutput, IngestError> {
    let toc_path = toc_path.as_ref();
    // Fail on the TOC before touching the bytes.
    TocIndex::load(toc_path)?;
    let resolved = input::spill_bytes(bytes)?;
    ingest(resolved.path(), toc_path, config).await
}

/// Classify the selected pages for the coarse path.
pub async fn scan_pages(
    input: impl AsRef<Path>,
    toc_path: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<PageScanOutput, IngestError> {
    let toc = TocIndex::load(toc_path.as_ref())?;
    let resolved = input::resolve_input(input.as_ref())?;
    info!("Scanning pages of {}", resolved.path().display());

    let path = resolved.path().to_path_buf();
    let task_config = config.clone();
    let output = tokio::task::spawn_blocking(move || {
        with_pdfium_document(&path, &task_config, |doc| {
            let mut out = scan_source(doc, &toc, &task_config);
            out.metadata = Some(doc.metadata());
            out
        })
    })
    .await
    .map_err(|e| IngestError::Internal(format!("scan task failed: {e}")))??;
    drop(resolved);
    Ok(output)
}

/// [`scan_pages`] over any [`DocumentSource`], on the calling thread.
pub fn scan_source<S: DocumentSource + ?Sized>(
    source: &S,
    toc: &TocIndex,
    config: &IngestConfig,
) -> PageScanOutput {
    let page_map = classify::page_section_map(toc, config.heuristics.page_map_tail);
    let selected = config.pages.to_pages(source.page_count());
    let total = selected.len() as u32;
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_ingest_start(total);
    }

    let mut pages = Vec::with_capacity(selected.len());
    let mut errors = Vec::new();
    for page in selected {
        if let Some(cb) = cb {
            cb.on_page_start(page, total);
        }
        let before = errors.len();
        let decision = classify::classify_page(source, page, &page_map, config, &mut errors);
        if let Some(cb) = cb {
            for e in &errors[before..] {
                cb.on_page_error(page, total, &e.to_string());
            }
            cb.on_page_complete(page, total, usize::from(decision.is_some()));
        }
        pages.extend(decision);
    }

    let vision = pages.iter().filter(|p| p.vision_required).count();
    info!(
        "Classified {} pages: {} need vision, {} text-only",
        pages.len(),
        vision,
        pages.len() - vision
    );
    if let Some(cb) = cb {
        cb.on_ingest_complete(total, pages.len());
    }

    PageScanOutput {
        page_map,
        pages,
        errors,
        metadata: None,
    }
}

/// Read PDF metadata without extracting content.
pub async fn inspect(input: impl AsRef<Path>) -> Result<DocumentMetadata, IngestError> {
    let resolved = input::resolve_input(input.as_ref())?;
    let path = resolved.path().to_path_buf();
    let metadata = tokio::task::spawn_blocking(move || {
        with_pdfium_document(&path, &IngestConfig::default(), |doc| doc.metadata())
    })
    .await
    .map_err(|e| IngestError::Internal(format!("inspect task failed: {e}")))??;
    drop(resolved);
    Ok(metadata)
}

/// Serialise `value` as pretty JSON to `path`, atomically.
///
/// Writes a sibling `.tmp` file and renames it over `path`, so readers never
/// see a partial artifact. Parent directories are created as needed.
pub async fn write_json<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    value: &T,
) -> Result<(), IngestError> {
    let path = path.as_ref();
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| IngestError::Internal(format!("JSON serialisation failed: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| IngestError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = tmp_sibling(path);
    tokio::fs::write(&tmp_path, &json)
        .await
        .map_err(|e| IngestError::OutputWriteFailed {
            path: tmp_path.clone(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| IngestError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    debug!("Wrote {} bytes to {}", json.len(), path.display());
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Extraction and assembly results before segmentation.
struct BuiltStream {
    stream: DocumentStream,
    total_pages: u32,
    recovery: RecoveryOutcome,
    dropped_text: usize,
    dropped_images: usize,
    errors: Vec<UnitError>,
    extract_duration_ms: u64,
}

/// Bind pdfium, open `path`, run `f`, and drop both before returning.
fn with_pdfium_document<R>(
    path: &Path,
    config: &IngestConfig,
    f: impl FnOnce(&PdfiumDocument<'_>) -> R,
) -> Result<R, IngestError> {
    let pdfium = render::bind_pdfium()?;
    let doc = PdfiumDocument::open(
        &pdfium,
        path,
        config.password.as_deref(),
        config.heuristics.block_gap_ratio,
    )?;
    Ok(f(&doc))
}

/// Extract every page in order, then assemble and recover.
fn build_stream<S: DocumentSource + ?Sized>(source: &S, config: &IngestConfig) -> BuiltStream {
    let start = Instant::now();
    let h = &config.heuristics;
    let total = source.page_count();
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_ingest_start(total);
    }

    let mut units = Vec::new();
    let mut errors = Vec::new();
    let (mut dropped_text, mut dropped_images) = (0, 0);

    for page in 1..=total {
        if let Some(cb) = cb {
            cb.on_page_start(page, total);
        }
        let extraction = extract::extract_page(source, page, h);
        if let Some(cb) = cb {
            for e in &extraction.errors {
                cb.on_page_error(page, total, &e.to_string());
            }
            cb.on_page_complete(page, total, extraction.units.len());
        }
        dropped_text += extraction.dropped_text;
        dropped_images += extraction.dropped_images;
        errors.extend(extraction.errors);
        units.extend(extraction.units);
    }
    debug!(
        "Extracted {} units from {} pages ({} text / {} images dropped)",
        units.len(),
        total,
        dropped_text,
        dropped_images
    );

    let (stream, recovery) = assemble::assemble(units, source, h);
    if recovery.inserted > 0 {
        info!("Recovered {} vector figures", recovery.inserted);
    }
    if let Some(cb) = cb {
        cb.on_ingest_complete(total, stream.len());
    }

    BuiltStream {
        stream,
        total_pages: total,
        recovery,
        dropped_text,
        dropped_images,
        errors,
        extract_duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Segment the stream and compute stats.
fn finish(
    built: BuiltStream,
    toc: &TocIndex,
    config: &IngestConfig,
    metadata: Option<DocumentMetadata>,
    total_start: Instant,
) -> IngestOutput {
    let segment_start = Instant::now();
    let sections = segment::segment(&built.stream, toc, &config.heuristics);
    let segment_duration_ms = segment_start.elapsed().as_millis() as u64;

    let mut text_units = 0;
    let mut image_units = 0;
    let mut headers = 0;
    for su in sections.iter().flat_map(|s| s.units.iter()) {
        match su.kind() {
            UnitKind::Header => {
                headers += 1;
                text_units += 1;
            }
            UnitKind::Text => text_units += 1,
            UnitKind::Image => image_units += 1,
        }
    }

    let mut errors = built.errors;
    errors.extend(built.recovery.errors);

    let stats = IngestStats {
        total_pages: built.total_pages,
        text_units,
        image_units,
        recovered_images: built.recovery.inserted,
        dropped_text: built.dropped_text,
        dropped_images: built.dropped_images,
        headers,
        sections: sections.len(),
        errors,
        extract_duration_ms: built.extract_duration_ms,
        segment_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Ingest complete: {} pages, {} units, {} sections, {} errors, {}ms",
        stats.total_pages,
        built.stream.len(),
        stats.sections,
        stats.errors.len(),
        stats.total_duration_ms
    );

    IngestOutput {
        stream: built.stream,
        sections,
        stats,
        metadata,
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

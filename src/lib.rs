//! # docstream
//!
//! Rebuild the reading order of a technical PDF and split it into sections
//! using an external table of contents.
//!
//! ## Why this crate?
//!
//! Text extracted from a manual comes out in whatever order the PDF producer
//! wrote it: running headers and footers mixed into the body, figures
//! drawn as vector paths missing entirely, and section titles that only
//! loosely match the TOC. This crate recovers one reading-order sequence of
//! text and image units per document, drops the boilerplate, re-renders
//! orphaned figures, and partitions the result by TOC section id. The
//! output feeds downstream collaborators (image describers, text
//! atomisers, vector stores) that this crate never calls.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF + TOC
//!  │
//!  ├─ 1. TOC      flatten and validate the TOC (fatal on failure)
//!  ├─ 2. Extract  per page: text blocks + images, noise-filtered (spawn_blocking)
//!  ├─ 3. Assemble sort by (page, y0), recover vector figures
//!  ├─ 4. Segment  detect headers against the TOC, build the section map
//!  └─ 5. Output   stream + section map + stats
//! ```
//!
//! A coarse alternative, [`scan_pages`], decides per page whether the text
//! layer suffices or a vision call is needed, and forward-fills the page →
//! section mapping.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docstream::{ingest, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IngestConfig::default();
//!     let output = ingest("manual.pdf", "toc.json", &config).await?;
//!     for section in output.sections.iter() {
//!         eprintln!("{}: {} units", section.id, section.units.len());
//!     }
//!     docstream::write_json("out/sections.json", &output.sections).await?;
//!     Ok(())
//! }
//! ```
//!
//! Geometry extracted by other tooling can be fed in through
//! [`MemoryDocument`]:
//!
//! ```rust
//! use docstream::{ingest_source, BBox, IngestConfig, MemoryDocument, MemoryPage, TocIndex};
//!
//! let toc = TocIndex::from_json_str(r#"[{"title": "2.1 Setup", "page": 1, "level": 2}]"#).unwrap();
//! let doc = MemoryDocument::new(vec![MemoryPage::new(595.0, 842.0)
//!     .text(BBox::new(60.0, 100.0, 500.0, 112.0), "2.1 Setup")
//!     .text(BBox::new(60.0, 130.0, 500.0, 160.0), "Connect the board.")]);
//! let output = ingest_source(&doc, &toc, &IngestConfig::default());
//! assert_eq!(output.sections.ids().collect::<Vec<_>>(), vec!["2.1"]);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docstream` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docstream = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod classify;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod markdown;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod segment;
pub mod stream;
pub mod toc;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use classify::{page_section_map, section_buffers, vision_required, SectionBuffer};
pub use config::{Heuristics, IngestConfig, IngestConfigBuilder, PageSelection};
pub use dispatch::{dispatch, DispatchOptions, DispatchReport, StopHandle};
pub use error::{IngestError, SourceError, TocLoadError, UnitError};
pub use ingest::{
    ingest, ingest_from_bytes, ingest_source, ingest_sync, inspect, scan_pages, scan_source,
    write_json,
};
pub use markdown::{image_requests, render_section, ImageDescriptionRequest};
pub use model::{
    BBox, ContentUnit, DocumentStream, ImageFormat, ImageOrigin, ImageUnit, PageSectionMap,
    Position, Section, SectionMap, SegmentedUnit, UnitBody, UnitKind, PREAMBLE_SECTION,
};
pub use output::{
    DocumentMetadata, IngestOutput, IngestStats, PageContent, PageDecision, PageScanOutput,
    VisionRequest,
};
pub use pipeline::source::{DocumentSource, MemoryDocument, MemoryPage};
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use segment::segment;
pub use stream::{scan_pages_stream, scan_source_stream, PageStream};
pub use toc::{TocAnchor, TocIndex, TocNode};

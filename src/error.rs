//! Error types for the docstream library.
//!
//! Two tiers reflect two distinct failure modes:
//!
//! * [`IngestError`] — **Fatal**: the run cannot proceed at all (bad input
//!   file, wrong password, malformed TOC). Returned as `Err(IngestError)`
//!   from the top-level `ingest*` / `scan_pages*` functions. No partial
//!   section map is ever returned alongside one of these.
//!
//! * [`UnitError`] — **Non-fatal**: a single image, page or snapshot failed
//!   but the whole-document pass continues. Collected in the run stats so
//!   callers can audit what was skipped.
//!
//! A numeral-prefixed line whose id is not in the TOC is *not* an error of
//! either kind; the segmenter keeps it as body text.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docstream library.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    // ── TOC errors ────────────────────────────────────────────────────────
    /// The table of contents could not be loaded; segmentation needs anchors.
    #[error(transparent)]
    TocLoad(#[from] TocLoadError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the executable's working directory.\n\
  • Install pdfium system-wide so the dynamic loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure to load or validate the TOC artifact.
#[derive(Debug, Error)]
pub enum TocLoadError {
    /// The TOC file could not be read.
    #[error("Failed to read TOC '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOC is not well-formed JSON or does not have the expected shape.
    #[error("Malformed TOC: {0}")]
    Parse(#[from] serde_json::Error),

    /// The TOC parsed but violates a structural rule.
    #[error("Invalid TOC: {reason}")]
    Invalid { reason: String },
}

/// A non-fatal error for a single unit, page or downstream task.
///
/// The pass that produced it logged it and moved on.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// An embedded image or a page's geometry failed to decode.
    #[error("Page {page}: extraction failed: {detail}")]
    Extraction { page: u32, detail: String },

    /// Clip rendering for an orphan figure caption failed.
    #[error("Page {page}: figure snapshot failed: {detail}")]
    RecoverySnapshot { page: u32, detail: String },

    /// A downstream worker task failed or panicked.
    #[error("Task '{key}' failed: {detail}")]
    Task { key: String, detail: String },
}

/// Error raised by a [`crate::pipeline::source::DocumentSource`] implementation.
#[derive(Debug, Clone, Error)]
#[error("{detail}")]
pub struct SourceError {
    pub detail: String,
}

impl SourceError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

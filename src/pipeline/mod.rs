//! Pipeline stages for building the reading-order stream.
//!
//! Each submodule implements one transformation step, so each is testable on
//! its own and the document backend can be swapped without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ source ──▶ extract ──▶ assemble ──▶ (segment)
//! (path)   (pdfium /   (+ noise)   (sort +
//!           memory)                 recovery)
//! ```
//!
//! 1. [`input`]    — validate the PDF path or spill in-memory bytes to a temp file
//! 2. [`source`]   — the [`source::DocumentSource`] boundary; [`render`] is
//!    its pdfium implementation and runs inside `spawn_blocking`
//! 3. [`extract`]  — one page to position-tagged units, filtered by [`noise`]
//! 4. [`assemble`] — merge pages into reading order and recover vector figures
//! 5. [`cleanup`]  — text rules for the page-granular path
//! 6. [`encode`]   — PNG encoding and `data:` URLs for image payloads

pub mod assemble;
pub mod cleanup;
pub mod encode;
pub mod extract;
pub mod input;
pub mod noise;
pub mod render;
pub mod source;

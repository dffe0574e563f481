//! Progress-callback trait for per-page ingestion events.
//!
//! Inject an [`Arc<dyn IngestProgressCallback>`] via
//! [`crate::config::IngestConfigBuilder::progress_callback`] to receive
//! events as the extractor walks the document.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a channel, a terminal progress bar or a
//! log without the library knowing how the host application communicates.
//! Extraction runs on a blocking worker thread, so the trait is
//! `Send + Sync`.
//!
//! # Example
//!
//! ```rust
//! use docstream::{IngestProgressCallback, IngestConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     units: Arc<AtomicUsize>,
//! }
//!
//! impl IngestProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, _page: u32, _total_pages: u32, units: usize) {
//!         self.units.fetch_add(units, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     units: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = IngestConfig::builder()
//!     .progress_callback(counter as Arc<dyn IngestProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the ingestion pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are reported in ascending order.
pub trait IngestProgressCallback: Send + Sync {
    /// Called once after the document is opened, before any page is read.
    fn on_ingest_start(&self, total_pages: u32) {
        let _ = total_pages;
    }

    /// Called before a page's geometry is extracted.
    fn on_page_start(&self, page: u32, total_pages: u32) {
        let _ = (page, total_pages);
    }

    /// Called when a page has been extracted and filtered.
    ///
    /// * `units` — content units kept on this page (after noise filtering)
    fn on_page_complete(&self, page: u32, total_pages: u32, units: usize) {
        let _ = (page, total_pages, units);
    }

    /// Called when a page (or part of it) failed; the run continues.
    fn on_page_error(&self, page: u32, total_pages: u32, error: &str) {
        let _ = (page, total_pages, error);
    }

    /// Called once after every page has been visited.
    ///
    /// * `total_units` — units in the assembled stream, recoveries included
    fn on_ingest_complete(&self, total_pages: u32, total_units: usize) {
        let _ = (total_pages, total_units);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IngestConfig`].
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        units: AtomicUsize,
    }

    impl IngestProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page: u32, _total_pages: u32) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page: u32, _total_pages: u32, units: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.units.fetch_add(units, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page: u32, _total_pages: u32, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_ingest_start(5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 42);
        cb.on_page_error(2, 5, "some error");
        cb.on_ingest_complete(5, 40);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_page_start(1, 2);
        tracker.on_page_complete(1, 2, 7);
        tracker.on_page_start(2, 2);
        tracker.on_page_error(2, 2, "image decode failed");
        tracker.on_page_complete(2, 2, 3);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.units.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_ingest_start(10);
        cb.on_page_complete(1, 10, 3);
    }
}

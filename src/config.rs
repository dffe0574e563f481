//! Configuration types for document ingestion.
//!
//! All ingestion behaviour is controlled through [`IngestConfig`], built via
//! its [`IngestConfigBuilder`]. The layout heuristics (band widths, noise
//! substrings, recovery distances) are grouped in [`Heuristics`], a serde
//! struct so a document family can ship its own tuning as a JSON file.
//!
//! # Design choice: builder over constructor
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest. `build()` is the single place where
//! cross-field constraints are checked.

use crate::error::IngestError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Tunable layout heuristics.
///
/// Every field has a default; a JSON file only needs the keys it overrides.
///
/// ```rust
/// use docstream::Heuristics;
///
/// let h: Heuristics = serde_json::from_str(r#"{ "text_band": 60.0 }"#).unwrap();
/// assert_eq!(h.text_band, 60.0);
/// assert_eq!(h.image_band, 80.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heuristics {
    /// Literal substrings marking header/footer boilerplate text.
    pub noise_patterns: Vec<String>,

    /// Height of the header and footer bands for text blocks. Default: 50.
    pub text_band: f32,

    /// Text blocks shorter than this (in characters) are dropped anywhere on
    /// the page when they match a noise pattern. Default: 100.
    pub short_block_chars: usize,

    /// Height of the header and footer bands for images. Default: 80.
    pub image_band: f32,

    /// An image whose clip yields more than this many characters of text is
    /// treated as a decorative text layer. Default: 50.
    pub image_text_limit: usize,

    /// Lines further apart than this multiple of the line height start a new
    /// text block. Used by the pdfium source only. Default: 0.6.
    pub block_gap_ratio: f32,

    /// Captions further than this below the preceding image get a recovered
    /// figure. Default: 400.
    pub recovery_max_gap: f32,

    /// How far above the caption the recovery clip starts. Default: 350.
    pub recovery_lookback: f32,

    /// The recovery clip never starts above this y. Default: 50.
    pub recovery_top_floor: f32,

    /// Minimum height of a recovery clip. Default: 50.
    pub recovery_min_height: f32,

    /// Gap left between the clip bottom and the caption. Default: 10.
    pub recovery_caption_margin: f32,

    /// Horizontal margin trimmed from each side of the page. Default: 50.
    pub recovery_side_margin: f32,

    /// Render scale of recovery snapshots. Default: 2.0.
    pub snapshot_scale: f32,

    /// Longest trimmed text that can still be a section header. Default: 150.
    pub max_header_chars: usize,

    /// Characters of raw page text sent as the vision calibration hint. Default: 2000.
    pub vision_hint_chars: usize,

    /// Pages covered by the page map beyond the last TOC page. Default: 50.
    pub page_map_tail: u32,

    /// Lines containing any of these are removed from text-path pages.
    pub page_boilerplate: Vec<String>,

    /// Tokens removed from assembled section buffers. Default: `["[TBD]"]`.
    pub cleanup_tokens: Vec<String>,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            noise_patterns: [
                "Modifications reserved",
                "Data subject to change",
                "Printed in Germany",
                "Document number:",
                "Revision_",
                "| 61",
                "Bosch Sensortec |",
                "[TBD]",
                ". . . . . .",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            text_band: 50.0,
            short_block_chars: 100,
            image_band: 80.0,
            image_text_limit: 50,
            block_gap_ratio: 0.6,
            recovery_max_gap: 400.0,
            recovery_lookback: 350.0,
            recovery_top_floor: 50.0,
            recovery_min_height: 50.0,
            recovery_caption_margin: 10.0,
            recovery_side_margin: 50.0,
            snapshot_scale: 2.0,
            max_header_chars: 150,
            vision_hint_chars: 2000,
            page_map_tail: 50,
            page_boilerplate: ["Modifications reserved", "Document number", "Bosch Sensortec"]
                .into_iter()
                .map(String::from)
                .collect(),
            cleanup_tokens: vec!["[TBD]".to_string()],
        }
    }
}

impl Heuristics {
    /// Load heuristics from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, IngestError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IngestError::InvalidConfig(format!(
                "cannot read heuristics file '{}': {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            IngestError::InvalidConfig(format!(
                "malformed heuristics file '{}': {e}",
                path.display()
            ))
        })
    }

    fn validate(&self) -> Result<(), IngestError> {
        let non_negative = [
            ("text_band", self.text_band),
            ("image_band", self.image_band),
            ("recovery_max_gap", self.recovery_max_gap),
            ("recovery_lookback", self.recovery_lookback),
            ("recovery_top_floor", self.recovery_top_floor),
            ("recovery_min_height", self.recovery_min_height),
            ("recovery_caption_margin", self.recovery_caption_margin),
            ("recovery_side_margin", self.recovery_side_margin),
            ("block_gap_ratio", self.block_gap_ratio),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(IngestError::InvalidConfig(format!(
                    "{name} must be a finite value ≥ 0, got {value}"
                )));
            }
        }
        if !(self.snapshot_scale.is_finite() && self.snapshot_scale > 0.0) {
            return Err(IngestError::InvalidConfig(format!(
                "snapshot_scale must be > 0, got {}",
                self.snapshot_scale
            )));
        }
        if self.max_header_chars == 0 {
            return Err(IngestError::InvalidConfig(
                "max_header_chars must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for an ingestion run.
///
/// Built via [`IngestConfig::builder()`] or using [`IngestConfig::default()`].
///
/// # Example
/// ```rust
/// use docstream::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .concurrency(4)
///     .capture_vision_pages(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Layout heuristics. Default: [`Heuristics::default()`].
    pub heuristics: Heuristics,

    /// Upper bound on concurrently running downstream tasks. Default: 10.
    pub concurrency: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Pages visited by the page-granular path. Default: all pages.
    ///
    /// The fine-grained stream always covers the whole document, since its
    /// ordering and segmentation depend on visiting every page.
    pub pages: PageSelection,

    /// Render a full-page PNG for pages that need vision analysis. Default: true.
    pub capture_vision_pages: bool,

    /// Render scale for full-page vision captures. Default: 2.0.
    pub vision_capture_scale: f32,

    /// Optional per-page progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            heuristics: Heuristics::default(),
            concurrency: 10,
            password: None,
            pages: PageSelection::default(),
            capture_vision_pages: true,
            vision_capture_scale: 2.0,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("heuristics", &self.heuristics)
            .field("concurrency", &self.concurrency)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pages", &self.pages)
            .field("capture_vision_pages", &self.capture_vision_pages)
            .field("vision_capture_scale", &self.vision_capture_scale)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn heuristics(mut self, heuristics: Heuristics) -> Self {
        self.config.heuristics = heuristics;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn capture_vision_pages(mut self, v: bool) -> Self {
        self.config.capture_vision_pages = v;
        self
    }

    pub fn vision_capture_scale(mut self, scale: f32) -> Self {
        self.config.vision_capture_scale = scale;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(IngestError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if !(c.vision_capture_scale.is_finite() && c.vision_capture_scale > 0.0) {
            return Err(IngestError::InvalidConfig(format!(
                "vision_capture_scale must be > 0, got {}",
                c.vision_capture_scale
            )));
        }
        c.heuristics.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages the page-granular path visits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 1-indexed page numbers.
    pub fn to_pages(&self, total_pages: u32) -> Vec<u32> {
        let total = total_pages as usize;
        let mut pages: Vec<usize> = match self {
            PageSelection::All => (1..=total).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total {
                    vec![*p]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => ((*start).max(1)..=(*end).min(total)).collect(),
            PageSelection::Set(pages) => pages
                .iter()
                .copied()
                .filter(|&p| p >= 1 && p <= total)
                .collect(),
        };
        pages.sort_unstable();
        pages.dedup();
        pages.into_iter().map(|p| p as u32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let h = Heuristics::default();
        assert_eq!(h.text_band, 50.0);
        assert_eq!(h.short_block_chars, 100);
        assert_eq!(h.image_band, 80.0);
        assert_eq!(h.image_text_limit, 50);
        assert_eq!(h.recovery_max_gap, 400.0);
        assert_eq!(h.recovery_lookback, 350.0);
        assert_eq!(h.max_header_chars, 150);
        assert_eq!(h.vision_hint_chars, 2000);
        assert_eq!(h.page_map_tail, 50);
        assert!(h.noise_patterns.iter().any(|p| p == "Modifications reserved"));
    }

    #[test]
    fn partial_heuristics_json_keeps_defaults() {
        let h: Heuristics =
            serde_json::from_str(r#"{"noise_patterns": ["ACME Corp"], "snapshot_scale": 3.0}"#)
                .unwrap();
        assert_eq!(h.noise_patterns, vec!["ACME Corp".to_string()]);
        assert_eq!(h.snapshot_scale, 3.0);
        assert_eq!(h.recovery_max_gap, 400.0);
    }

    #[test]
    fn heuristics_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");
        std::fs::write(&path, r#"{"text_band": 72.0}"#).unwrap();
        let h = Heuristics::from_json_file(&path).unwrap();
        assert_eq!(h.text_band, 72.0);
    }

    #[test]
    fn heuristics_from_bad_file_is_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            Heuristics::from_json_file(&path),
            Err(IngestError::InvalidConfig(_))
        ));
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = IngestConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_rejects_negative_band() {
        let h = Heuristics {
            text_band: -1.0,
            ..Heuristics::default()
        };
        let err = IngestConfig::builder().heuristics(h).build().unwrap_err();
        assert!(err.to_string().contains("text_band"));
    }

    #[test]
    fn builder_rejects_zero_scale() {
        let err = IngestConfig::builder()
            .vision_capture_scale(0.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfig(_)));
    }

    #[test]
    fn debug_redacts_password() {
        let c = IngestConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn page_selection_to_pages() {
        assert_eq!(PageSelection::All.to_pages(3), vec![1, 2, 3]);
        assert_eq!(PageSelection::Single(2).to_pages(3), vec![2]);
        assert_eq!(PageSelection::Single(4).to_pages(3), Vec::<u32>::new());
        assert_eq!(PageSelection::Range(2, 9).to_pages(4), vec![2, 3, 4]);
        assert_eq!(PageSelection::Set(vec![3, 1, 3]).to_pages(5), vec![1, 3]);
    }
}

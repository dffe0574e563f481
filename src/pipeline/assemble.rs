//! Stream assembler: merge every page's units into one reading-order stream
//! and recover vector figures that have a caption but no image unit.
//!
//! ## Recovery pass
//!
//! Figures drawn as vector paths have no embedded image, so extraction sees
//! only their caption. For every caption (`^Figure\s+\d+:`) whose preceding
//! unit is missing, on another page, not an image, or more than
//! `recovery_max_gap` above it, the page region above the caption is
//! rendered and inserted as a [`ImageOrigin::Recovered`] image at the clip's
//! top edge. The stream is re-sorted afterwards.
//!
//! The pass is idempotent: a caption whose clip position already holds a
//! recovered image is not rendered again.

use crate::config::Heuristics;
use crate::error::UnitError;
use crate::model::{BBox, ContentUnit, DocumentStream, ImageFormat, ImageOrigin, ImageUnit, Position};
use crate::pipeline::source::DocumentSource;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

static FIGURE_CAPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Figure\s+\d+:").expect("static regex"));

/// Result of one recovery pass.
#[derive(Debug, Default)]
pub struct RecoveryOutcome {
    /// Recovered images inserted into the stream.
    pub inserted: usize,
    /// Captions whose snapshot failed; they stay plain text.
    pub errors: Vec<UnitError>,
}

/// Sort `units` into reading order and run the recovery pass.
pub fn assemble<S: DocumentSource + ?Sized>(
    units: Vec<ContentUnit>,
    source: &S,
    heuristics: &Heuristics,
) -> (DocumentStream, RecoveryOutcome) {
    let mut stream = DocumentStream::from_units(units);
    let outcome = recover_figures(&mut stream, source, heuristics);
    (stream, outcome)
}

/// `true` when `text` starts like a figure caption.
pub fn is_figure_caption(text: &str) -> bool {
    FIGURE_CAPTION.is_match(text)
}

/// Whether the caption at `index` lacks an image directly above it.
fn needs_recovery(units: &[ContentUnit], index: usize, max_gap: f32) -> bool {
    let caption = &units[index];
    let Some(prev) = index.checked_sub(1).map(|i| &units[i]) else {
        return true;
    };
    prev.page() != caption.page()
        || !prev.is_image()
        || caption.y0() - prev.y0() > max_gap
}

/// Region rendered for a caption at `caption_y` on a page `page_width` wide.
pub fn snapshot_clip(caption_y: f32, page_width: f32, h: &Heuristics) -> BBox {
    let top = h.recovery_top_floor.max(caption_y - h.recovery_lookback);
    let bottom = (top + h.recovery_min_height).max(caption_y - h.recovery_caption_margin);
    BBox::new(
        h.recovery_side_margin,
        top,
        page_width - h.recovery_side_margin,
        bottom,
    )
}

/// Insert recovered figure snapshots into `stream`.
pub fn recover_figures<S: DocumentSource + ?Sized>(
    stream: &mut DocumentStream,
    source: &S,
    h: &Heuristics,
) -> RecoveryOutcome {
    let mut outcome = RecoveryOutcome::default();
    let mut inserted: Vec<ContentUnit> = Vec::new();
    let units = stream.units();

    for (i, unit) in units.iter().enumerate() {
        let Some(text) = unit.as_text() else {
            continue;
        };
        if !is_figure_caption(text) || !needs_recovery(units, i, h.recovery_max_gap) {
            continue;
        }

        let page = unit.page();
        let page_width = match source.page_size(page) {
            Ok(size) => size.width,
            Err(e) => {
                warn!("Page {}: figure snapshot skipped: {}", page, e);
                outcome.errors.push(UnitError::RecoverySnapshot {
                    page,
                    detail: e.to_string(),
                });
                continue;
            }
        };
        let clip = snapshot_clip(unit.y0(), page_width, h);

        // Earlier passes only: two captions in one pass may share a clip.
        let already_recovered = units
            .iter()
            .any(|u| u.page() == page && u.is_recovered() && u.position.bbox == clip);
        if already_recovered {
            continue;
        }

        info!(
            "Orphan caption {:?} at P{}:Y{:.0}; rendering snapshot",
            text.chars().take(20).collect::<String>(),
            page,
            unit.y0()
        );
        match source.render_clip(page, clip, h.snapshot_scale) {
            Ok(png) => inserted.push(ContentUnit::image(
                Position::from_bbox(page, clip),
                ImageUnit {
                    data: png,
                    format: ImageFormat::Png,
                    origin: ImageOrigin::Recovered,
                },
            )),
            Err(e) => {
                warn!("Page {}: figure snapshot failed: {}", page, e);
                outcome.errors.push(UnitError::RecoverySnapshot {
                    page,
                    detail: e.to_string(),
                });
            }
        }
    }

    outcome.inserted = inserted.len();
    stream.insert_and_resort(inserted);
    outcome
}

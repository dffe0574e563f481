//! Geometry extractor: one page of a [`DocumentSource`] → position-tagged
//! content units, with the noise filter applied at extraction time.
//!
//! Failures here are never fatal. An unreadable image, a page whose text
//! layer cannot be read, or an unusable page size is logged, recorded as a
//! [`UnitError::Extraction`] and skipped; the rest of the page still counts.

use crate::config::Heuristics;
use crate::error::UnitError;
use crate::model::{ContentUnit, ImageOrigin, ImageUnit, Position};
use crate::pipeline::noise::{self, ImageCandidate, TextCandidate, Verdict};
use crate::pipeline::source::DocumentSource;
use tracing::{debug, warn};

/// Units and bookkeeping for one page.
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub page: u32,
    /// Kept units in extraction order (text blocks first, then images).
    pub units: Vec<ContentUnit>,
    pub dropped_text: usize,
    pub dropped_images: usize,
    pub errors: Vec<UnitError>,
}

/// Extract and filter one page.
pub fn extract_page<S: DocumentSource + ?Sized>(
    source: &S,
    page: u32,
    heuristics: &Heuristics,
) -> PageExtraction {
    let mut out = PageExtraction {
        page,
        ..PageExtraction::default()
    };

    let size = match source.page_size(page) {
        Ok(size) => size,
        Err(e) => {
            warn!("Page {}: cannot read page size: {}", page, e);
            out.errors.push(UnitError::Extraction {
                page,
                detail: format!("page size: {e}"),
            });
            return out;
        }
    };

    // ── Text blocks ──────────────────────────────────────────────────────
    match source.text_blocks(page) {
        Ok(blocks) => {
            for block in blocks {
                let text = block.text.trim();
                if text.is_empty() {
                    continue;
                }
                let candidate = TextCandidate {
                    text,
                    y0: block.bbox.y0,
                    page_height: size.height,
                };
                match noise::filter_text(&candidate, heuristics) {
                    Verdict::Drop(rule) => {
                        debug!(
                            "Page {}: drop text at y={:.1} ({}): {:?}",
                            page,
                            block.bbox.y0,
                            rule,
                            preview(text)
                        );
                        out.dropped_text += 1;
                    }
                    _ => out
                        .units
                        .push(ContentUnit::text(Position::from_bbox(page, block.bbox), text)),
                }
            }
        }
        Err(e) => {
            warn!("Page {}: text extraction failed: {}", page, e);
            out.errors.push(UnitError::Extraction {
                page,
                detail: format!("text blocks: {e}"),
            });
        }
    }

    // ── Images ───────────────────────────────────────────────────────────
    let images = match source.images(page) {
        Ok(images) => images,
        Err(e) => {
            warn!("Page {}: image enumeration failed: {}", page, e);
            out.errors.push(UnitError::Extraction {
                page,
                detail: format!("images: {e}"),
            });
            return out;
        }
    };

    for entry in images {
        let image = match entry {
            Ok(image) => image,
            Err(e) => {
                warn!("Page {}: skip unplaceable image: {}", page, e);
                out.errors.push(UnitError::Extraction {
                    page,
                    detail: e.to_string(),
                });
                continue;
            }
        };
        let overlay_chars = match source.text(page, Some(image.bbox)) {
            Ok(t) => t.trim().chars().count(),
            Err(e) => {
                warn!("Page {}: skip image {}: clip text failed: {}", page, image.index, e);
                out.errors.push(UnitError::Extraction {
                    page,
                    detail: format!("image {} clip text: {e}", image.index),
                });
                continue;
            }
        };
        let candidate = ImageCandidate {
            y0: image.bbox.y0,
            page_height: size.height,
            overlay_chars,
        };
        if let Verdict::Drop(rule) = noise::filter_image(&candidate, heuristics) {
            debug!(
                "Page {}: drop image {} at y={:.1} ({}, {} overlay chars)",
                page, image.index, image.bbox.y0, rule, overlay_chars
            );
            out.dropped_images += 1;
            continue;
        }

        match source.image_data(page, &image) {
            Ok(encoded) => out.units.push(ContentUnit::image(
                Position::from_bbox(page, image.bbox),
                ImageUnit {
                    data: encoded.data,
                    format: encoded.format,
                    origin: ImageOrigin::Embedded { index: image.index },
                },
            )),
            Err(e) => {
                warn!("Page {}: skip unreadable image {}: {}", page, image.index, e);
                out.errors.push(UnitError::Extraction {
                    page,
                    detail: format!("image {}: {e}", image.index),
                });
            }
        }
    }

    out
}

fn preview(s: &str) -> &str {
    match s.char_indices().nth(40) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

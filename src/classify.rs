//! Page classifier: the coarse, page-granular alternative to the stream.
//!
//! Each page is either cheap (its extracted text is good enough) or needs
//! full-page vision analysis because it mentions a figure or table that the
//! text layer cannot carry. The classifier only decides and packages the
//! request; it never calls a vision service.
//!
//! The page → section mapping is a forward fill over TOC start pages and is
//! independent of the fine-grained [`crate::model::SectionMap`].

use crate::config::{Heuristics, IngestConfig};
use crate::error::UnitError;
use crate::model::{PageSectionMap, PREAMBLE_SECTION};
use crate::output::{PageContent, PageDecision, VisionRequest};
use crate::pipeline::cleanup;
use crate::pipeline::source::DocumentSource;
use crate::toc::TocIndex;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

static VISION_TRIGGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(Figure|Fig\.|Table)\s+\d+").expect("static regex"));

/// `true` when `raw_text` references a numbered figure or table.
pub fn vision_required(raw_text: &str) -> bool {
    VISION_TRIGGER.is_match(raw_text)
}

/// First `max_chars` characters of `raw_text`.
pub fn vision_hint(raw_text: &str, max_chars: usize) -> String {
    raw_text.chars().take(max_chars).collect()
}

/// Forward-fill TOC start pages over `1..=max_page + tail`.
///
/// Pages before the first anchor map to `_preamble`. Anchors are consumed
/// in page order with a single pointer.
pub fn page_section_map(toc: &TocIndex, tail: u32) -> PageSectionMap {
    let anchors = toc.anchors();
    let last_page = toc.max_page().saturating_add(tail);
    let mut map = PageSectionMap::default();
    let mut next = 0;
    let mut last_id = PREAMBLE_SECTION;

    for page in 1..=last_page {
        while let Some(anchor) = anchors.get(next).filter(|a| a.page <= page) {
            last_id = anchor.section_id.as_str();
            next += 1;
        }
        map.insert(page, last_id.to_string());
    }
    map
}

/// Classify one page.
///
/// Returns `None` when the page text cannot be read; the failure is pushed
/// to `errors`. A failed vision capture is also recorded, but the page is
/// still returned with `image_png: None`.
pub fn classify_page<S: DocumentSource + ?Sized>(
    source: &S,
    page: u32,
    page_map: &PageSectionMap,
    config: &IngestConfig,
    errors: &mut Vec<UnitError>,
) -> Option<PageDecision> {
    let h = &config.heuristics;
    let raw_text = match source.text(page, None) {
        Ok(t) => t,
        Err(e) => {
            warn!("Page {}: text extraction failed: {}", page, e);
            errors.push(UnitError::Extraction {
                page,
                detail: format!("page text: {e}"),
            });
            return None;
        }
    };

    let needs_vision = vision_required(&raw_text);
    let content = if needs_vision {
        debug!("Page {}: figure/table reference, vision required", page);
        let image_png = if config.capture_vision_pages {
            match source.render_page(page, config.vision_capture_scale) {
                Ok(png) => Some(png),
                Err(e) => {
                    warn!("Page {}: full-page capture failed: {}", page, e);
                    errors.push(UnitError::Extraction {
                        page,
                        detail: format!("vision capture: {e}"),
                    });
                    None
                }
            }
        } else {
            None
        };
        PageContent::Vision(VisionRequest {
            page,
            hint: vision_hint(&raw_text, h.vision_hint_chars),
            image_png,
        })
    } else {
        PageContent::Text {
            text: cleanup::clean_page_text(&raw_text, &h.page_boilerplate),
        }
    };

    Some(PageDecision {
        page,
        section_id: page_map.get(page).map(str::to_string),
        raw_text,
        vision_required: needs_vision,
        content,
    })
}

// ── Section buffers ──────────────────────────────────────────────────────

/// Joined, cleaned text of one section on the coarse path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionBuffer {
    pub section_id: String,
    /// Pages that contributed, in page order.
    pub pages: Vec<u32>,
    pub text: String,
}

/// Group page content by section id.
///
/// `vision_results` holds the Markdown a vision collaborator returned, keyed
/// by page; a vision page without a result falls back to its raw text.
/// Pages mapped to `_preamble` or past the page map are skipped, as are
/// sections whose cleaned buffer is empty.
pub fn section_buffers(
    pages: &[PageDecision],
    vision_results: &HashMap<u32, String>,
    h: &Heuristics,
) -> Vec<SectionBuffer> {
    let mut order: Vec<(String, Vec<u32>, Vec<&str>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for decision in pages {
        let Some(id) = decision.section_id.as_deref() else {
            continue;
        };
        if id == PREAMBLE_SECTION {
            continue;
        }
        let text = match &decision.content {
            PageContent::Text { text } => text.as_str(),
            PageContent::Vision(_) => vision_results
                .get(&decision.page)
                .map(String::as_str)
                .unwrap_or(&decision.raw_text),
        };
        let slot = *index.entry(id).or_insert_with(|| {
            order.push((id.to_string(), Vec::new(), Vec::new()));
            order.len() - 1
        });
        order[slot].1.push(decision.page);
        order[slot].2.push(text);
    }

    order
        .into_iter()
        .filter_map(|(section_id, pages, parts)| {
            let text = cleanup::clean_section_buffer(&parts.join("\n\n"), &h.cleanup_tokens);
            if text.is_empty() {
                debug!("Section {}: empty after cleanup, skipped", section_id);
                return None;
            }
            Some(SectionBuffer {
                section_id,
                pages,
                text,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BBox;
    use crate::pipeline::source::{MemoryDocument, MemoryPage};
    use crate::toc::TocNode;

    fn node(title: &str, page: i64) -> TocNode {
        TocNode {
            title: title.into(),
            page,
            level: 1,
            children: Vec::new(),
        }
    }

    fn toc() -> TocIndex {
        TocIndex::from_nodes(&[node("2.1 Setup", 5), node("2.2 Usage", 8)]).unwrap()
    }

    #[test]
    fn vision_trigger() {
        assert!(vision_required("See Figure 3 for wiring."));
        assert!(vision_required("as in Fig. 12"));
        assert!(vision_required("Table 4 lists the pins"));
        assert!(!vision_required("No pictures here."));
        assert!(!vision_required("figure 3 in lower case"));
        assert!(!vision_required("Table of contents"));
    }

    #[test]
    fn forward_fill() {
        let map = page_section_map(&toc(), 50);
        for p in 1..=4 {
            assert_eq!(map.get(p), Some("_preamble"));
        }
        for p in 5..=7 {
            assert_eq!(map.get(p), Some("2.1"));
        }
        assert_eq!(map.get(8), Some("2.2"));
        assert_eq!(map.get(58), Some("2.2"));
        assert_eq!(map.get(59), None);
        assert_eq!(map.last_page(), Some(58));
    }

    #[test]
    fn forward_fill_same_page_takes_last_anchor() {
        let toc = TocIndex::from_nodes(&[node("1 Intro", 1), node("1.1 Scope", 1)]).unwrap();
        let map = page_section_map(&toc, 0);
        assert_eq!(map.get(1), Some("1.1"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn hint_is_truncated_by_chars() {
        assert_eq!(vision_hint("äöü", 2), "äö");
        assert_eq!(vision_hint("ab", 10), "ab");
    }

    fn doc() -> MemoryDocument {
        MemoryDocument::new(vec![
            MemoryPage::new(600.0, 800.0)
                .raw_text("Body line\nModifications reserved | Document number: 1\nMore"),
            MemoryPage::new(600.0, 800.0).raw_text("See Figure 3 for wiring."),
            MemoryPage::new(600.0, 800.0)
                .raw_text("Table 1 below")
                .failing_render(),
        ])
    }

    #[test]
    fn text_page_is_cleaned() {
        let map = page_section_map(&toc(), 50);
        let mut errors = Vec::new();
        let d = classify_page(&doc(), 1, &map, &IngestConfig::default(), &mut errors).unwrap();
        assert!(!d.vision_required);
        assert_eq!(
            d.content,
            PageContent::Text {
                text: "Body line\nMore".into()
            }
        );
        assert_eq!(d.section_id.as_deref(), Some("_preamble"));
        assert!(errors.is_empty());
    }

    #[test]
    fn vision_page_carries_capture() {
        let map = page_section_map(&toc(), 50);
        let mut errors = Vec::new();
        let d = classify_page(&doc(), 2, &map, &IngestConfig::default(), &mut errors).unwrap();
        assert!(d.vision_required);
        match d.content {
            PageContent::Vision(req) => {
                assert_eq!(req.hint, "See Figure 3 for wiring.");
                assert!(req.image_png.is_some());
            }
            other => panic!("expected vision, got {other:?}"),
        }
    }

    #[test]
    fn capture_can_be_disabled() {
        let map = page_section_map(&toc(), 50);
        let config = IngestConfig::builder()
            .capture_vision_pages(false)
            .build()
            .unwrap();
        let mut errors = Vec::new();
        let d = classify_page(&doc(), 2, &map, &config, &mut errors).unwrap();
        assert!(matches!(d.content, PageContent::Vision(VisionRequest { image_png: None, .. })));
    }

    #[test]
    fn failed_capture_is_recorded_not_fatal() {
        let map = page_section_map(&toc(), 50);
        let mut errors = Vec::new();
        let d = classify_page(&doc(), 3, &map, &IngestConfig::default(), &mut errors).unwrap();
        assert!(d.vision_required);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn unreadable_page_is_skipped() {
        let map = page_section_map(&toc(), 50);
        let mut errors = Vec::new();
        assert!(classify_page(&doc(), 9, &map, &IngestConfig::default(), &mut errors).is_none());
        assert!(matches!(errors[0], UnitError::Extraction { page: 9, .. }));
    }

    fn decision(page: u32, id: Option<&str>, content: PageContent) -> PageDecision {
        PageDecision {
            page,
            section_id: id.map(str::to_string),
            raw_text: format!("raw {page}"),
            vision_required: matches!(content, PageContent::Vision(_)),
            content,
        }
    }

    fn text(s: &str) -> PageContent {
        PageContent::Text { text: s.into() }
    }

    #[test]
    fn buffers_group_in_first_encounter_order() {
        let pages = vec![
            decision(1, Some("_preamble"), text("cover")),
            decision(5, Some("2.1"), text("setup a")),
            decision(6, Some("2.1"), text("setup b [TBD]")),
            decision(
                8,
                Some("2.2"),
                PageContent::Vision(VisionRequest {
                    page: 8,
                    hint: String::new(),
                    image_png: None,
                }),
            ),
            decision(9, None, text("beyond")),
        ];
        let buffers = section_buffers(&pages, &HashMap::new(), &Heuristics::default());
        assert_eq!(buffers.len(), 2);
        assert_eq!(buffers[0].section_id, "2.1");
        assert_eq!(buffers[0].pages, vec![5, 6]);
        assert_eq!(buffers[0].text, "setup a\n\nsetup b\n");
        // vision page without a result falls back to raw text
        assert_eq!(buffers[1].text, "raw 8\n");

        let mut results = HashMap::new();
        results.insert(8, "| a | b |".to_string());
        let buffers = section_buffers(&pages, &results, &Heuristics::default());
        assert_eq!(buffers[1].text, "| a | b |\n");
    }

    #[test]
    fn empty_sections_are_skipped() {
        let pages = vec![decision(5, Some("2.1"), text("[TBD]"))];
        assert!(section_buffers(&pages, &HashMap::new(), &Heuristics::default()).is_empty());
    }

    #[test]
    fn block_text_is_page_text_by_default() {
        let doc = MemoryDocument::new(vec![MemoryPage::new(600.0, 800.0)
            .text(BBox::new(50.0, 100.0, 500.0, 120.0), "Table 2 shows pins")]);
        let map = page_section_map(&toc(), 0);
        let mut errors = Vec::new();
        let d = classify_page(&doc, 1, &map, &IngestConfig::default(), &mut errors).unwrap();
        assert!(d.vision_required);
    }
}

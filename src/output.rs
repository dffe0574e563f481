//! Artifacts returned by the ingest entry points.
//!
//! Everything here is `Serialize` so a caller can hand the result straight
//! to [`crate::ingest::write_json`] or a downstream worker.

use crate::error::UnitError;
use crate::model::{DocumentStream, ImageFormat, PageSectionMap, SectionMap};
use crate::pipeline::encode;
use crate::prompts;
use serde::{Deserialize, Serialize};

/// Result of a fine-grained ingest run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutput {
    /// The assembled reading-order stream, recovered figures included.
    pub stream: DocumentStream,
    /// The stream partitioned by section id, in first-encounter order.
    pub sections: SectionMap,
    pub stats: IngestStats,
    /// `None` when the source is not a PDF file (e.g. an in-memory source).
    pub metadata: Option<DocumentMetadata>,
}

/// Counters and timings for one ingest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestStats {
    pub total_pages: u32,
    /// Text units in the stream, headers included.
    pub text_units: usize,
    /// Image units in the stream, recovered ones included.
    pub image_units: usize,
    pub recovered_images: usize,
    pub dropped_text: usize,
    pub dropped_images: usize,
    pub headers: usize,
    pub sections: usize,
    /// Non-fatal errors, in the order they occurred.
    pub errors: Vec<UnitError>,
    pub extract_duration_ms: u64,
    pub segment_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// PDF document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: u32,
    pub pdf_version: String,
}

// ── Coarse path ──────────────────────────────────────────────────────────

/// What a caller should do with one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageContent {
    /// Text extraction suffices; the value is the cleaned page text.
    Text { text: String },
    /// The page needs full-page vision analysis.
    Vision(VisionRequest),
}

/// Everything a vision collaborator needs for one page.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionRequest {
    pub page: u32,
    /// Leading characters of the raw page text, for calibration.
    pub hint: String,
    /// Full-page PNG; `None` when capture was disabled or failed.
    #[serde(with = "crate::model::base64_opt", default)]
    pub image_png: Option<Vec<u8>>,
}

impl VisionRequest {
    pub fn system_prompt(&self) -> &'static str {
        prompts::PAGE_VISION_SYSTEM_PROMPT
    }

    /// User message to send with the page image.
    pub fn prompt(&self) -> String {
        prompts::page_vision_prompt(&self.hint)
    }

    /// `data:` URL of the captured page, if any.
    pub fn data_url(&self) -> Option<String> {
        self.image_png
            .as_deref()
            .map(|png| encode::data_url(png, ImageFormat::Png))
    }
}

impl std::fmt::Debug for VisionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionRequest")
            .field("page", &self.page)
            .field("hint", &format_args!("<{} chars>", self.hint.chars().count()))
            .field(
                "image_png",
                &self.image_png.as_ref().map(|b| format!("<{} bytes>", b.len())),
            )
            .finish()
    }
}

/// Decision for one page of the coarse path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDecision {
    pub page: u32,
    /// Forward-filled section id; `None` past the end of the page map.
    pub section_id: Option<String>,
    pub raw_text: String,
    pub vision_required: bool,
    pub content: PageContent,
}

impl PageDecision {
    /// Text usable without a vision call: the cleaned text, or the raw text
    /// of a vision page.
    pub fn fallback_text(&self) -> &str {
        match &self.content {
            PageContent::Text { text } => text,
            PageContent::Vision(_) => &self.raw_text,
        }
    }
}

/// Result of [`crate::ingest::scan_pages`].
#[derive(Debug, Clone, Serialize)]
pub struct PageScanOutput {
    pub page_map: PageSectionMap,
    /// Decisions for the selected pages, in page order.
    pub pages: Vec<PageDecision>,
    pub errors: Vec<UnitError>,
    pub metadata: Option<DocumentMetadata>,
}

impl PageScanOutput {
    pub fn vision_pages(&self) -> impl Iterator<Item = &PageDecision> {
        self.pages.iter().filter(|p| p.vision_required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vision(png: Option<Vec<u8>>) -> VisionRequest {
        VisionRequest {
            page: 3,
            hint: "See Figure 3 for wiring.".into(),
            image_png: png,
        }
    }

    #[test]
    fn vision_prompt_embeds_hint() {
        assert!(vision(None).prompt().contains("See Figure 3 for wiring."));
    }

    #[test]
    fn data_url_only_with_capture() {
        assert!(vision(None).data_url().is_none());
        let url = vision(Some(vec![1, 2, 3])).data_url().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn vision_request_serialises_image_as_base64() {
        let json = serde_json::to_value(vision(Some(vec![1, 2, 3]))).unwrap();
        assert_eq!(json["image_png"], "AQID");
        let back: VisionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back.image_png, Some(vec![1, 2, 3]));
    }

    #[test]
    fn fallback_text_per_content() {
        let text_page = PageDecision {
            page: 1,
            section_id: Some("1".into()),
            raw_text: "raw".into(),
            vision_required: false,
            content: PageContent::Text {
                text: "clean".into(),
            },
        };
        assert_eq!(text_page.fallback_text(), "clean");
        let vision_page = PageDecision {
            vision_required: true,
            content: PageContent::Vision(vision(None)),
            ..text_page
        };
        assert_eq!(vision_page.fallback_text(), "raw");
    }
}

//! Section Markdown and image-description requests.
//!
//! A section's units become Markdown in stream order: headers as `# ` lines,
//! text blocks as paragraphs, images as their description. Descriptions come
//! from a downstream collaborator, so this module also packages each image
//! with the text that precedes it in the section ([`image_requests`]).

use crate::model::{ImageFormat, SegmentedUnit, UnitBody};
use crate::pipeline::encode;
use crate::prompts;
use std::collections::HashMap;

/// Longest context sent with an image, in characters.
pub const MAX_CONTEXT_CHARS: usize = 2000;

/// One image of a section, ready for a description call.
#[derive(Clone, PartialEq)]
pub struct ImageDescriptionRequest {
    /// 1-based ordinal of the image within its section.
    pub index: usize,
    /// Text of the last header before the image, or the section id.
    pub section_title: String,
    /// Section text preceding the image, truncated from the front.
    pub context: String,
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ImageDescriptionRequest {
    pub fn system_prompt(&self) -> &'static str {
        prompts::IMAGE_DESCRIPTION_SYSTEM_PROMPT
    }

    pub fn prompt(&self) -> String {
        prompts::image_context_prompt(&self.context, &self.section_title)
    }

    pub fn data_url(&self) -> String {
        encode::data_url(&self.bytes, self.format)
    }
}

impl std::fmt::Debug for ImageDescriptionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageDescriptionRequest")
            .field("index", &self.index)
            .field("section_title", &self.section_title)
            .field("context", &format_args!("<{} chars>", self.context.chars().count()))
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("format", &self.format)
            .finish()
    }
}

/// Keep the last `max` characters, prefixed with `...` when cut.
pub fn truncate_context(context: &str, max: usize) -> String {
    let count = context.chars().count();
    if count <= max {
        return context.to_string();
    }
    let keep = max.saturating_sub(3);
    let tail: String = context.chars().skip(count - keep).collect();
    format!("...{tail}")
}

/// Build a description request for every image in `units`.
///
/// The running context restarts at each header and grows with each text
/// block; images do not add to it.
pub fn image_requests(units: &[SegmentedUnit]) -> Vec<ImageDescriptionRequest> {
    let mut requests = Vec::new();
    let mut title = units
        .first()
        .map(|u| u.section_id.clone())
        .unwrap_or_default();
    let mut context = String::new();

    for su in units {
        match &su.unit.body {
            UnitBody::Text(text) if su.promoted => {
                title = text.trim().to_string();
                context = format!("{title}\n");
            }
            UnitBody::Text(text) => {
                context.push_str(text);
                context.push('\n');
            }
            UnitBody::Image(image) => requests.push(ImageDescriptionRequest {
                index: requests.len() + 1,
                section_title: title.clone(),
                context: truncate_context(&context, MAX_CONTEXT_CHARS),
                bytes: image.data.clone(),
                format: image.format,
            }),
        }
    }
    requests
}

/// Render a section to Markdown.
///
/// `descriptions` maps an image's 1-based ordinal to its description; an
/// image without one gets a placeholder.
pub fn render_section(units: &[SegmentedUnit], descriptions: &HashMap<usize, String>) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(units.len());
    let mut image_no = 0;

    for su in units {
        match &su.unit.body {
            UnitBody::Text(text) if su.promoted => parts.push(format!("# {}", text.trim())),
            UnitBody::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
            UnitBody::Image(_) => {
                image_no += 1;
                parts.push(match descriptions.get(&image_no) {
                    Some(d) => d.trim().to_string(),
                    None => format!("[Image {image_no}: pending description]"),
                });
            }
        }
    }
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, ContentUnit, ImageOrigin, ImageUnit, Position};

    fn pos(y: f32) -> Position {
        Position::from_bbox(1, BBox::new(50.0, y, 500.0, y + 10.0))
    }

    fn text(y: f32, s: &str, promoted: bool) -> SegmentedUnit {
        SegmentedUnit {
            unit: ContentUnit::text(pos(y), s),
            section_id: "2.1".into(),
            promoted,
        }
    }

    fn image(y: f32) -> SegmentedUnit {
        SegmentedUnit {
            unit: ContentUnit::image(
                pos(y),
                ImageUnit {
                    data: vec![7],
                    format: ImageFormat::Jpeg,
                    origin: ImageOrigin::Embedded { index: 0 },
                },
            ),
            section_id: "2.1".into(),
            promoted: false,
        }
    }

    fn section() -> Vec<SegmentedUnit> {
        vec![
            text(100.0, "2.1 Setup", true),
            text(120.0, "Connect the board.", false),
            image(140.0),
            text(300.0, "Then flash it.", false),
            image(320.0),
        ]
    }

    #[test]
    fn context_grows_through_section() {
        let reqs = image_requests(&section());
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].index, 1);
        assert_eq!(reqs[0].section_title, "2.1 Setup");
        assert_eq!(reqs[0].context, "2.1 Setup\nConnect the board.\n");
        assert_eq!(
            reqs[1].context,
            "2.1 Setup\nConnect the board.\nThen flash it.\n"
        );
        assert!(reqs[1].data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn header_resets_context() {
        let units = vec![
            text(100.0, "Old text", false),
            text(110.0, "2.1.1 Detail", true),
            image(120.0),
        ];
        let reqs = image_requests(&units);
        assert_eq!(reqs[0].context, "2.1.1 Detail\n");
        assert_eq!(reqs[0].section_title, "2.1.1 Detail");
    }

    #[test]
    fn title_defaults_to_section_id() {
        let reqs = image_requests(&[image(100.0)]);
        assert_eq!(reqs[0].section_title, "2.1");
        assert_eq!(reqs[0].context, "");
    }

    #[test]
    fn long_context_keeps_tail() {
        let long = "a".repeat(2500) + "END";
        let t = truncate_context(&long, MAX_CONTEXT_CHARS);
        assert_eq!(t.chars().count(), MAX_CONTEXT_CHARS);
        assert!(t.starts_with("..."));
        assert!(t.ends_with("END"));
        assert_eq!(truncate_context("short", MAX_CONTEXT_CHARS), "short");
    }

    #[test]
    fn render_with_and_without_descriptions() {
        let mut descriptions = HashMap::new();
        descriptions.insert(2, "```bash\n$ flash\n```\n".to_string());
        let md = render_section(&section(), &descriptions);
        assert_eq!(
            md,
            "# 2.1 Setup\n\nConnect the board.\n\n[Image 1: pending description]\n\nThen flash it.\n\n```bash\n$ flash\n```"
        );
    }

    #[test]
    fn blank_text_is_skipped() {
        let md = render_section(&[text(1.0, "  ", false)], &HashMap::new());
        assert_eq!(md, "");
    }
}

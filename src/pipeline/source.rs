//! The document boundary: what the pipeline needs from a paginated source.
//!
//! [`DocumentSource`] is the only seam between the layout pipeline and a
//! concrete backend. [`crate::pipeline::render::PdfiumDocument`] implements
//! it over pdfium; [`MemoryDocument`] implements it over pages described in
//! memory, for callers that extract geometry with other tooling and for
//! tests.
//!
//! Conventions shared by every implementation:
//!
//! - pages are 1-based;
//! - coordinates are layout units with a top-left origin;
//! - `render_clip` returns PNG bytes.

use crate::error::SourceError;
use crate::model::{BBox, ImageFormat};
use crate::pipeline::encode;

/// Page dimensions in layout units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// The whole page as a box.
    pub fn bbox(&self) -> BBox {
        BBox::new(0.0, 0.0, self.width, self.height)
    }
}

/// A block of text with its bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub bbox: BBox,
}

/// An embedded image placement on a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRef {
    /// Backend-specific handle, stable for the lifetime of the source.
    pub index: usize,
    pub bbox: BBox,
}

/// Raw bytes of an embedded image.
#[derive(Clone, PartialEq)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: ImageFormat,
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .field("format", &self.format)
            .finish()
    }
}

/// A page-addressable document.
pub trait DocumentSource {
    /// Number of pages.
    fn page_count(&self) -> u32;

    fn page_size(&self, page: u32) -> Result<PageSize, SourceError>;

    /// Text blocks of a page, in the backend's extraction order.
    fn text_blocks(&self, page: u32) -> Result<Vec<TextBlock>, SourceError>;

    /// Embedded image placements of a page.
    ///
    /// An image whose placement cannot be read is returned as an `Err`
    /// entry in place; the outer `Err` means the page itself is unreadable.
    fn images(&self, page: u32) -> Result<Vec<Result<ImageRef, SourceError>>, SourceError>;

    /// Decode one embedded image.
    fn image_data(&self, page: u32, image: &ImageRef) -> Result<EncodedImage, SourceError>;

    /// Render `clip` of a page at `scale` to PNG bytes.
    fn render_clip(&self, page: u32, clip: BBox, scale: f32) -> Result<Vec<u8>, SourceError>;

    /// Plain text of a page, optionally restricted to `clip`.
    fn text(&self, page: u32, clip: Option<BBox>) -> Result<String, SourceError>;

    /// Render a whole page at `scale` to PNG bytes.
    fn render_page(&self, page: u32, scale: f32) -> Result<Vec<u8>, SourceError> {
        let size = self.page_size(page)?;
        self.render_clip(page, size.bbox(), scale)
    }
}

// ── In-memory source ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct MemoryImage {
    /// `None` marks an image whose placement cannot be read.
    bbox: Option<BBox>,
    /// `None` marks an image that fails to decode.
    data: Option<EncodedImage>,
}

/// One page of a [`MemoryDocument`], built fluently.
///
/// ```rust
/// use docstream::{BBox, MemoryPage};
///
/// let page = MemoryPage::new(595.0, 842.0)
///     .text(BBox::new(60.0, 100.0, 500.0, 112.0), "2.1 Requirements")
///     .text(BBox::new(60.0, 130.0, 500.0, 160.0), "A host with a USB port.");
/// ```
#[derive(Debug, Clone)]
pub struct MemoryPage {
    size: PageSize,
    blocks: Vec<TextBlock>,
    images: Vec<MemoryImage>,
    raw_text: Option<String>,
    failing_render: bool,
}

impl MemoryPage {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            size: PageSize { width, height },
            blocks: Vec::new(),
            images: Vec::new(),
            raw_text: None,
            failing_render: false,
        }
    }

    /// Add a text block.
    pub fn text(mut self, bbox: BBox, text: impl Into<String>) -> Self {
        self.blocks.push(TextBlock {
            text: text.into(),
            bbox,
        });
        self
    }

    /// Add an embedded image.
    pub fn image(mut self, bbox: BBox, data: Vec<u8>, format: ImageFormat) -> Self {
        self.images.push(MemoryImage {
            bbox: Some(bbox),
            data: Some(EncodedImage { data, format }),
        });
        self
    }

    /// Add an embedded image whose data cannot be decoded.
    pub fn broken_image(mut self, bbox: BBox) -> Self {
        self.images.push(MemoryImage {
            bbox: Some(bbox),
            data: None,
        });
        self
    }

    /// Add an embedded image with no readable bounds.
    pub fn unplaced_image(mut self, data: Vec<u8>, format: ImageFormat) -> Self {
        self.images.push(MemoryImage {
            bbox: None,
            data: Some(EncodedImage { data, format }),
        });
        self
    }

    /// Override the page's full plain text (default: blocks joined by newlines).
    pub fn raw_text(mut self, text: impl Into<String>) -> Self {
        self.raw_text = Some(text.into());
        self
    }

    /// Make every render of this page fail.
    pub fn failing_render(mut self) -> Self {
        self.failing_render = true;
        self
    }
}

/// A document held entirely in memory.
///
/// Clip renders produce a white PNG of the scaled clip size.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    pages: Vec<MemoryPage>,
}

impl MemoryDocument {
    pub fn new(pages: Vec<MemoryPage>) -> Self {
        Self { pages }
    }

    pub fn push(&mut self, page: MemoryPage) {
        self.pages.push(page);
    }

    fn page(&self, page: u32) -> Result<&MemoryPage, SourceError> {
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .ok_or_else(|| {
                SourceError::new(format!(
                    "page {page} out of range (document has {} pages)",
                    self.pages.len()
                ))
            })
    }
}

impl DocumentSource for MemoryDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page: u32) -> Result<PageSize, SourceError> {
        Ok(self.page(page)?.size)
    }

    fn text_blocks(&self, page: u32) -> Result<Vec<TextBlock>, SourceError> {
        Ok(self.page(page)?.blocks.clone())
    }

    fn images(&self, page: u32) -> Result<Vec<Result<ImageRef, SourceError>>, SourceError> {
        Ok(self
            .page(page)?
            .images
            .iter()
            .enumerate()
            .map(|(index, img)| {
                img.bbox
                    .map(|bbox| ImageRef { index, bbox })
                    .ok_or_else(|| SourceError::new(format!("image {index} has no bounds")))
            })
            .collect())
    }

    fn image_data(&self, page: u32, image: &ImageRef) -> Result<EncodedImage, SourceError> {
        self.page(page)?
            .images
            .get(image.index)
            .and_then(|img| img.data.clone())
            .ok_or_else(|| SourceError::new(format!("image {} cannot be decoded", image.index)))
    }

    fn render_clip(&self, page: u32, clip: BBox, scale: f32) -> Result<Vec<u8>, SourceError> {
        let p = self.page(page)?;
        if p.failing_render {
            return Err(SourceError::new(format!("render of page {page} failed")));
        }
        let w = (clip.width() * scale).ceil() as u32;
        let h = (clip.height() * scale).ceil() as u32;
        encode::blank_png(w, h).map_err(|e| SourceError::new(format!("PNG encode: {e}")))
    }

    fn text(&self, page: u32, clip: Option<BBox>) -> Result<String, SourceError> {
        let p = self.page(page)?;
        match (clip, &p.raw_text) {
            (None, Some(raw)) => Ok(raw.clone()),
            (None, None) => Ok(join_blocks(p.blocks.iter())),
            (Some(clip), _) => Ok(join_blocks(
                p.blocks.iter().filter(|b| b.bbox.intersects(&clip)),
            )),
        }
    }
}

fn join_blocks<'a>(blocks: impl Iterator<Item = &'a TextBlock>) -> String {
    blocks.map(|b| b.text.as_str()).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> MemoryDocument {
        MemoryDocument::new(vec![MemoryPage::new(600.0, 800.0)
            .text(BBox::new(50.0, 100.0, 500.0, 120.0), "top")
            .text(BBox::new(50.0, 400.0, 500.0, 420.0), "middle")
            .image(BBox::new(50.0, 200.0, 300.0, 300.0), vec![9, 9], ImageFormat::Png)
            .broken_image(BBox::new(50.0, 500.0, 300.0, 600.0))])
    }

    #[test]
    fn pages_are_one_based() {
        let d = doc();
        assert_eq!(d.page_count(), 1);
        assert!(d.page_size(1).is_ok());
        assert!(d.page_size(0).is_err());
        assert!(d.page_size(2).is_err());
    }

    #[test]
    fn clip_text_only_includes_overlapping_blocks() {
        let d = doc();
        let t = d.text(1, Some(BBox::new(0.0, 350.0, 600.0, 450.0))).unwrap();
        assert_eq!(t, "middle");
        assert_eq!(d.text(1, None).unwrap(), "top\nmiddle");
    }

    #[test]
    fn broken_image_fails_to_decode() {
        let d = doc();
        let imgs: Vec<ImageRef> = d.images(1).unwrap().into_iter().map(Result::unwrap).collect();
        assert_eq!(imgs.len(), 2);
        assert!(d.image_data(1, &imgs[0]).is_ok());
        assert!(d.image_data(1, &imgs[1]).is_err());
    }

    #[test]
    fn unplaced_image_is_an_entry_error() {
        let d = MemoryDocument::new(vec![MemoryPage::new(600.0, 800.0)
            .unplaced_image(vec![1], ImageFormat::Png)
            .image(BBox::new(50.0, 200.0, 300.0, 300.0), vec![2], ImageFormat::Png)]);
        let imgs = d.images(1).unwrap();
        assert_eq!(imgs.len(), 2);
        assert!(imgs[0].is_err());
        assert_eq!(imgs[1].as_ref().unwrap().index, 1);
    }

    #[test]
    fn render_clip_is_scaled_png() {
        let d = doc();
        let png = d.render_clip(1, BBox::new(50.0, 50.0, 150.0, 100.0), 2.0).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (200, 100));
    }

    #[test]
    fn render_page_covers_whole_page() {
        let d = doc();
        let png = d.render_page(1, 0.5).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (300, 400));
    }

    #[test]
    fn failing_render_reports_error() {
        let d = MemoryDocument::new(vec![MemoryPage::new(100.0, 100.0).failing_render()]);
        assert!(d.render_page(1, 1.0).is_err());
    }

    #[test]
    fn raw_text_override() {
        let d = MemoryDocument::new(vec![MemoryPage::new(100.0, 100.0).raw_text("See Figure 3")]);
        assert_eq!(d.text(1, None).unwrap(), "See Figure 3");
    }
}

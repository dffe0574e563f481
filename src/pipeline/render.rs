//! pdfium backend: [`PdfiumDocument`] implements
//! [`DocumentSource`](crate::pipeline::source::DocumentSource) over a PDF.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! A `PdfDocument` is also not `Send`. Callers therefore bind pdfium, open the
//! document and run the whole serial pass inside one
//! `tokio::task::spawn_blocking` closure; the document is dropped when that
//! closure returns, on every path.
//!
//! ## Coordinates
//!
//! pdfium reports rectangles with a bottom-left origin. Everything leaving
//! this module is converted to top-left (`y_tl = page_height − y_pdf`).
//!
//! ## Text blocks
//!
//! pdfium exposes text as segments (runs of characters sharing a baseline
//! and font). Segments are merged into lines by vertical overlap, and lines
//! into blocks when the gap below a line is small relative to its height.

use crate::error::{IngestError, SourceError};
use crate::model::{BBox, ImageFormat};
use crate::output::DocumentMetadata;
use crate::pipeline::encode;
use crate::pipeline::source::{DocumentSource, EncodedImage, ImageRef, PageSize, TextBlock};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable pointing at a pdfium library file or its directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to a pdfium library.
///
/// Tries, in order: `$PDFIUM_LIB_PATH`, the current directory, the system
/// library search path.
pub fn bind_pdfium() -> Result<Pdfium, IngestError> {
    let mut attempts = Vec::new();

    if let Ok(custom) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        let custom_path = Path::new(&custom);
        let lib = if custom_path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(custom_path)
        } else {
            custom_path.to_path_buf()
        };
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(e) => attempts.push(format!("{}: {e:?}", lib.display())),
        }
    }

    let bindings = match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
    {
        Ok(b) => b,
        Err(e) => {
            attempts.push(format!("./: {e:?}"));
            Pdfium::bind_to_system_library().map_err(|e| {
                attempts.push(format!("system: {e:?}"));
                IngestError::PdfiumBindingFailed(attempts.join("; "))
            })?
        }
    };
    Ok(Pdfium::new(bindings))
}

/// A PDF opened through pdfium.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    page_count: u32,
    block_gap_ratio: f32,
}

impl<'a> PdfiumDocument<'a> {
    /// Open `path`, mapping pdfium failures to fatal ingest errors.
    ///
    /// `block_gap_ratio` controls how text lines are merged into blocks.
    pub fn open(
        pdfium: &'a Pdfium,
        path: &Path,
        password: Option<&'a str>,
        block_gap_ratio: f32,
    ) -> Result<Self, IngestError> {
        let document = pdfium
            .load_pdf_from_file(path, password)
            .map_err(|e| map_load_error(path, password, e))?;
        let page_count = document.pages().len() as u32;
        info!("PDF loaded: {} pages", page_count);
        Ok(Self {
            document,
            page_count,
            block_gap_ratio,
        })
    }

    fn page(&self, page: u32) -> Result<PdfPage<'a>, SourceError> {
        if page == 0 || page > self.page_count {
            return Err(SourceError::new(format!(
                "page {page} out of range (document has {} pages)",
                self.page_count
            )));
        }
        self.document
            .pages()
            .get((page - 1) as u16)
            .map_err(|e| SourceError::new(format!("cannot load page {page}: {e:?}")))
    }

    /// Document metadata (title, author, …) and page count.
    pub fn metadata(&self) -> DocumentMetadata {
        let metadata = self.document.metadata();
        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().to_string();
                if v.is_empty() {
                    None
                } else {
                    Some(v)
                }
            })
        };

        DocumentMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            subject: get_meta(PdfDocumentMetadataTagType::Subject),
            creator: get_meta(PdfDocumentMetadataTagType::Creator),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
            modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
            page_count: self.page_count,
            pdf_version: format!("{:?}", self.document.version()),
        }
    }
}

/// Classify a pdfium load failure.
fn map_load_error(path: &Path, password: Option<&str>, e: PdfiumError) -> IngestError {
    let err_str = format!("{e:?}");
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            IngestError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            IngestError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        IngestError::CorruptPdf {
            path: path.to_path_buf(),
            detail: err_str,
        }
    }
}

impl DocumentSource for PdfiumDocument<'_> {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page_size(&self, page: u32) -> Result<PageSize, SourceError> {
        let p = self.page(page)?;
        Ok(PageSize {
            width: p.width().value,
            height: p.height().value,
        })
    }

    fn text_blocks(&self, page: u32) -> Result<Vec<TextBlock>, SourceError> {
        let p = self.page(page)?;
        let page_height = p.height().value;
        let text = p
            .text()
            .map_err(|e| SourceError::new(format!("text layer unavailable: {e:?}")))?;

        let mut spans = Vec::new();
        for segment in text.segments().iter() {
            let content = segment.text();
            if content.trim().is_empty() {
                continue;
            }
            let bounds = segment.bounds();
            spans.push(TextBlock {
                text: content,
                bbox: to_top_left(
                    bounds.left().value,
                    bounds.top().value,
                    bounds.right().value,
                    bounds.bottom().value,
                    page_height,
                ),
            });
        }

        let lines = group_lines(spans);
        let blocks = group_blocks(lines, self.block_gap_ratio);
        debug!("Page {}: {} text blocks", page, blocks.len());
        Ok(blocks)
    }

    fn images(&self, page: u32) -> Result<Vec<Result<ImageRef, SourceError>>, SourceError> {
        let p = self.page(page)?;
        let page_height = p.height().value;
        let mut refs = Vec::new();
        for (index, object) in p.objects().iter().enumerate() {
            if object.as_image_object().is_none() {
                continue;
            }
            let entry = match object.bounds() {
                Ok(bounds) => Ok(ImageRef {
                    index,
                    bbox: to_top_left(
                        bounds.left().value,
                        bounds.top().value,
                        bounds.right().value,
                        bounds.bottom().value,
                        page_height,
                    ),
                }),
                Err(e) => Err(SourceError::new(format!("image {index} has no bounds: {e:?}"))),
            };
            refs.push(entry);
        }
        Ok(refs)
    }

    fn image_data(&self, page: u32, image: &ImageRef) -> Result<EncodedImage, SourceError> {
        let p = self.page(page)?;
        let object = p
            .objects()
            .get(image.index)
            .map_err(|e| SourceError::new(format!("image {}: {e:?}", image.index)))?;
        let image_object = object
            .as_image_object()
            .ok_or_else(|| SourceError::new(format!("object {} is not an image", image.index)))?;
        let raw = image_object
            .get_raw_image()
            .map_err(|e| SourceError::new(format!("image {} decode: {e:?}", image.index)))?;
        let data = encode::encode_png(&raw)
            .map_err(|e| SourceError::new(format!("image {} encode: {e}", image.index)))?;
        Ok(EncodedImage {
            data,
            format: ImageFormat::Png,
        })
    }

    fn render_clip(&self, page: u32, clip: BBox, scale: f32) -> Result<Vec<u8>, SourceError> {
        let p = self.page(page)?;
        let page_w = p.width().value;
        let page_h = p.height().value;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = p
            .render_with_config(&render_config)
            .map_err(|e| SourceError::new(format!("render page {page}: {e:?}")))?;
        let rendered = bitmap.as_image();
        let (img_w, img_h) = (rendered.width(), rendered.height());
        if img_w == 0 || img_h == 0 || page_w <= 0.0 || page_h <= 0.0 {
            return Err(SourceError::new(format!(
                "page {page} rendered with zero dimensions"
            )));
        }

        let sx = img_w as f32 / page_w;
        let sy = img_h as f32 / page_h;
        let left = (clip.x0.max(0.0) * sx).floor().min(img_w as f32) as u32;
        let top = (clip.y0.max(0.0) * sy).floor().min(img_h as f32) as u32;
        let right = (clip.x1.min(page_w) * sx).ceil().min(img_w as f32) as u32;
        let bottom = (clip.y1.min(page_h) * sy).ceil().min(img_h as f32) as u32;
        if right <= left || bottom <= top {
            return Err(SourceError::new(format!(
                "clip {clip:?} does not overlap page {page}"
            )));
        }

        let cropped = rendered.crop_imm(left, top, right - left, bottom - top);
        debug!(
            "Rendered page {} clip → {}x{} px",
            page,
            cropped.width(),
            cropped.height()
        );
        encode::encode_png(&cropped).map_err(|e| SourceError::new(format!("PNG encode: {e}")))
    }

    fn text(&self, page: u32, clip: Option<BBox>) -> Result<String, SourceError> {
        let p = self.page(page)?;
        let page_h = p.height().value;
        let text = p
            .text()
            .map_err(|e| SourceError::new(format!("text layer unavailable: {e:?}")))?;
        Ok(match clip {
            None => text.all(),
            Some(c) => text.inside_rect(PdfRect::new_from_values(
                page_h - c.y1,
                c.x0,
                page_h - c.y0,
                c.x1,
            )),
        })
    }
}

/// Convert a bottom-left-origin rectangle to a top-left [`BBox`].
fn to_top_left(left: f32, top: f32, right: f32, bottom: f32, page_height: f32) -> BBox {
    let y_a = page_height - top;
    let y_b = page_height - bottom;
    BBox::new(left.min(right), y_a.min(y_b), left.max(right), y_a.max(y_b))
}

// ── Layout grouping ──────────────────────────────────────────────────────

/// Merge spans into lines. Consecutive spans whose vertical extents overlap
/// by at least half the smaller height are the same line.
pub(crate) fn group_lines(spans: Vec<TextBlock>) -> Vec<TextBlock> {
    let mut lines: Vec<TextBlock> = Vec::new();
    for span in spans {
        match lines.last_mut() {
            Some(line) if same_line(&line.bbox, &span.bbox) => {
                let gap = span.bbox.x0 - line.bbox.x1;
                let needs_space = gap > 0.15 * span.bbox.height()
                    && !line.text.ends_with(char::is_whitespace)
                    && !span.text.starts_with(char::is_whitespace);
                if needs_space {
                    line.text.push(' ');
                }
                line.text.push_str(&span.text);
                line.bbox = line.bbox.union(&span.bbox);
            }
            _ => lines.push(span),
        }
    }
    for line in &mut lines {
        line.text = line.text.trim().to_string();
    }
    lines.retain(|l| !l.text.is_empty());
    lines
}

fn same_line(a: &BBox, b: &BBox) -> bool {
    let overlap = a.y1.min(b.y1) - a.y0.max(b.y0);
    let min_h = a.height().min(b.height());
    min_h > 0.0 && overlap >= 0.5 * min_h
}

/// Merge consecutive lines into blocks when the gap below the previous line
/// is at most `gap_ratio` × its height and the heights are similar.
pub(crate) fn group_blocks(lines: Vec<TextBlock>, gap_ratio: f32) -> Vec<TextBlock> {
    let mut blocks: Vec<(TextBlock, f32)> = Vec::new();
    for line in lines {
        let h = line.bbox.height();
        match blocks.last_mut() {
            Some((block, last_h)) if continues_block(&block.bbox, *last_h, &line.bbox, gap_ratio) => {
                block.text.push('\n');
                block.text.push_str(&line.text);
                block.bbox = block.bbox.union(&line.bbox);
                *last_h = h;
            }
            _ => blocks.push((line, h)),
        }
    }
    blocks.into_iter().map(|(b, _)| b).collect()
}

fn continues_block(block: &BBox, last_h: f32, line: &BBox, gap_ratio: f32) -> bool {
    if last_h <= 0.0 {
        return false;
    }
    let gap = line.y0 - block.y1;
    let similar = {
        let r = line.height() / last_h;
        (0.7..=1.4).contains(&r)
    };
    let overlaps_horizontally = line.x0 < block.x1 && block.x0 < line.x1;
    gap >= -0.5 * last_h && gap <= gap_ratio * last_h && similar && overlaps_horizontally
}

//! Core data model: positioned content units, the reading-order stream and
//! the two section maps built from it.
//!
//! ## Ordering
//!
//! The reading order is the total order `(page, y0)`, ascending. Ties keep
//! extraction order, so every sort in this crate is a stable sort through
//! [`Position::reading_cmp`].
//!
//! ## Ownership
//!
//! A [`ContentUnit`] is immutable once created. Segmentation does not change
//! a unit's variant in place; it wraps the unit in a [`SegmentedUnit`] that
//! records the assigned section id and whether the unit was promoted to a
//! header.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Section id given to content that precedes the first detected header.
pub const PREAMBLE_SECTION: &str = "_preamble";

// ── Geometry ─────────────────────────────────────────────────────────────

/// Axis-aligned rectangle in page layout units, top-left origin
/// (`y` grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    /// `true` when the two boxes share some area.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Where a unit sits in the document.
///
/// `page` is 1-based. `y0` is the top edge used for ordering; for every unit
/// this crate creates it equals `bbox.y0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub page: u32,
    pub y0: f32,
    pub bbox: BBox,
}

impl Position {
    /// Position taken from the top-left corner of `bbox`.
    pub fn from_bbox(page: u32, bbox: BBox) -> Self {
        debug_assert!(page >= 1, "pages are 1-based");
        Self {
            page,
            y0: bbox.y0,
            bbox,
        }
    }

    /// Compare two positions in reading order: page first, then `y0`.
    pub fn reading_cmp(&self, other: &Position) -> Ordering {
        self.page
            .cmp(&other.page)
            .then_with(|| self.y0.total_cmp(&other.y0))
    }
}

// ── Content units ────────────────────────────────────────────────────────

/// Raster encoding of an image unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// How an image unit came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageOrigin {
    /// Extracted from the page's embedded image objects.
    Embedded { index: usize },
    /// Synthesised by the figure-recovery pass from a page-region render.
    Recovered,
}

/// Image payload of a content unit.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUnit {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub origin: ImageOrigin,
}

impl std::fmt::Debug for ImageUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUnit")
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .field("format", &self.format)
            .field("origin", &self.origin)
            .finish()
    }
}

/// What a unit carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum UnitBody {
    Text(String),
    Image(ImageUnit),
}

/// One atomic piece of page content with its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub position: Position,
    pub body: UnitBody,
}

impl ContentUnit {
    pub fn text(position: Position, text: impl Into<String>) -> Self {
        Self {
            position,
            body: UnitBody::Text(text.into()),
        }
    }

    pub fn image(position: Position, image: ImageUnit) -> Self {
        Self {
            position,
            body: UnitBody::Image(image),
        }
    }

    pub fn page(&self) -> u32 {
        self.position.page
    }

    pub fn y0(&self) -> f32 {
        self.position.y0
    }

    /// Text content, if this is a text unit.
    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            UnitBody::Text(t) => Some(t),
            UnitBody::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageUnit> {
        match &self.body {
            UnitBody::Image(img) => Some(img),
            UnitBody::Text(_) => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self.body, UnitBody::Image(_))
    }

    pub fn is_recovered(&self) -> bool {
        matches!(
            &self.body,
            UnitBody::Image(ImageUnit {
                origin: ImageOrigin::Recovered,
                ..
            })
        )
    }
}

/// Variant of a unit after segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Text,
    Image,
    Header,
}

/// Stable sort of units into reading order.
pub fn sort_reading_order(units: &mut [ContentUnit]) {
    units.sort_by(|a, b| a.position.reading_cmp(&b.position));
}

// ── Document stream ──────────────────────────────────────────────────────

/// The whole document's units in reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentStream {
    units: Vec<ContentUnit>,
}

impl DocumentStream {
    /// Build a stream, sorting `units` into reading order.
    pub fn from_units(mut units: Vec<ContentUnit>) -> Self {
        sort_reading_order(&mut units);
        Self { units }
    }

    pub fn units(&self) -> &[ContentUnit] {
        &self.units
    }

    pub fn into_units(self) -> Vec<ContentUnit> {
        self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContentUnit> {
        self.units.iter()
    }

    /// Append units and restore reading order (insert-then-resort).
    pub(crate) fn insert_and_resort(&mut self, extra: Vec<ContentUnit>) {
        if extra.is_empty() {
            return;
        }
        self.units.extend(extra);
        sort_reading_order(&mut self.units);
    }
}

// ── Segmentation results ─────────────────────────────────────────────────

/// A unit together with the section it was assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedUnit {
    pub unit: ContentUnit,
    pub section_id: String,
    /// `true` when this text unit was detected as the section's header.
    pub promoted: bool,
}

impl SegmentedUnit {
    pub fn kind(&self) -> UnitKind {
        match (&self.unit.body, self.promoted) {
            (UnitBody::Text(_), true) => UnitKind::Header,
            (UnitBody::Text(_), false) => UnitKind::Text,
            (UnitBody::Image(_), _) => UnitKind::Image,
        }
    }

    pub fn is_header(&self) -> bool {
        self.kind() == UnitKind::Header
    }
}

/// One section's units, in stream order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub units: Vec<SegmentedUnit>,
}

/// `section_id → units`, with keys kept in first-encounter order.
///
/// A section id seen again later in the stream appends to its existing entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionMap {
    sections: Vec<Section>,
    index: HashMap<String, usize>,
}

impl SectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `units` to section `id`, creating the entry on first sight.
    pub fn extend_section(&mut self, id: &str, units: Vec<SegmentedUnit>) {
        if units.is_empty() {
            return;
        }
        match self.index.get(id) {
            Some(&i) => self.sections[i].units.extend(units),
            None => {
                self.index.insert(id.to_string(), self.sections.len());
                self.sections.push(Section {
                    id: id.to_string(),
                    units,
                });
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&[SegmentedUnit]> {
        self.index
            .get(id)
            .map(|&i| self.sections[i].units.as_slice())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Section ids in first-encounter order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Units across all sections.
    pub fn total_units(&self) -> usize {
        self.sections.iter().map(|s| s.units.len()).sum()
    }

    pub fn into_sections(self) -> Vec<Section> {
        self.sections
    }
}

impl Serialize for SectionMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in &self.sections {
            map.serialize_entry(&section.id, &section.units)?;
        }
        map.end()
    }
}

/// `page → section_id` forward-filled from TOC start pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageSectionMap(BTreeMap<u32, String>);

impl PageSectionMap {
    pub(crate) fn insert(&mut self, page: u32, section_id: String) {
        self.0.insert(page, section_id);
    }

    pub fn get(&self, page: u32) -> Option<&str> {
        self.0.get(&page).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.0.iter().map(|(p, s)| (*p, s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest page the map covers.
    pub fn last_page(&self) -> Option<u32> {
        self.0.keys().next_back().copied()
    }
}

// ── serde helpers ────────────────────────────────────────────────────────

pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod base64_opt {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_at(page: u32, y: f32, s: &str) -> ContentUnit {
        ContentUnit::text(Position::from_bbox(page, BBox::new(0.0, y, 100.0, y + 10.0)), s)
    }

    fn seg(unit: ContentUnit, id: &str) -> SegmentedUnit {
        SegmentedUnit {
            unit,
            section_id: id.to_string(),
            promoted: false,
        }
    }

    #[test]
    fn reading_order_page_then_y() {
        let stream = DocumentStream::from_units(vec![
            text_at(2, 10.0, "c"),
            text_at(1, 300.0, "b"),
            text_at(1, 100.0, "a"),
        ]);
        let texts: Vec<_> = stream.iter().filter_map(|u| u.as_text()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn reading_order_is_stable_on_ties() {
        let stream = DocumentStream::from_units(vec![
            text_at(1, 50.0, "first"),
            text_at(1, 50.0, "second"),
            text_at(1, 50.0, "third"),
        ]);
        let texts: Vec<_> = stream.iter().filter_map(|u| u.as_text()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn section_map_keeps_first_encounter_order() {
        let mut map = SectionMap::new();
        map.extend_section("2.1", vec![seg(text_at(1, 0.0, "x"), "2.1")]);
        map.extend_section("_preamble", vec![seg(text_at(1, 5.0, "y"), "_preamble")]);
        map.extend_section("2.1", vec![seg(text_at(2, 0.0, "z"), "2.1")]);

        assert_eq!(map.ids().collect::<Vec<_>>(), vec!["2.1", "_preamble"]);
        assert_eq!(map.get("2.1").map(|u| u.len()), Some(2));
        assert_eq!(map.total_units(), 3);
    }

    #[test]
    fn section_map_ignores_empty_accumulators() {
        let mut map = SectionMap::new();
        map.extend_section("1", Vec::new());
        assert!(map.is_empty());
        assert!(!map.contains("1"));
    }

    #[test]
    fn section_map_serialises_as_ordered_object() {
        let mut map = SectionMap::new();
        map.extend_section("3", vec![seg(text_at(1, 0.0, "a"), "3")]);
        map.extend_section("1", vec![seg(text_at(1, 9.0, "b"), "1")]);
        let json = serde_json::to_string(&map).unwrap();
        let three = json.find("\"3\"").unwrap();
        let one = json.find("\"1\"").unwrap();
        assert!(three < one, "got: {json}");
    }

    #[test]
    fn image_bytes_serialise_as_base64() {
        let unit = ContentUnit::image(
            Position::from_bbox(1, BBox::new(0.0, 0.0, 1.0, 1.0)),
            ImageUnit {
                data: vec![1, 2, 3],
                format: ImageFormat::Png,
                origin: ImageOrigin::Recovered,
            },
        );
        let json = serde_json::to_string(&unit).unwrap();
        assert!(json.contains("AQID"), "got: {json}");
        let back: ContentUnit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, unit);
        assert!(back.is_recovered());
    }

    #[test]
    fn promoted_text_reports_header_kind() {
        let mut s = seg(text_at(1, 0.0, "2.1 Intro"), "2.1");
        assert_eq!(s.kind(), UnitKind::Text);
        s.promoted = true;
        assert_eq!(s.kind(), UnitKind::Header);
    }

    #[test]
    fn bbox_union() {
        let a = BBox::new(10.0, 10.0, 20.0, 20.0);
        let b = BBox::new(5.0, 15.0, 30.0, 18.0);
        assert_eq!(a.union(&b), BBox::new(5.0, 10.0, 30.0, 20.0));
    }
}

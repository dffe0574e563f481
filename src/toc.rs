//! TOC indexer: flatten a hierarchical table of contents into page-sorted
//! anchors plus the lookup maps used for segmentation and section lookup.
//!
//! The TOC artifact is JSON, either `{"toc_tree": [...]}` or a bare array of
//! nodes. Each node is `{title, page, level, children?}`. Input is validated
//! on load; anything malformed is a [`TocLoadError`] and never silently
//! defaulted.

use crate::error::TocLoadError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Leading dotted numeral followed by whitespace, e.g. `"2.2.2 "`.
static ID_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\s+(.*)$").expect("static regex"));

/// One node of the hierarchical TOC as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocNode {
    pub title: String,
    pub page: i64,
    pub level: i64,
    #[serde(default)]
    pub children: Vec<TocNode>,
}

#[derive(Deserialize)]
struct WrappedToc {
    toc_tree: Vec<TocNode>,
}

/// A TOC entry reduced to what segmentation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocAnchor {
    pub title: String,
    pub page: u32,
    pub level: i64,
    pub section_id: String,
}

/// Section id of a TOC title: its leading dotted numeral, or the whole title.
pub fn section_id_of(title: &str) -> String {
    match ID_PREFIX.captures(title) {
        Some(caps) => caps[1].to_string(),
        None => title.to_string(),
    }
}

/// Title with its numeral prefix removed, if it has one.
fn core_title(title: &str) -> Option<&str> {
    ID_PREFIX
        .captures(title)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// Flattened, validated TOC.
#[derive(Debug, Clone, Default)]
pub struct TocIndex {
    anchors: Vec<TocAnchor>,
    ids: HashSet<String>,
    by_title: HashMap<String, String>,
    by_core_title: HashMap<String, String>,
}

impl TocIndex {
    /// Read and index a TOC file.
    pub fn load(path: &Path) -> Result<Self, TocLoadError> {
        let raw = std::fs::read_to_string(path).map_err(|source| TocLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_json_str(&raw)?;
        debug!(
            "Loaded TOC '{}': {} anchors",
            path.display(),
            index.anchors.len()
        );
        Ok(index)
    }

    /// Parse and index a TOC from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self, TocLoadError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let nodes = match value {
            serde_json::Value::Array(_) => serde_json::from_value::<Vec<TocNode>>(value)?,
            serde_json::Value::Object(_) => {
                serde_json::from_value::<WrappedToc>(value)?.toc_tree
            }
            _ => {
                return Err(TocLoadError::Invalid {
                    reason: "expected an object with 'toc_tree' or an array of entries".into(),
                })
            }
        };
        Self::from_nodes(&nodes)
    }

    /// Flatten and index already-parsed nodes.
    pub fn from_nodes(nodes: &[TocNode]) -> Result<Self, TocLoadError> {
        let mut anchors = Vec::new();
        flatten(nodes, &mut anchors)?;
        if anchors.is_empty() {
            return Err(TocLoadError::Invalid {
                reason: "TOC has no entries".into(),
            });
        }
        // Stable: entries on the same page keep document order.
        anchors.sort_by_key(|a| a.page);

        let mut index = TocIndex {
            anchors: Vec::with_capacity(anchors.len()),
            ..TocIndex::default()
        };
        for anchor in anchors {
            index.ids.insert(anchor.section_id.clone());
            if let Some(core) = core_title(&anchor.title) {
                index
                    .by_core_title
                    .insert(core.to_string(), anchor.section_id.clone());
            }
            index
                .by_title
                .insert(anchor.title.clone(), anchor.section_id.clone());
            index.anchors.push(anchor);
        }
        Ok(index)
    }

    /// Anchors sorted by page, ascending.
    pub fn anchors(&self) -> &[TocAnchor] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Exact membership test for a section id.
    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Look a title up in the full-title map, then the stripped-title map.
    pub fn section_for_title(&self, title: &str) -> Option<&str> {
        let title = title.trim();
        self.by_title
            .get(title)
            .or_else(|| self.by_core_title.get(title))
            .map(String::as_str)
    }

    /// Resolve a user query to a section id: an id, a full title or a
    /// title without its numeral prefix.
    pub fn resolve(&self, query: &str) -> Option<&str> {
        let query = query.trim();
        if let Some(id) = self.ids.get(query) {
            return Some(id.as_str());
        }
        self.section_for_title(query)
    }

    /// Title of the first anchor carrying `id`.
    pub fn title_of(&self, id: &str) -> Option<&str> {
        self.anchors
            .iter()
            .find(|a| a.section_id == id)
            .map(|a| a.title.as_str())
    }

    /// Highest start page in the TOC.
    pub fn max_page(&self) -> u32 {
        self.anchors.last().map(|a| a.page).unwrap_or(0)
    }
}

fn flatten(nodes: &[TocNode], out: &mut Vec<TocAnchor>) -> Result<(), TocLoadError> {
    for node in nodes {
        let title = node.title.trim();
        if title.is_empty() {
            return Err(TocLoadError::Invalid {
                reason: format!("entry on page {} has an empty title", node.page),
            });
        }
        let page = u32::try_from(node.page)
            .ok()
            .filter(|&p| p >= 1)
            .ok_or_else(|| TocLoadError::Invalid {
                reason: format!("entry '{title}' has page {} (must be ≥ 1)", node.page),
            })?;
        out.push(TocAnchor {
            title: title.to_string(),
            page,
            level: node.level,
            section_id: section_id_of(title),
        });
        flatten(&node.children, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "toc_tree": [
            {"title": "1 Introduction", "page": 3, "level": 1, "children": []},
            {"title": "2 Getting Started", "page": 5, "level": 1, "children": [
                {"title": "2.2 Building", "page": 8, "level": 2, "children": [
                    {"title": "2.2.2 Compiling BHy2CLI", "page": 9, "level": 3}
                ]},
                {"title": "2.1 Requirements", "page": 5, "level": 2}
            ]},
            {"title": "Appendix", "page": 40, "level": 1}
        ]
    }"#;

    #[test]
    fn flattens_and_sorts_by_page() {
        let toc = TocIndex::from_json_str(SAMPLE).unwrap();
        let pages: Vec<u32> = toc.anchors().iter().map(|a| a.page).collect();
        assert_eq!(pages, vec![3, 5, 5, 8, 9, 40]);
        // same page keeps document order
        assert_eq!(toc.anchors()[1].section_id, "2");
        assert_eq!(toc.anchors()[2].section_id, "2.1");
    }

    #[test]
    fn section_id_from_prefix_or_title() {
        assert_eq!(section_id_of("2.2.2 Compiling BHy2CLI"), "2.2.2");
        assert_eq!(section_id_of("Appendix"), "Appendix");
        assert_eq!(section_id_of("2.2.2Compiling"), "2.2.2Compiling");
    }

    #[test]
    fn lookup_maps() {
        let toc = TocIndex::from_json_str(SAMPLE).unwrap();
        assert_eq!(toc.section_for_title("2.2.2 Compiling BHy2CLI"), Some("2.2.2"));
        assert_eq!(toc.section_for_title("Compiling BHy2CLI"), Some("2.2.2"));
        assert_eq!(toc.section_for_title("Appendix"), Some("Appendix"));
        assert_eq!(toc.section_for_title("Nope"), None);
        assert_eq!(toc.resolve("2.1"), Some("2.1"));
        assert_eq!(toc.resolve("Requirements"), Some("2.1"));
    }

    #[test]
    fn membership_is_exact() {
        let toc = TocIndex::from_json_str(SAMPLE).unwrap();
        assert!(toc.contains_id("2.2.2"));
        assert!(!toc.contains_id("2.2.2 Compiling BHy2CLI"));
        assert!(!toc.contains_id("2.2.3"));
        assert!(!toc.contains_id("2.2.2.1"));
    }

    #[test]
    fn bare_array_is_accepted() {
        let toc =
            TocIndex::from_json_str(r#"[{"title": "1 Intro", "page": 1, "level": 1}]"#).unwrap();
        assert_eq!(toc.len(), 1);
        assert_eq!(toc.max_page(), 1);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = TocIndex::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, TocLoadError::Parse(_)));
    }

    #[test]
    fn missing_field_is_parse_error() {
        let err = TocIndex::from_json_str(r#"{"toc_tree": [{"title": "1 Intro"}]}"#).unwrap_err();
        assert!(matches!(err, TocLoadError::Parse(_)));
    }

    #[test]
    fn zero_page_is_invalid() {
        let err = TocIndex::from_json_str(r#"[{"title": "1 Intro", "page": 0, "level": 1}]"#)
            .unwrap_err();
        assert!(matches!(err, TocLoadError::Invalid { .. }));
    }

    #[test]
    fn empty_toc_is_invalid() {
        let err = TocIndex::from_json_str(r#"{"toc_tree": []}"#).unwrap_err();
        assert!(matches!(err, TocLoadError::Invalid { .. }));
    }

    #[test]
    fn scalar_document_is_invalid() {
        let err = TocIndex::from_json_str("42").unwrap_err();
        assert!(matches!(err, TocLoadError::Invalid { .. }));
    }

    #[test]
    fn empty_title_is_invalid() {
        let err = TocIndex::from_json_str(r#"[{"title": "  ", "page": 2, "level": 1}]"#)
            .unwrap_err();
        assert!(matches!(err, TocLoadError::Invalid { .. }));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = TocIndex::load(Path::new("/nonexistent/toc.json")).unwrap_err();
        assert!(matches!(err, TocLoadError::Io { .. }));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toc.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let toc = TocIndex::load(&path).unwrap();
        assert_eq!(toc.title_of("2.2"), Some("2.2 Building"));
        assert_eq!(toc.max_page(), 40);
    }
}

//! Section segmenter: a linear scan over the reading-order stream that
//! splits it into TOC sections.
//!
//! ## Header detection
//!
//! A text unit is a section header only if every stage of a fixed cascade
//! lets it through. Stages run left to right over a [`HeaderCandidate`] and
//! each returns a [`StageVerdict`]; the first `Accept` or `Reject` wins.
//!
//! | Stage            | Rejects when                                         |
//! |------------------|------------------------------------------------------|
//! | `length_limit`   | trimmed text is longer than `max_header_chars`       |
//! | `dot_leader`     | text ends in a TOC dot leader (`..... 30`)           |
//! | `numeral_prefix` | text does not start with `N(.N)*` + space + non-space|
//! | `toc_membership` | the numeral is not a section id in the TOC (exact)   |
//!
//! `toc_membership` is the only stage that can accept. A numeral-prefixed
//! line that fails membership stays body text; that is not an error.
//!
//! ## State machine
//!
//! `current = "_preamble"`; each detected header flushes the accumulator into
//! the [`SectionMap`] and switches `current`. The header unit itself opens
//! the new section. End of stream flushes the last accumulator.

use crate::config::Heuristics;
use crate::model::{DocumentStream, SectionMap, SegmentedUnit, PREAMBLE_SECTION};
use crate::toc::TocIndex;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

static DOT_LEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\.+\s*\d+$").expect("static regex"));

static NUMERAL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\s+\S").expect("static regex"));

/// Outcome of one detection stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageVerdict {
    /// The unit is a header for this section id.
    Accept(String),
    /// The unit is definitely not a header.
    Reject,
    /// No opinion; ask the next stage.
    Continue,
}

/// A text unit prepared for header detection.
#[derive(Debug, Clone)]
pub struct HeaderCandidate<'t> {
    pub trimmed: &'t str,
    /// Captured dotted numeral, if the text starts with one.
    pub numeral: Option<&'t str>,
}

impl<'t> HeaderCandidate<'t> {
    pub fn new(text: &'t str) -> Self {
        let trimmed = text.trim();
        let numeral = NUMERAL_PREFIX
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        Self { trimmed, numeral }
    }
}

/// Shared inputs of the detection stages.
pub struct HeaderRules<'a> {
    pub toc: &'a TocIndex,
    pub max_chars: usize,
}

type Stage = fn(&HeaderCandidate<'_>, &HeaderRules<'_>) -> StageVerdict;

/// The detection cascade, in evaluation order.
pub const STAGES: &[(&str, Stage)] = &[
    ("length_limit", length_limit),
    ("dot_leader", dot_leader),
    ("numeral_prefix", numeral_prefix),
    ("toc_membership", toc_membership),
];

pub fn length_limit(c: &HeaderCandidate<'_>, rules: &HeaderRules<'_>) -> StageVerdict {
    if c.trimmed.chars().count() > rules.max_chars {
        StageVerdict::Reject
    } else {
        StageVerdict::Continue
    }
}

pub fn dot_leader(c: &HeaderCandidate<'_>, _rules: &HeaderRules<'_>) -> StageVerdict {
    if DOT_LEADER.is_match(c.trimmed) {
        StageVerdict::Reject
    } else {
        StageVerdict::Continue
    }
}

pub fn numeral_prefix(c: &HeaderCandidate<'_>, _rules: &HeaderRules<'_>) -> StageVerdict {
    match c.numeral {
        Some(_) => StageVerdict::Continue,
        None => StageVerdict::Reject,
    }
}

pub fn toc_membership(c: &HeaderCandidate<'_>, rules: &HeaderRules<'_>) -> StageVerdict {
    match c.numeral {
        Some(id) if rules.toc.contains_id(id) => StageVerdict::Accept(id.to_string()),
        _ => StageVerdict::Reject,
    }
}

/// Run the cascade. Returns the deciding stage and its verdict.
pub fn evaluate(text: &str, rules: &HeaderRules<'_>) -> (&'static str, StageVerdict) {
    let candidate = HeaderCandidate::new(text);
    for (name, stage) in STAGES {
        match stage(&candidate, rules) {
            StageVerdict::Continue => continue,
            verdict => return (name, verdict),
        }
    }
    // Only reachable if the last stage abstains.
    ("end", StageVerdict::Reject)
}

/// Section id of `text` if it is a header, else `None`.
pub fn detect_header(text: &str, rules: &HeaderRules<'_>) -> Option<String> {
    match evaluate(text, rules) {
        (_, StageVerdict::Accept(id)) => Some(id),
        ("toc_membership", _) => {
            debug!(
                "Numeral-prefixed line kept as body text (id not in TOC): {:?}",
                truncate(text.trim(), 60)
            );
            None
        }
        _ => None,
    }
}

/// Split `stream` into sections keyed by the TOC ids of detected headers.
///
/// Every unit lands in exactly one section, in stream order.
pub fn segment(stream: &DocumentStream, toc: &TocIndex, heuristics: &Heuristics) -> SectionMap {
    let rules = HeaderRules {
        toc,
        max_chars: heuristics.max_header_chars,
    };

    let mut sections = SectionMap::new();
    let mut current = PREAMBLE_SECTION.to_string();
    let mut acc: Vec<SegmentedUnit> = Vec::new();
    let mut headers = 0usize;

    for unit in stream.iter() {
        let detected = unit.as_text().and_then(|t| detect_header(t, &rules));
        let promoted = detected.is_some();

        if let Some(id) = detected {
            sections.extend_section(&current, std::mem::take(&mut acc));
            debug!(
                "Section {} starts at page {} y={:.1}",
                id,
                unit.page(),
                unit.y0()
            );
            current = id;
            headers += 1;
        }

        acc.push(SegmentedUnit {
            unit: unit.clone(),
            section_id: current.clone(),
            promoted,
        });
    }
    sections.extend_section(&current, acc);

    info!(
        "Segmented {} units into {} sections ({} headers)",
        stream.len(),
        sections.len(),
        headers
    );
    sections
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

//! Text cleanup for the page-granular path.
//!
//! Two entry points, both pure `&str → String`:
//!
//! - [`clean_page_text`]: page-local pass applied to text-path pages. Drops
//!   every line containing a configured boilerplate substring.
//! - [`clean_section_buffer`]: applied once to each joined section buffer.
//!   Runs a fixed sequence of small rules.
//!
//! ## Rule Order (section buffers)
//!
//! Line endings are normalised first so later line-based rules see `\n`
//! only. Token and revision-stamp removal run before whitespace trimming so
//! the blanks they leave behind are trimmed and collapsed too.

use once_cell::sync::Lazy;
use regex::Regex;

/// Drop lines that contain any of `boilerplate`.
pub fn clean_page_text(text: &str, boilerplate: &[String]) -> String {
    text.split('\n')
        .filter(|line| !boilerplate.iter().any(|b| line.contains(b.as_str())))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Clean a joined section buffer.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Remove configured tokens (e.g. `[TBD]`)
/// 3. Remove revision stamps (`Revision_2.6_...` to end of line)
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 5. Trim trailing whitespace per line
/// 6. Collapse 3+ consecutive blank lines down to 1
/// 7. Ensure the buffer ends with exactly one newline
pub fn clean_section_buffer(input: &str, tokens: &[String]) -> String {
    let s = normalise_line_endings(input);
    let s = remove_tokens(&s, tokens);
    let s = remove_revision_stamps(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove tokens ────────────────────────────────────────────────────

fn remove_tokens(input: &str, tokens: &[String]) -> String {
    tokens
        .iter()
        .filter(|t| !t.is_empty())
        .fold(input.to_string(), |acc, t| acc.replace(t.as_str(), ""))
}

// ── Rule 3: Remove revision stamps ───────────────────────────────────────────

static RE_REVISION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Revision_\d+\.\d+_.*").expect("static regex"));

fn remove_revision_stamps(input: &str) -> String {
    RE_REVISION.replace_all(input, "").into_owned()
}

// ── Rule 4: Strip invisible characters ───────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{00AD}'))
        .collect()
}

// ── Rule 5: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 6: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Rule 7: Single final newline ─────────────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

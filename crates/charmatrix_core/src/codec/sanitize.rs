//! Name and free-text cleaning shared by every exporter.
//!
//! Both functions are pure and total.

use once_cell::sync::Lazy;
use regex::Regex;

static MARKUP_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^<>]*>").expect("valid markup tag regex"));
static CONTROL_WS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\r\n\t]+").expect("valid control whitespace regex"));
static LINE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\r\n]+").expect("valid line break regex"));

/// Format-specific escape written in place of line breaks.
pub const LINE_BREAK_ESCAPE: &str = "^n";

/// Cleans a label: strips markup tags, doubles single quotes, collapses
/// CR/LF/TAB runs into one space and trims.
pub fn clean_name(value: &str) -> String {
    let without_tags = MARKUP_TAG_RE.replace_all(value, "");
    let escaped = without_tags.replace('\'', "''");
    let collapsed = CONTROL_WS_RE.replace_all(&escaped, " ");
    collapsed.trim().to_string()
}

/// Cleans free text: doubles single quotes, trims, and replaces CR/LF runs
/// with the literal `^n` escape.
pub fn clean_text(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    let trimmed = escaped.trim();
    LINE_BREAK_RE
        .replace_all(trimmed, LINE_BREAK_ESCAPE)
        .into_owned()
}

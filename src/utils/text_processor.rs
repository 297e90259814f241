use regex::Regex;
use std::sync::LazyLock;

/// Explicit paragraph delimiter inserted during extraction.
pub const PARA_MARKER: &str = "[PARA]";

/// Leading tag on text that came out of OCR.
pub const OCR_MARKER: &str = "[OCR_PROCESSED]";

static BLANK_LINE_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static BRACKETED_PAGE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\w+\s+\d+\]").unwrap());
static PAGE_X_OF_Y: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Page \d+ of \d+").unwrap());
static WRAPPED_HYPHEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([a-z])- ([a-z])").unwrap());

/// Normalize the raw output of any extraction tier.
///
/// Blank-line gaps become paragraph markers, every other line break collapses to a
/// space, running page labels are stripped and line-wrap hyphenation is repaired.
pub fn clean_extracted_text(raw: &str) -> String {
    let paragraph_marker = format!(" {} ", PARA_MARKER);
    let text = BLANK_LINE_GAP.replace_all(raw, paragraph_marker.as_str());
    let text = text.replace('\n', " ");

    let text = BRACKETED_PAGE_LABEL.replace_all(&text, "");
    let text = PAGE_X_OF_Y.replace_all(&text, "");
    let text = WHITESPACE_RUN.replace_all(&text, " ");

    let text = WRAPPED_HYPHEN.replace_all(text.trim(), "$1$2");

    text.into_owned()
}

/// Convert blank-line gaps into paragraph markers without touching anything else.
pub fn mark_paragraphs(text: &str) -> String {
    let paragraph_marker = format!(" {} ", PARA_MARKER);
    BLANK_LINE_GAP
        .replace_all(text, paragraph_marker.as_str())
        .into_owned()
}

/// Collapse all whitespace runs to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
}

/// Prefix recognized text with the OCR marker; empty text stays empty.
pub fn mark_ocr(text: &str) -> String {
    let body = text.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!("{} {}", OCR_MARKER, body)
    }
}

/// Split off a leading OCR marker, reporting whether one was present.
pub fn strip_ocr_marker(text: &str) -> (bool, &str) {
    match text.trim_start().strip_prefix(OCR_MARKER) {
        Some(rest) => (true, rest.trim()),
        None => (false, text),
    }
}

/// Number of meaningful characters, the unit every yield threshold is measured in.
pub fn yield_chars(text: &str) -> usize {
    text.trim().chars().count()
}

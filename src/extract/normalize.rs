//! Extraction noise cleanup
//!
//! OCR output is full of blank lines and runs of spaces. Collapse them and
//! keep the head and tail of long documents, where letterheads, dates and
//! totals usually are.

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker placed where the middle of a long text was cut out
pub const ELLIPSIS: &str = "...";

static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid pattern"));
static MULTI_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").expect("valid pattern"));
static MIXED_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\n ]{2,}").expect("valid pattern"));

/// Collapse whitespace runs, then cut to `max_chars` keeping head and tail
pub fn normalize(text: &str, max_chars: usize) -> String {
    let text = text.replace("\r\n", "\n");
    let text = MULTI_SPACE.replace_all(&text, " ");
    let text = MULTI_NEWLINE.replace_all(&text, "\n");
    let text = MIXED_BREAKS.replace_all(&text, "\n");

    truncate_middle(&text, max_chars)
}

/// Replace the middle of `text` with an ellipsis if it exceeds `max_chars`
///
/// Counts characters, not bytes. Each kept half is `max_chars / 2` long.
pub fn truncate_middle(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let half = max_chars / 2;
    let head: String = text.chars().take(half).collect();
    let tail: String = text.chars().skip(total - half).collect();
    format!("{}{}{}", head, ELLIPSIS, tail)
}

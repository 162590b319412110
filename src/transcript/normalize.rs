//! Text normalization for enhancement results.
//!
//! The remote service occasionally returns HTML-entity residue, stuck-key
//! character runs, and ragged whitespace. [`normalize`] cleans a raw result
//! into display-ready text; [`is_degenerate`] classifies results that carry
//! no usable content and should be discarded by the caller.

use crate::defaults::{MAX_CHAR_RUN, MIN_MEANINGFUL_CHARS};
use once_cell::sync::Lazy;
use regex::Regex;

/// Escaped-tag residue such as `&lt;x&gt;` left over from upstream escaping.
static TAG_RESIDUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&lt;[^&]*?&gt;").expect("hardcoded regex"));

/// Well-formed HTML entities, named (`&amp;`) or numeric (`&#39;`).
static HTML_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#?[A-Za-z0-9]+;").expect("hardcoded regex"));

/// Cleans a raw enhancement result into display-ready text.
///
/// Removes entity artifacts, collapses any run of one character repeated
/// more than three times to a single occurrence, and collapses whitespace
/// runs to single spaces. Idempotent: `normalize(normalize(x)) ==
/// normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let stripped = TAG_RESIDUE.replace_all(raw, " ");
    let stripped = HTML_ENTITY.replace_all(&stripped, " ");
    let collapsed = collapse_char_runs(&stripped);
    collapsed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when a normalized result carries no usable content: shorter than
/// three characters, or one character repeated.
pub fn is_degenerate(normalized: &str) -> bool {
    let mut chars = normalized.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return true,
    };
    if normalized.chars().count() < MIN_MEANINGFUL_CHARS {
        return true;
    }
    chars.all(|c| c == first)
}

/// Collapses any run of one character longer than [`MAX_CHAR_RUN`] to a
/// single occurrence. Shorter runs ("...", doubled letters) are preserved.
fn collapse_char_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run_char: Option<char> = None;
    let mut run_len = 0usize;

    for ch in text.chars() {
        if run_char == Some(ch) {
            run_len += 1;
        } else {
            flush_run(&mut out, run_char, run_len);
            run_char = Some(ch);
            run_len = 1;
        }
    }
    flush_run(&mut out, run_char, run_len);
    out
}

fn flush_run(out: &mut String, run_char: Option<char>, run_len: usize) {
    if let Some(ch) = run_char {
        let emit = if run_len > MAX_CHAR_RUN { 1 } else { run_len };
        for _ in 0..emit {
            out.push(ch);
        }
    }
}

//! Name-based edits on SQL text.
//!
//! These helpers work on the raw query string, not on a parsed tree: they are
//! not alias- or scope-aware and will touch every textual occurrence their
//! pattern matches.

use regex::{Regex, RegexBuilder};

/// Column name, optionally qualified (`T1.salary`), as a whole word.
fn qualified_word(name: &str) -> String {
    format!(r"\b(?:\w+\.)?{}\b", regex::escape(name))
}

fn case_insensitive(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .ok()
}

/// True when `word` occurs in `text` as a whole word, ignoring case.
pub fn contains_word(text: &str, word: &str) -> bool {
    case_insensitive(&format!(r"\b{}\b", regex::escape(word)))
        .is_some_and(|re| re.is_match(text))
}

/// Replace every whole-word occurrence of `old` with `new`, ignoring case.
pub fn replace_word(text: &str, old: &str, new: &str) -> String {
    match case_insensitive(&format!(r"\b{}\b", regex::escape(old))) {
        Some(re) => re.replace_all(text, regex::NoExpand(new)).into_owned(),
        None => text.to_string(),
    }
}

/// Byte ranges of every `SELECT ... FROM` projection segment.
fn select_segments(text: &str) -> Vec<std::ops::Range<usize>> {
    let Some(re) = case_insensitive(r"\bSELECT\b(.+?)\bFROM\b") else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.range()))
        .collect()
}

/// Wrap bare occurrences of `column` in every projection with `AVG(...)`.
///
/// Set-operation branches and nested selects each have their own projection.
/// Occurrences already inside an aggregate call are left alone. Returns
/// `None` when nothing was wrapped.
pub fn wrap_with_avg(text: &str, column: &str) -> Option<String> {
    let word = case_insensitive(&qualified_word(column))?;
    let open_aggregate =
        case_insensitive(r"\b(?:AVG|COUNT|SUM|MAX|MIN)\s*\(\s*(?:DISTINCT\s+)?$")?;

    let mut rewritten = String::with_capacity(text.len() + 8);
    let mut last = 0;
    for segment in select_segments(text) {
        let projection = &text[segment.clone()];
        for m in word.find_iter(projection) {
            if open_aggregate.is_match(&projection[..m.start()]) {
                continue;
            }
            rewritten.push_str(&text[last..segment.start + m.start()]);
            rewritten.push_str("AVG(");
            rewritten.push_str(m.as_str());
            rewritten.push(')');
            last = segment.start + m.end();
        }
    }
    if last == 0 {
        return None;
    }
    rewritten.push_str(&text[last..]);
    Some(rewritten)
}

/// Insert `column` at the front of the first select list, after any `DISTINCT`.
pub fn add_to_select(text: &str, column: &str) -> Option<String> {
    let re = case_insensitive(r"\b(SELECT)\s+((?:DISTINCT\s+)?)")?;
    let caps = re.captures(text)?;
    let whole = caps.get(0)?;
    let keyword = caps.get(1).map_or("SELECT", |m| m.as_str());
    let distinct = caps.get(2).map_or("", |m| m.as_str());
    Some(format!(
        "{}{keyword} {distinct}{column}, {}",
        &text[..whole.start()],
        &text[whole.end()..]
    ))
}

/// Remove the first `AVG(column)` / `COUNT(column)` wrapper found in a projection.
///
/// The (possibly qualified) column text is kept. Returns `None` when no
/// projection contains such a wrapper.
pub fn strip_aggregate_wrapper(text: &str, column: &str) -> Option<String> {
    let re = case_insensitive(&format!(
        r"\b(?:AVG|COUNT)\s*\(\s*((?:\w+\.)?{})\s*\)",
        regex::escape(column)
    ))?;
    for segment in select_segments(text) {
        let projection = &text[segment.clone()];
        let Some(caps) = re.captures(projection) else {
            continue;
        };
        let (whole, inner) = (caps.get(0)?, caps.get(1)?);
        return Some(format!(
            "{}{}{}",
            &text[..segment.start + whole.start()],
            inner.as_str(),
            &text[segment.start + whole.end()..]
        ));
    }
    None
}

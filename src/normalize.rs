//! Column label normalization.
//!
//! Raw labels such as `"Ticket Price (Cr)"` become canonical identifiers
//! (`ticket_price_cr`): lowercase ASCII letters, digits, and underscores only.

use std::{collections::HashSet, sync::OnceLock};

use log::warn;
use regex::Regex;

const EMPTY_LABEL_NAME: &str = "column";

fn separator_regex() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"[^0-9A-Za-z_]+").expect("separator pattern compiles"))
}

/// Collapses each run of whitespace or punctuation into a single underscore and lowercases.
///
/// Separators at either end of the label are dropped rather than kept as
/// leading or trailing underscores. Underscores present in the input are kept
/// verbatim, which makes the function idempotent on canonical identifiers.
pub fn normalize_column_name(name: &str) -> String {
    let joined = separator_regex()
        .split(name)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if joined.is_empty() {
        EMPTY_LABEL_NAME.to_string()
    } else {
        joined.to_ascii_lowercase()
    }
}

pub fn normalize_headers(headers: &[String]) -> Vec<String> {
    headers.iter().map(|h| normalize_column_name(h)).collect()
}

/// Suffixes later duplicates with `_2`, `_3`, ... so every column stays addressable.
pub fn disambiguate_headers(headers: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = headers.iter().cloned().collect();
    let mut seen: HashSet<String> = HashSet::with_capacity(headers.len());
    let mut output = Vec::with_capacity(headers.len());
    for header in headers {
        if seen.insert(header.clone()) {
            output.push(header);
            continue;
        }
        let mut suffix = 2usize;
        let renamed = loop {
            let candidate = format!("{header}_{suffix}");
            if !taken.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        warn!("Column '{header}' appears more than once; renaming duplicate to '{renamed}'");
        taken.insert(renamed.clone());
        output.push(renamed);
    }
    output
}

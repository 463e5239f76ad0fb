//! Column reference extraction
//!
//! Classification is lexical, not syntactic: an identifier counts as being
//! inside an aggregate when it falls within `<AGG>(...)` up to the first
//! closing parenthesis. Nested parentheses inside an aggregate call are
//! therefore misclassified; this approximation is intentional.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::lexer::{self, IDENTIFIER};
use crate::error::Span;

/// Aggregate functions recognised by the analyzer
pub const AGGREGATE_FUNCTIONS: [&str; 5] = ["COUNT", "SUM", "AVG", "MIN", "MAX"];

static AGGREGATE_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(COUNT|SUM|AVG|MIN|MAX)\s*\([^)]*\)").unwrap());

static AGGREGATE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(COUNT|SUM|AVG|MIN|MAX)\s*\(").unwrap());

/// A column identifier found in a clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub name: String,
    pub inside_aggregate: bool,
    /// Table name or alias written before the column (`e.salary`)
    pub qualifier: Option<String>,
    /// Location relative to the text the reference was extracted from
    pub span: Span,
}

/// Whether `text` contains a call to one of the aggregate functions
pub fn has_aggregate_call(text: &str) -> bool {
    AGGREGATE_OPEN.is_match(&lexer::mask_literals(text))
}

/// Location of the first aggregate call in `text`
pub fn first_aggregate_call(text: &str) -> Option<Span> {
    AGGREGATE_OPEN
        .find(&lexer::mask_literals(text))
        .map(|m| Span::new(m.start(), m.len()))
}

/// Every column reference in a clause, whether or not it sits inside an aggregate
pub fn extract_all(text: &str) -> Vec<ColumnRef> {
    let masked = lexer::mask_literals(text);
    let aggregates: Vec<Range<usize>> = AGGREGATE_CALL
        .find_iter(&masked)
        .map(|m| m.range())
        .collect();

    IDENTIFIER
        .find_iter(&masked)
        .filter_map(|m| {
            let word = m.as_str();
            if lexer::is_keyword(word) {
                return None;
            }

            let after = masked[m.end()..].trim_start();
            // function names and qualifiers are not columns
            if after.starts_with('(') || after.starts_with('.') {
                return None;
            }

            let before = masked[..m.start()].trim_end();
            let qualifier = match before.strip_suffix('.') {
                Some(prefix) => lexer::trailing_word(prefix.trim_end()).map(str::to_string),
                None if is_alias_position(before) => return None,
                None => None,
            };

            Some(ColumnRef {
                name: word.to_string(),
                inside_aggregate: aggregates.iter().any(|r| r.contains(&m.start())),
                qualifier,
                span: Span::new(m.start(), m.len()),
            })
        })
        .collect()
}

/// Column references that are not arguments of an aggregate call
pub fn extract_non_aggregate(text: &str) -> Vec<ColumnRef> {
    extract_all(text)
        .into_iter()
        .filter(|c| !c.inside_aggregate)
        .collect()
}

/// Lower-cased column names, first occurrence order, no duplicates
pub fn column_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for column in extract_all(text) {
        let name = column.name.to_lowercase();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// An identifier is an alias when it follows `AS`, a closing parenthesis,
/// a literal, or another non-keyword expression term (`first_name fname`).
fn is_alias_position(before: &str) -> bool {
    if before.ends_with(')') || before.ends_with('\'') {
        return true;
    }
    match lexer::trailing_word(before) {
        Some(word) if word.eq_ignore_ascii_case("AS") => true,
        Some(word) => !lexer::is_keyword(word),
        None => false,
    }
}

//! Table references in FROM and JOIN

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::lexer::{self, JOIN_MODIFIERS};
use super::{ClauseKind, Query};
use crate::error::Span;

static JOIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bJOIN\b").unwrap());

static JOIN_CONDITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(ON|USING)\b").unwrap());

/// A table named in FROM or JOIN
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRef {
    /// Name as written in the query
    pub name: String,
    pub alias: Option<String>,
    /// Location of the name in the raw query
    pub span: Span,
}

impl TableRef {
    /// Whether `qualifier` refers to this table by name or alias
    pub fn answers_to(&self, qualifier: &str) -> bool {
        self.name.eq_ignore_ascii_case(qualifier)
            || self
                .alias
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(qualifier))
    }
}

/// Resolve every table reference, in first-seen order. Duplicates are kept.
pub fn table_refs(query: &Query) -> Vec<TableRef> {
    let Some(from) = query.clauses().get(ClauseKind::From) else {
        return Vec::new();
    };
    let base = from.body.offset;
    let body = &query.masked()[base..from.body.end()];
    let depths = lexer::depth_map(body);

    let joins: Vec<(usize, usize)> = JOIN
        .find_iter(body)
        .filter(|m| depths[m.start()] == 0)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut refs = Vec::new();

    // comma-separated list before the first JOIN
    let list_end = joins.first().map(|(start, _)| *start).unwrap_or(body.len());
    for (offset, part) in lexer::split_top_level(&body[..list_end]) {
        if let Some(table) = table_item(part, base + offset) {
            refs.push(table);
        }
    }

    // each JOIN segment up to its ON / USING
    for (i, (_, join_end)) in joins.iter().enumerate() {
        let segment_end = joins.get(i + 1).map(|(start, _)| *start).unwrap_or(body.len());
        let segment = &body[*join_end..segment_end];
        let segment = match JOIN_CONDITION.find(segment) {
            Some(m) => &segment[..m.start()],
            None => segment,
        };
        if let Some(table) = table_item(segment, base + join_end) {
            refs.push(table);
        }
    }

    refs
}

/// Table names only, as written
pub fn table_names(query: &Query) -> Vec<String> {
    table_refs(query).into_iter().map(|t| t.name).collect()
}

/// Parse `name [AS] [alias]` from a FROM item or JOIN target
fn table_item(text: &str, base: usize) -> Option<TableRef> {
    let mut tokens = lexer::tokens(text)
        .filter(|(_, token)| !is_join_modifier(token))
        .peekable();

    let (offset, token) = tokens.next()?;
    // derived tables are not resolved
    if token.starts_with('(') {
        return None;
    }
    let name = lexer::clean_name(token);
    if name.is_empty() {
        return None;
    }

    if tokens
        .peek()
        .is_some_and(|(_, t)| t.eq_ignore_ascii_case("AS"))
    {
        tokens.next();
    }
    let alias = tokens
        .next()
        .map(|(_, t)| lexer::clean_name(t))
        .filter(|a| !a.is_empty() && !lexer::is_keyword(a))
        .map(str::to_string);

    let leading = token.len() - token.trim_start_matches(['"', '`', '[']).len();
    Some(TableRef {
        name: name.to_string(),
        alias,
        span: Span::new(base + offset + leading, name.len()),
    })
}

fn is_join_modifier(token: &str) -> bool {
    JOIN_MODIFIERS.iter().any(|m| m.eq_ignore_ascii_case(token))
}

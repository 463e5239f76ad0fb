//! Query segmentation
//!
//! A [`Query`] is the raw statement plus a [`ClauseMap`] that records where
//! each top-level clause starts and ends. Scanning is lexical: string
//! literals and comments are masked out first, and only keywords at
//! parenthesis depth zero count, so subqueries do not open new clauses.

pub mod columns;
pub(crate) mod lexer;
pub mod tables;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::Span;

pub use columns::ColumnRef;
pub use tables::TableRef;

/// The canonical top-level clauses, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClauseKind {
    Select,
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
}

impl ClauseKind {
    pub const ALL: [ClauseKind; 6] = [
        ClauseKind::Select,
        ClauseKind::From,
        ClauseKind::Where,
        ClauseKind::GroupBy,
        ClauseKind::Having,
        ClauseKind::OrderBy,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            ClauseKind::Select => "SELECT",
            ClauseKind::From => "FROM",
            ClauseKind::Where => "WHERE",
            ClauseKind::GroupBy => "GROUP BY",
            ClauseKind::Having => "HAVING",
            ClauseKind::OrderBy => "ORDER BY",
        }
    }
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

fn keyword_pattern(keyword: &str) -> Regex {
    let pattern = format!(r"(?i)\b{}\b", keyword.replace(' ', r"\s+"));
    Regex::new(&pattern).unwrap()
}

static CLAUSE_PATTERNS: LazyLock<Vec<(ClauseKind, Regex)>> = LazyLock::new(|| {
    ClauseKind::ALL
        .iter()
        .map(|kind| (*kind, keyword_pattern(kind.keyword())))
        .collect()
});

/// Keywords that end the last clause without starting a new one
static BOUNDARY_PATTERN: LazyLock<Regex> = LazyLock::new(|| keyword_pattern("LIMIT"));

static JOIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| keyword_pattern("JOIN"));

/// One top-level clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Clause {
    pub kind: ClauseKind,
    /// Location of the clause keyword itself
    pub keyword: Span,
    /// Location of the clause body, from the end of the keyword to the next clause
    pub body: Span,
}

/// Present clauses, in order of appearance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClauseMap {
    clauses: Vec<Clause>,
}

impl ClauseMap {
    pub fn get(&self, kind: ClauseKind) -> Option<&Clause> {
        self.clauses.iter().find(|c| c.kind == kind)
    }

    pub fn contains(&self, kind: ClauseKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Present clause kinds in the order they appear in the text
    pub fn appearance_order(&self) -> Vec<ClauseKind> {
        self.clauses.iter().map(|c| c.kind).collect()
    }

    /// Present clause kinds in canonical order
    pub fn canonical_order(&self) -> Vec<ClauseKind> {
        let mut kinds = self.appearance_order();
        kinds.sort();
        kinds
    }

    /// First clause that appears after a clause that should follow it
    pub fn first_out_of_order(&self) -> Option<&Clause> {
        let mut highest: Option<ClauseKind> = None;
        for clause in &self.clauses {
            match highest {
                Some(kind) if clause.kind < kind => return Some(clause),
                _ => highest = Some(clause.kind),
            }
        }
        None
    }
}

/// A raw statement and its segmentation. Immutable once built.
#[derive(Debug, Clone)]
pub struct Query {
    raw: String,
    masked: String,
    clauses: ClauseMap,
    /// End of the first statement (first top-level `;`, or end of text)
    statement_end: usize,
}

impl Query {
    /// Segment a raw query string into its top-level clauses
    pub fn parse(raw: &str) -> Self {
        let masked = lexer::mask_literals(raw);
        let depths = lexer::depth_map(&masked);

        let statement_end = masked
            .bytes()
            .enumerate()
            .find(|(i, b)| *b == b';' && depths[*i] == 0)
            .map(|(i, _)| i)
            .unwrap_or(masked.len());
        let scope = &masked[..statement_end];

        let mut found: Vec<(ClauseKind, Span)> = Vec::new();
        for (kind, pattern) in CLAUSE_PATTERNS.iter() {
            if let Some(m) = pattern.find_iter(scope).find(|m| depths[m.start()] == 0) {
                found.push((*kind, Span::new(m.start(), m.len())));
            }
        }
        found.sort_by_key(|(_, span)| span.offset);

        let boundary = BOUNDARY_PATTERN
            .find_iter(scope)
            .find(|m| depths[m.start()] == 0)
            .map(|m| m.start());

        let clauses = found
            .iter()
            .enumerate()
            .map(|(i, (kind, keyword))| {
                let next_clause = found.get(i + 1).map(|(_, span)| span.offset);
                let end = [next_clause, boundary.filter(|b| *b > keyword.offset)]
                    .into_iter()
                    .flatten()
                    .min()
                    .unwrap_or(statement_end);
                Clause {
                    kind: *kind,
                    keyword: *keyword,
                    body: Span::new(keyword.end(), end.saturating_sub(keyword.end())),
                }
            })
            .collect();

        let clauses = ClauseMap { clauses };
        debug!(clauses = ?clauses.appearance_order(), "segmented query");

        Self {
            raw: raw.to_string(),
            masked,
            clauses,
            statement_end,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Raw text with literals and comments blanked out, same byte offsets as `raw`
    pub fn masked(&self) -> &str {
        &self.masked
    }

    pub fn clauses(&self) -> &ClauseMap {
        &self.clauses
    }

    pub fn has(&self, kind: ClauseKind) -> bool {
        self.clauses.contains(kind)
    }

    /// Body text of a clause as written
    pub fn clause_text(&self, kind: ClauseKind) -> Option<&str> {
        self.clauses
            .get(kind)
            .map(|c| &self.raw[c.body.offset..c.body.end()])
    }

    /// Body text of a clause with literals masked
    pub fn masked_clause(&self, kind: ClauseKind) -> Option<&str> {
        self.clauses
            .get(kind)
            .map(|c| &self.masked[c.body.offset..c.body.end()])
    }

    /// Whether the first statement uses JOIN at the top level
    pub fn has_join(&self) -> bool {
        let depths = lexer::depth_map(&self.masked);
        JOIN_PATTERN
            .find_iter(&self.masked[..self.statement_end])
            .any(|m| depths[m.start()] == 0)
    }
}

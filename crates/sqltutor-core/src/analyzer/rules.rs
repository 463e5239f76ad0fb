//! Rule engine: an ordered registry of named checks
//!
//! Each check inspects the segmented query and the schema and reports zero or
//! more detections. The engine turns detections into findings, taking the
//! wording from the knowledge base when it has an error pattern for the rule.
//!
//! Custom checks implement [`Check`]:
//!
//! ```
//! use sqltutor_core::analyzer::{Check, CheckContext, Detection, RuleEngine, RuleInfo};
//! use sqltutor_core::{Category, Severity};
//!
//! struct NoLimit;
//!
//! impl Check for NoLimit {
//!     fn info(&self) -> RuleInfo {
//!         RuleInfo::new("no_limit", Category::SyntaxError, Severity::Low, "LIMIT is not allowed.")
//!     }
//!
//!     fn detect(&self, ctx: &CheckContext<'_>) -> Vec<Detection> {
//!         if ctx.query.raw().to_uppercase().contains("LIMIT") {
//!             vec![Detection::new()]
//!         } else {
//!             vec![]
//!         }
//!     }
//! }
//!
//! let mut engine = RuleEngine::builtin();
//! engine.register(NoLimit);
//! assert!(engine.names().contains(&"no_limit"));
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{Category, Finding, Origin, Severity, Span};
use crate::knowledge::{KnowledgeBase, Schema};
use crate::query::{columns, ClauseKind, ColumnRef, Query, TableRef};

static LEADING_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SELECT\b").unwrap());

/// Static description of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleInfo {
    pub name: &'static str,
    pub category: Category,
    pub severity: Severity,
    /// Message used when the knowledge base has no pattern for this rule
    pub message: &'static str,
    pub explanation: Option<&'static str>,
}

impl RuleInfo {
    pub const fn new(
        name: &'static str,
        category: Category,
        severity: Severity,
        message: &'static str,
    ) -> Self {
        Self {
            name,
            category,
            severity,
            message,
            explanation: None,
        }
    }

    pub const fn with_explanation(mut self, explanation: &'static str) -> Self {
        self.explanation = Some(explanation);
        self
    }
}

/// One occurrence of a rule violation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    /// Appended to the rule's message
    pub detail: Option<String>,
    pub span: Option<Span>,
}

impl Detection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

/// Everything a check may look at
pub struct CheckContext<'a> {
    pub query: &'a Query,
    pub schema: &'a Schema,
    /// Tables resolved from FROM and JOIN, first-seen order
    pub tables: &'a [TableRef],
}

impl<'a> CheckContext<'a> {
    pub fn new(query: &'a Query, schema: &'a Schema, tables: &'a [TableRef]) -> Self {
        Self {
            query,
            schema,
            tables,
        }
    }
}

/// A named check. Checks must be pure: no I/O and no shared mutable state.
pub trait Check: Send + Sync {
    fn info(&self) -> RuleInfo;

    fn detect(&self, ctx: &CheckContext<'_>) -> Vec<Detection>;
}

/// A check backed by a plain function
pub struct BuiltinCheck {
    info: RuleInfo,
    detect: fn(&CheckContext<'_>) -> Vec<Detection>,
}

impl Check for BuiltinCheck {
    fn info(&self) -> RuleInfo {
        self.info
    }

    fn detect(&self, ctx: &CheckContext<'_>) -> Vec<Detection> {
        (self.detect)(ctx)
    }
}

/// Ordered collection of checks
pub struct RuleEngine {
    checks: Vec<Box<dyn Check>>,
}

impl RuleEngine {
    /// The ten builtin checks, in registration order
    pub fn builtin() -> Self {
        let checks: Vec<Box<dyn Check>> = BUILTIN_CHECKS
            .iter()
            .map(|(info, detect)| {
                Box::new(BuiltinCheck {
                    info: *info,
                    detect: *detect,
                }) as Box<dyn Check>
            })
            .collect();
        Self { checks }
    }

    pub fn empty() -> Self {
        Self { checks: Vec::new() }
    }

    /// Append a check; it runs after every check registered before it
    pub fn register(&mut self, check: impl Check + 'static) -> &mut Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Remove checks by name. Unknown names are ignored.
    pub fn disable<S: AsRef<str>>(&mut self, names: &[S]) -> &mut Self {
        self.checks
            .retain(|c| !names.iter().any(|n| n.as_ref() == c.info().name));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.info().name).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check and collect findings in registration order
    pub fn run(&self, ctx: &CheckContext<'_>, knowledge: &KnowledgeBase) -> Vec<Finding> {
        let mut findings = Vec::new();
        for check in &self.checks {
            let info = check.info();
            let detections = check.detect(ctx);
            debug!(rule = info.name, hits = detections.len(), "ran check");
            findings.extend(
                detections
                    .into_iter()
                    .map(|d| to_finding(&info, d, knowledge)),
            );
        }
        findings
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

pub(crate) fn to_finding(
    info: &RuleInfo,
    detection: Detection,
    knowledge: &KnowledgeBase,
) -> Finding {
    let (base, category, severity, explanation, origin) = match knowledge.error_pattern(info.name)
    {
        Some(pattern) => (
            pattern.message.as_str(),
            pattern.category,
            pattern.severity,
            pattern.explanation.clone(),
            Origin::KnowledgeBase,
        ),
        None => (
            info.message,
            info.category,
            info.severity,
            info.explanation.map(str::to_string),
            Origin::Builtin,
        ),
    };

    let message = match detection.detail {
        Some(detail) => format!("{base} {detail}"),
        None => base.to_string(),
    };

    let mut finding = Finding::new(info.name, category, severity, message).with_origin(origin);
    finding.explanation = explanation;
    finding.span = detection.span;
    finding
}

type DetectFn = fn(&CheckContext<'_>) -> Vec<Detection>;

const BUILTIN_CHECKS: [(RuleInfo, DetectFn); 10] = [
    (
        RuleInfo::new(
            "missing_select",
            Category::SyntaxError,
            Severity::High,
            "Query must start with the SELECT keyword.",
        ),
        missing_select,
    ),
    (
        RuleInfo::new(
            "missing_from",
            Category::SyntaxError,
            Severity::High,
            "SELECT statement is missing a FROM clause.",
        ),
        missing_from,
    ),
    (
        RuleInfo::new(
            "clause_order",
            Category::SyntaxError,
            Severity::Medium,
            "SQL clauses should follow this order: SELECT -> FROM -> WHERE -> GROUP BY -> HAVING -> ORDER BY.",
        ),
        clause_order,
    ),
    (
        RuleInfo::new(
            "aggregate_in_where",
            Category::SemanticError,
            Severity::High,
            "Aggregate functions cannot be used in the WHERE clause.",
        )
        .with_explanation("Use HAVING to filter on aggregated values."),
        aggregate_in_where,
    ),
    (
        RuleInfo::new(
            "missing_group_by",
            Category::SemanticError,
            Severity::High,
            "Aggregate functions are mixed with plain columns but there is no GROUP BY clause.",
        ),
        missing_group_by,
    ),
    (
        RuleInfo::new(
            "having_without_group",
            Category::SemanticError,
            Severity::Medium,
            "HAVING is used without a GROUP BY clause.",
        ),
        having_without_group,
    ),
    (
        RuleInfo::new(
            "missing_aggregate_with_group_by",
            Category::SemanticError,
            Severity::High,
            "GROUP BY is used but SELECT contains no aggregate function.",
        ),
        missing_aggregate_with_group_by,
    ),
    (
        RuleInfo::new(
            "group_by_column_not_in_select",
            Category::SemanticError,
            Severity::High,
            "A GROUP BY column does not appear in the SELECT list.",
        ),
        group_by_column_not_in_select,
    ),
    (
        RuleInfo::new(
            "ambiguous_column",
            Category::SemanticError,
            Severity::Medium,
            "Column reference is ambiguous.",
        )
        .with_explanation("Qualify the column with its table name or alias."),
        ambiguous_column,
    ),
    (
        RuleInfo::new(
            "schema_table_exists",
            Category::SchemaError,
            Severity::High,
            "Table does not exist in the database schema.",
        ),
        schema_table_exists,
    ),
];

/// Looks at the raw text, so a leading comment counts as not starting with SELECT.
fn missing_select(ctx: &CheckContext<'_>) -> Vec<Detection> {
    if LEADING_SELECT.is_match(ctx.query.raw()) {
        return vec![];
    }
    let raw = ctx.query.raw();
    let start = raw.len() - raw.trim_start().len();
    let first_word = raw[start..].split_whitespace().next().unwrap_or("");
    vec![Detection::new().at(Span::new(start, first_word.len()))]
}

fn missing_from(ctx: &CheckContext<'_>) -> Vec<Detection> {
    match ctx.query.clauses().get(ClauseKind::Select) {
        Some(select) if !ctx.query.has(ClauseKind::From) => {
            vec![Detection::new().at(select.keyword)]
        }
        _ => vec![],
    }
}

fn clause_order(ctx: &CheckContext<'_>) -> Vec<Detection> {
    let clauses = ctx.query.clauses();
    let Some(misplaced) = clauses.first_out_of_order() else {
        return vec![];
    };
    let found = clauses
        .appearance_order()
        .iter()
        .map(|k| k.keyword())
        .collect::<Vec<_>>()
        .join(" -> ");
    vec![Detection::new()
        .with_detail(format!("Found: {found}"))
        .at(misplaced.keyword)]
}

fn aggregate_in_where(ctx: &CheckContext<'_>) -> Vec<Detection> {
    let Some(clause) = ctx.query.clauses().get(ClauseKind::Where) else {
        return vec![];
    };
    let body = &ctx.query.masked()[clause.body.offset..clause.body.end()];
    match columns::first_aggregate_call(body) {
        Some(span) => vec![Detection::new().at(span.shifted(clause.body.offset))],
        None => vec![],
    }
}

fn missing_group_by(ctx: &CheckContext<'_>) -> Vec<Detection> {
    if ctx.query.has(ClauseKind::GroupBy) {
        return vec![];
    }
    let Some(clause) = ctx.query.clauses().get(ClauseKind::Select) else {
        return vec![];
    };
    let select = &ctx.query.masked()[clause.body.offset..clause.body.end()];
    if !columns::has_aggregate_call(select) {
        return vec![];
    }
    match columns::extract_non_aggregate(select).first() {
        Some(column) => vec![Detection::new()
            .with_detail(format!("'{}' is not aggregated.", column.name))
            .at(column.span.shifted(clause.body.offset))],
        None => vec![],
    }
}

fn having_without_group(ctx: &CheckContext<'_>) -> Vec<Detection> {
    match ctx.query.clauses().get(ClauseKind::Having) {
        Some(having) if !ctx.query.has(ClauseKind::GroupBy) => {
            vec![Detection::new().at(having.keyword)]
        }
        _ => vec![],
    }
}

/// Only the SELECT list is inspected; an aggregate that appears solely in
/// HAVING does not satisfy this rule.
fn missing_aggregate_with_group_by(ctx: &CheckContext<'_>) -> Vec<Detection> {
    let Some(group_by) = ctx.query.clauses().get(ClauseKind::GroupBy) else {
        return vec![];
    };
    if select_has_aggregate(ctx.query) {
        return vec![];
    }
    vec![Detection::new().at(group_by.keyword)]
}

fn group_by_column_not_in_select(ctx: &CheckContext<'_>) -> Vec<Detection> {
    let Some(clause) = ctx.query.clauses().get(ClauseKind::GroupBy) else {
        return vec![];
    };
    let missing = group_by_columns_missing_from_select(ctx.query);
    let Some(first) = missing.first() else {
        return vec![];
    };
    let names = missing
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    vec![Detection::new()
        .with_detail(format!("Missing from SELECT: {names}."))
        .at(first.span.shifted(clause.body.offset))]
}

fn ambiguous_column(ctx: &CheckContext<'_>) -> Vec<Detection> {
    let mut referenced: Vec<&crate::knowledge::Table> = Vec::new();
    for table in ctx.tables {
        if let Some(def) = ctx.schema.get_table(&table.name) {
            if !referenced.iter().any(|t| std::ptr::eq(*t, def)) {
                referenced.push(def);
            }
        }
    }
    if referenced.len() < 2 {
        return vec![];
    }

    let mut reported = HashSet::new();
    let mut detections = Vec::new();
    for column in columns::extract_all(ctx.query.masked()) {
        if column.qualifier.is_some() {
            continue;
        }
        let owners: Vec<&str> = referenced
            .iter()
            .filter(|t| t.column_exists(&column.name))
            .map(|t| t.name.as_str())
            .collect();
        if owners.len() < 2 || !reported.insert(column.name.to_lowercase()) {
            continue;
        }
        debug!(column = %column.name, ?owners, "ambiguous column");
        detections.push(
            Detection::new()
                .with_detail(format!(
                    "'{}' exists in {}.",
                    column.name,
                    owners.join(" and ")
                ))
                .at(column.span),
        );
    }
    detections
}

fn schema_table_exists(ctx: &CheckContext<'_>) -> Vec<Detection> {
    let mut reported = HashSet::new();
    let mut detections = Vec::new();
    for table in ctx.tables {
        if ctx.schema.table_exists(&table.name) || !reported.insert(table.name.to_lowercase()) {
            continue;
        }
        let mut detail = format!("Unknown table '{}'.", table.name);
        let candidates = ctx.schema.similar_tables(&table.name);
        if !candidates.is_empty() {
            detail.push_str(&format!(" Did you mean: {}?", candidates.join(", ")));
        }
        detections.push(Detection::new().with_detail(detail).at(table.span));
    }
    detections
}

/// Whether the SELECT list contains an aggregate call
pub(crate) fn select_has_aggregate(query: &Query) -> bool {
    query
        .masked_clause(ClauseKind::Select)
        .is_some_and(columns::has_aggregate_call)
}

/// GROUP BY columns (case-insensitive) that are absent from every part of the
/// SELECT list, including aggregate arguments. Spans are relative to the
/// GROUP BY body.
pub(crate) fn group_by_columns_missing_from_select(query: &Query) -> Vec<ColumnRef> {
    let Some(group_by) = query.masked_clause(ClauseKind::GroupBy) else {
        return vec![];
    };
    let selected = columns::column_names(query.masked_clause(ClauseKind::Select).unwrap_or(""));
    let mut seen = HashSet::new();
    columns::extract_all(group_by)
        .into_iter()
        .filter(|c| {
            let name = c.name.to_lowercase();
            !selected.contains(&name) && seen.insert(name)
        })
        .collect()
}

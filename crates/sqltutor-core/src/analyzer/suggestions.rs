//! Advisory suggestions keyed on the shape of the query

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Origin, Severity, Suggestion};
use crate::knowledge::{KnowledgeBase, SuggestionTrigger};
use crate::query::{lexer, ClauseKind, Query, TableRef};

use super::rules::{group_by_columns_missing_from_select, select_has_aggregate};

static COUNT_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bCOUNT\s*\(\s*\*\s*\)").unwrap());

pub(crate) const SUCCESS_MESSAGE: &str = "Query is syntactically and semantically correct!";

/// Evaluate every template of the knowledge base against the query.
///
/// Triggers look at the query only, never at findings, so a correct query can
/// still receive advice.
pub fn synthesize(query: &Query, tables: &[TableRef], knowledge: &KnowledgeBase) -> Vec<Suggestion> {
    knowledge
        .suggestions()
        .values()
        .filter_map(|template| {
            let trigger = template.trigger?;
            fires(trigger, query, tables).then(|| {
                Suggestion::new(&template.message, &template.kind, severity(trigger))
            })
        })
        .collect()
}

/// The positive note placed before any advice when the verdict is Correct
pub fn success() -> Suggestion {
    Suggestion::new(SUCCESS_MESSAGE, "SUCCESS", Severity::Low).with_origin(Origin::Builtin)
}

fn severity(trigger: SuggestionTrigger) -> Severity {
    match trigger {
        SuggestionTrigger::OrderByAbsent | SuggestionTrigger::SelectStar => Severity::Low,
        SuggestionTrigger::MultiTableWithoutJoin
        | SuggestionTrigger::GroupByWithoutAggregate
        | SuggestionTrigger::GroupByColumnsNotInSelect => Severity::Medium,
    }
}

fn fires(trigger: SuggestionTrigger, query: &Query, tables: &[TableRef]) -> bool {
    match trigger {
        SuggestionTrigger::OrderByAbsent => !query.has(ClauseKind::OrderBy),
        SuggestionTrigger::SelectStar => selects_star(query),
        SuggestionTrigger::MultiTableWithoutJoin => {
            let distinct: HashSet<String> = tables.iter().map(|t| t.name.to_lowercase()).collect();
            distinct.len() >= 2 && !query.has_join()
        }
        SuggestionTrigger::GroupByWithoutAggregate => {
            query.has(ClauseKind::GroupBy) && !select_has_aggregate(query)
        }
        SuggestionTrigger::GroupByColumnsNotInSelect => {
            !group_by_columns_missing_from_select(query).is_empty()
        }
    }
}

/// A select item that is `*` or `alias.*`, in a query with no `COUNT(*)`
fn selects_star(query: &Query) -> bool {
    if COUNT_STAR.is_match(query.masked()) {
        return false;
    }
    let Some(select) = query.masked_clause(ClauseKind::Select) else {
        return false;
    };
    lexer::split_top_level(select).into_iter().any(|(_, item)| {
        let item = item.trim();
        let item = item
            .strip_prefix("DISTINCT")
            .or_else(|| item.strip_prefix("distinct"))
            .map(str::trim_start)
            .unwrap_or(item);
        item == "*" || item.ends_with(".*")
    })
}

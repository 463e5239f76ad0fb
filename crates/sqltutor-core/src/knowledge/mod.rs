//! Knowledge base: schema, error patterns, suggestion templates and concepts
//!
//! The knowledge base is materialized once, then shared read-only by every
//! analysis. It can be decoded from TOML or JSON; field names follow the
//! snake_case layout below, camelCase spellings are accepted as aliases.
//!
//! ```toml
//! [tables.employees.columns.emp_id]
//! type = "INTEGER"
//! primary_key = true
//!
//! [error_patterns.missing_from]
//! message = "Every SELECT needs a FROM clause."
//! type = "SYNTAX_ERROR"
//! severity = "HIGH"
//!
//! [suggestions.consider_order_by]
//! message = "Consider adding ORDER BY."
//! type = "BEST_PRACTICE"
//!
//! [concepts.group_by_concept]
//! label = "GROUP BY"
//! difficulty = 4
//! prerequisite = "aggregate_functions_concept"
//! ```

mod catalog;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Category, Severity};
use crate::types::SqlType;

pub use catalog::{Column, Schema, Table};

const BUILTIN_KNOWLEDGE: &str = include_str!("../../data/knowledge.toml");

/// Errors raised while loading a knowledge base
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeBaseError {
    #[error("failed to read knowledge base: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML knowledge base: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON knowledge base: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported knowledge base format '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),

    #[error("error pattern '{key}': {message}")]
    InvalidPattern { key: String, message: String },

    #[error("suggestion '{key}': unknown trigger '{trigger}'")]
    UnknownTrigger { key: String, trigger: String },
}

/// Named error pattern; overrides the wording of the finding with the same rule name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPattern {
    pub message: String,
    pub category: Category,
    pub severity: Severity,
    pub explanation: Option<String>,
}

/// Query shape that makes a suggestion template fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionTrigger {
    /// No ORDER BY clause
    OrderByAbsent,
    /// `SELECT *` (COUNT(*) does not count)
    SelectStar,
    /// Several tables listed in FROM without any JOIN
    MultiTableWithoutJoin,
    /// GROUP BY with no aggregate call in SELECT
    GroupByWithoutAggregate,
    /// A GROUP BY column is not selected
    GroupByColumnsNotInSelect,
}

impl SuggestionTrigger {
    /// Infer the trigger from a template key such as `consider_order_by`
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.to_lowercase();
        if key.contains("group_by_aggregate") {
            Some(SuggestionTrigger::GroupByWithoutAggregate)
        } else if key.contains("group_by_select") {
            Some(SuggestionTrigger::GroupByColumnsNotInSelect)
        } else if key.contains("order_by") {
            Some(SuggestionTrigger::OrderByAbsent)
        } else if key.contains("select_star") {
            Some(SuggestionTrigger::SelectStar)
        } else if key.contains("join") {
            Some(SuggestionTrigger::MultiTableWithoutJoin)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SuggestionTrigger::OrderByAbsent => "order_by_absent",
            SuggestionTrigger::SelectStar => "select_star",
            SuggestionTrigger::MultiTableWithoutJoin => "multi_table_without_join",
            SuggestionTrigger::GroupByWithoutAggregate => "group_by_without_aggregate",
            SuggestionTrigger::GroupByColumnsNotInSelect => "group_by_columns_not_in_select",
        }
    }
}

impl FromStr for SuggestionTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            SuggestionTrigger::OrderByAbsent,
            SuggestionTrigger::SelectStar,
            SuggestionTrigger::MultiTableWithoutJoin,
            SuggestionTrigger::GroupByWithoutAggregate,
            SuggestionTrigger::GroupByColumnsNotInSelect,
        ]
        .into_iter()
        .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| format!("Unknown suggestion trigger: '{}'", s))
    }
}

impl fmt::Display for SuggestionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Advisory message template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionTemplate {
    pub key: String,
    pub message: String,
    pub kind: String,
    /// None when the key names no known trigger; such templates never fire
    pub trigger: Option<SuggestionTrigger>,
}

/// Learning topic with at most one direct prerequisite
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Concept {
    pub key: String,
    pub label: String,
    pub difficulty: u8,
    pub prerequisite: Option<String>,
}

/// Read-only knowledge consumed by the analyzer
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    schema: Schema,
    error_patterns: IndexMap<String, ErrorPattern>,
    suggestions: IndexMap<String, SuggestionTemplate>,
    concepts: IndexMap<String, Concept>,
}

impl KnowledgeBase {
    /// The default knowledge base shipped with the crate (employees/departments/projects)
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_KNOWLEDGE).expect("builtin knowledge base is valid")
    }

    /// Load from a `.toml` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KnowledgeBaseError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        debug!(path = %path.display(), "loading knowledge base");
        match extension.as_str() {
            "toml" => Self::from_toml_str(&contents),
            "json" => Self::from_json_str(&contents),
            other => Err(KnowledgeBaseError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, KnowledgeBaseError> {
        let file: KnowledgeBaseFile = toml::from_str(contents)?;
        file.normalize()
    }

    pub fn from_json_str(contents: &str) -> Result<Self, KnowledgeBaseError> {
        let file: KnowledgeBaseFile = serde_json::from_str(contents)?;
        file.normalize()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn error_pattern(&self, rule: &str) -> Option<&ErrorPattern> {
        self.error_patterns.get(rule)
    }

    pub fn error_patterns(&self) -> &IndexMap<String, ErrorPattern> {
        &self.error_patterns
    }

    pub fn suggestions(&self) -> &IndexMap<String, SuggestionTemplate> {
        &self.suggestions
    }

    pub fn concept(&self, key: &str) -> Option<&Concept> {
        self.concepts.get(key)
    }

    pub fn concepts(&self) -> &IndexMap<String, Concept> {
        &self.concepts
    }
}

// On-disk layout. Everything optional is defaulted during normalization.

#[derive(Debug, Default, Deserialize)]
struct KnowledgeBaseFile {
    #[serde(default)]
    tables: IndexMap<String, TableEntry>,
    #[serde(default, alias = "errorPatterns")]
    error_patterns: IndexMap<String, ErrorPatternEntry>,
    #[serde(default)]
    suggestions: IndexMap<String, SuggestionEntry>,
    #[serde(default)]
    concepts: IndexMap<String, ConceptEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct TableEntry {
    #[serde(default)]
    columns: IndexMap<String, ColumnEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct ColumnEntry {
    #[serde(rename = "type")]
    data_type: Option<String>,
    nullable: Option<bool>,
    #[serde(alias = "primaryKey")]
    primary_key: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ErrorPatternEntry {
    message: String,
    #[serde(rename = "type")]
    category: Option<String>,
    severity: Option<String>,
    explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SuggestionEntry {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    trigger: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConceptEntry {
    label: String,
    difficulty: Option<u8>,
    prerequisite: Option<String>,
}

impl KnowledgeBaseFile {
    fn normalize(self) -> Result<KnowledgeBase, KnowledgeBaseError> {
        let mut schema = Schema::new();
        for (table_name, entry) in self.tables {
            let mut table = Table::new(table_name);
            for (column_name, column) in entry.columns {
                let data_type = column
                    .data_type
                    .as_deref()
                    .map(SqlType::parse)
                    .unwrap_or_default();
                let mut def = Column::new(column_name, data_type);
                if column.nullable == Some(false) {
                    def = def.not_null();
                }
                if column.primary_key == Some(true) {
                    def = def.primary_key();
                }
                table = table.with_column(def);
            }
            schema.add_table(table);
        }

        let mut error_patterns = IndexMap::new();
        for (key, entry) in self.error_patterns {
            let invalid = |message: String| KnowledgeBaseError::InvalidPattern {
                key: key.clone(),
                message,
            };
            let category = match entry.category.as_deref() {
                Some(c) => c.parse().map_err(invalid)?,
                None => Category::SemanticError,
            };
            let severity = match entry.severity.as_deref() {
                Some(s) => s.parse().map_err(invalid)?,
                None => Severity::Medium,
            };
            error_patterns.insert(
                key,
                ErrorPattern {
                    message: entry.message,
                    category,
                    severity,
                    explanation: entry.explanation.filter(|e| !e.trim().is_empty()),
                },
            );
        }

        let mut suggestions = IndexMap::new();
        for (key, entry) in self.suggestions {
            let trigger = match entry.trigger {
                Some(name) => Some(name.parse().map_err(|_| {
                    KnowledgeBaseError::UnknownTrigger {
                        key: key.clone(),
                        trigger: name.clone(),
                    }
                })?),
                None => SuggestionTrigger::from_key(&key),
            };
            suggestions.insert(
                key.clone(),
                SuggestionTemplate {
                    key,
                    message: entry.message,
                    kind: entry.kind.unwrap_or_else(|| "SUGGESTION".to_string()),
                    trigger,
                },
            );
        }

        let concepts = self
            .concepts
            .into_iter()
            .map(|(key, entry)| {
                let concept = Concept {
                    key: key.clone(),
                    label: entry.label,
                    difficulty: entry.difficulty.unwrap_or(1),
                    prerequisite: entry.prerequisite.filter(|p| !p.is_empty()),
                };
                (key, concept)
            })
            .collect();

        Ok(KnowledgeBase {
            schema,
            error_patterns,
            suggestions,
            concepts,
        })
    }
}

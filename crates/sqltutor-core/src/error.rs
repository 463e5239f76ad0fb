//! Finding and suggestion types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Byte range into the raw query text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset from start of the query
    pub offset: usize,
    /// Length in bytes
    pub length: usize,
}

impl Span {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// Exclusive end offset
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Shift a span that is relative to a substring starting at `base`
    pub fn shifted(self, base: usize) -> Self {
        Self {
            offset: self.offset + base,
            length: self.length,
        }
    }
}

/// Finding severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            _ => Err(format!(
                "Unknown severity: '{}'. Expected one of: LOW, MEDIUM, HIGH.",
                s
            )),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of problem a finding reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    SyntaxError,
    SemanticError,
    SchemaError,
    ExecutionError,
    SecurityError,
    ParseError,
    EmptyInput,
}

impl Category {
    pub fn code(&self) -> &'static str {
        match self {
            Category::SyntaxError => "SYNTAX_ERROR",
            Category::SemanticError => "SEMANTIC_ERROR",
            Category::SchemaError => "SCHEMA_ERROR",
            Category::ExecutionError => "EXECUTION_ERROR",
            Category::SecurityError => "SECURITY_ERROR",
            Category::ParseError => "PARSE_ERROR",
            Category::EmptyInput => "EMPTY_INPUT",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SYNTAX_ERROR" => Ok(Category::SyntaxError),
            "SEMANTIC_ERROR" => Ok(Category::SemanticError),
            "SCHEMA_ERROR" => Ok(Category::SchemaError),
            "EXECUTION_ERROR" => Ok(Category::ExecutionError),
            "SECURITY_ERROR" => Ok(Category::SecurityError),
            "PARSE_ERROR" => Ok(Category::ParseError),
            "EMPTY_INPUT" => Ok(Category::EmptyInput),
            _ => Err(format!("Unknown error category: '{}'", s)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Where the wording of a finding or suggestion came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Origin {
    Builtin,
    KnowledgeBase,
}

/// Diagnostic emitted while analyzing a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Name of the rule that produced the finding (e.g. "missing_group_by")
    pub rule: String,
    pub category: Category,
    pub severity: Severity,
    pub message: String,
    pub explanation: Option<String>,
    pub origin: Origin,
    pub span: Option<Span>,
}

impl Finding {
    pub fn new(
        rule: impl Into<String>,
        category: Category,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            category,
            severity,
            message: message.into(),
            explanation: None,
            origin: Origin::Builtin,
            span: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Text the learning path planner matches concept keywords against
    pub fn topic(&self) -> String {
        format!("{} {}", self.category.code(), self.rule)
    }
}

/// Advisory feedback; never affects the verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub message: String,
    /// Free-form kind label from the knowledge base (e.g. "BEST_PRACTICE")
    pub kind: String,
    pub severity: Severity,
    pub origin: Origin,
}

impl Suggestion {
    pub fn new(message: impl Into<String>, kind: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
            severity,
            origin: Origin::KnowledgeBase,
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }
}

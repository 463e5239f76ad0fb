//! sqltutor-core: diagnostic feedback for student SQL queries
//!
//! This library segments a SELECT statement into its clauses, runs a battery
//! of syntax, semantic and schema checks against a knowledge base, and turns
//! the results into suggestions and a learning path. Queries that pass the
//! security gate can be run against an in-memory SQLite sandbox.

pub mod analyzer;
pub mod error;
pub mod knowledge;
pub mod query;
pub mod sandbox;
pub mod types;

pub use analyzer::{Analyzer, AnalyzerOptions, Report, RuleEngine, Verdict};
pub use error::{Category, Finding, Origin, Severity, Span, Suggestion};
pub use knowledge::{Column, Concept, KnowledgeBase, KnowledgeBaseError, Schema, Table};
pub use query::{ClauseKind, ClauseMap, Query};
pub use sandbox::{
    CellValue, ExecutionError, ExecutionLimits, ExecutionResult, SandboxExecutor, SqliteSandbox,
};
pub use types::SqlType;

//! Read-only query execution against sample data

mod sqlite;

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use sqlite::SqliteSandbox;

/// Statements the tutor refuses to run
pub const DESTRUCTIVE_KEYWORDS: [&str; 7] = [
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "CREATE", "TRUNCATE",
];

static DESTRUCTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("(?i)({})", DESTRUCTIVE_KEYWORDS.join("|"))).unwrap());

/// Leftmost destructive keyword in `sql`. Plain substring match: identifiers
/// (`created_at`) and string literals (`'Dropbox'`) are refused too.
pub fn destructive_keyword(sql: &str) -> Option<&'static str> {
    let found = DESTRUCTIVE.find(sql)?;
    DESTRUCTIVE_KEYWORDS
        .iter()
        .find(|k| k.eq_ignore_ascii_case(found.as_str()))
        .copied()
}

/// Bounds applied to one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Wall-clock deadline for preparing and stepping the statement
    pub timeout: Duration,
    /// Rows kept in the result sample
    pub sample_rows: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
            sample_rows: 10,
        }
    }
}

/// A single result cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Columns, a sample of rows and the total row count of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    pub total_rows: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("query did not finish within {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("only read-only statements can be executed")]
    NotReadOnly,

    #[error("sandbox unavailable: {0}")]
    Unavailable(String),
}

/// Runs a statement that already passed the destructive-keyword gate
pub trait SandboxExecutor: Send + Sync {
    fn execute(&self, sql: &str, limits: &ExecutionLimits)
        -> Result<ExecutionResult, ExecutionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destructive_keywords() {
        assert_eq!(destructive_keyword("DELETE FROM employees"), Some("DELETE"));
        assert_eq!(destructive_keyword("  drop table x"), Some("DROP"));
        assert_eq!(
            destructive_keyword("SELECT * FROM employees; truncate employees"),
            Some("TRUNCATE")
        );
        assert_eq!(destructive_keyword("SELECT * FROM employees"), None);
    }

    #[test]
    fn test_keywords_match_inside_identifiers() {
        assert_eq!(destructive_keyword("SELECT created_at FROM t"), Some("CREATE"));
        assert_eq!(destructive_keyword("SELECT last_update FROM t"), Some("UPDATE"));
        assert_eq!(destructive_keyword("SELECT dropped FROM t"), Some("DROP"));
    }

    #[test]
    fn test_literals_are_not_exempt() {
        assert_eq!(
            destructive_keyword("SELECT * FROM employees WHERE first_name = 'Dropbox'"),
            Some("DROP")
        );
    }

    #[test]
    fn test_cells_serialize_untagged() {
        let row = vec![
            CellValue::Integer(1),
            CellValue::Text("John".into()),
            CellValue::Null,
            CellValue::Real(1.5),
        ];
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"[1,"John",null,1.5]"#);
    }
}

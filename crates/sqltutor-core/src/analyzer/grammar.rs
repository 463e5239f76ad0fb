//! Optional strict grammar stage

use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

use crate::error::{Category, Finding, Severity, Span};

pub const RULE_NAME: &str = "grammar";

/// Upper bound, in bytes, on the span attached to a parse error
const SPAN_LIMIT: usize = 50;

/// Parse the query with a full SQL grammar. Returns a ParseError finding when
/// the parser rejects it.
pub fn check(sql: &str) -> Option<Finding> {
    let dialect = SQLiteDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(_) => None,
        Err(e) => Some(
            Finding::new(
                RULE_NAME,
                Category::ParseError,
                Severity::High,
                format!("Failed to parse query: {e}"),
            )
            .with_span(Span::new(0, prefix_len(sql, SPAN_LIMIT))),
        ),
    }
}

/// Longest prefix of at most `limit` bytes that ends on a char boundary
fn prefix_len(text: &str, limit: usize) -> usize {
    if text.len() <= limit {
        return text.len();
    }
    (0..=limit).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_query_parses() {
        assert!(check("SELECT department, COUNT(*) FROM employees GROUP BY department").is_none());
    }

    #[test]
    fn test_invalid_query_is_a_parse_error() {
        let finding = check("SELECT * FROM employees WHERE").unwrap();
        assert_eq!(finding.category, Category::ParseError);
        assert_eq!(finding.severity, Severity::High);
        assert!(finding.message.starts_with("Failed to parse query:"));
    }

    #[test]
    fn test_span_ends_on_char_boundary() {
        // 'é' occupies bytes 49 and 50
        let sql = format!("SELECT '{}é' FROM employees WHERE", "a".repeat(41));
        let finding = check(&sql).unwrap();
        let span = finding.span.unwrap();
        assert_eq!(span.end(), 49);
        assert_eq!(&sql[span.offset..span.end()], &sql[..49]);
    }

    #[test]
    fn test_short_query_span_covers_everything() {
        assert_eq!(prefix_len("SELECT", 50), 6);
        assert_eq!(prefix_len("ab\u{e9}", 3), 2);
    }
}

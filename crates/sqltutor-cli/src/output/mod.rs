//! Output formatting

use std::fmt::Write;

use sqltutor_core::{CellValue, ExecutionResult, Finding, KnowledgeBase, Report, Severity, Verdict};

use crate::args::OutputFormat;

/// Output formatter for analysis reports
pub struct OutputFormatter<'a> {
    format: OutputFormat,
    source_name: String,
    knowledge: &'a KnowledgeBase,
}

impl<'a> OutputFormatter<'a> {
    pub fn new(format: OutputFormat, source_name: String, knowledge: &'a KnowledgeBase) -> Self {
        Self {
            format,
            source_name,
            knowledge,
        }
    }

    /// Print a report in the configured format
    pub fn print_report(&self, report: &Report, source: &str) {
        match self.format {
            OutputFormat::Human => print!("{}", self.render_human(report, source)),
            OutputFormat::Json => println!("{}", self.render_json(report)),
        }
    }

    fn render_human(&self, report: &Report, source: &str) -> String {
        let mut out = String::new();
        let verdict = match report.verdict {
            Verdict::Correct => "\x1b[32mcorrect\x1b[0m",
            Verdict::Partial => "\x1b[33mpartially correct\x1b[0m",
            Verdict::Incorrect => "\x1b[31mincorrect\x1b[0m",
        };
        let _ = writeln!(out, "{}: {}", self.source_name, verdict);
        let _ = writeln!(out);

        for finding in &report.findings {
            self.render_finding(&mut out, finding, source);
        }

        if !report.suggestions.is_empty() {
            let _ = writeln!(out, "suggestions:");
            for suggestion in &report.suggestions {
                let _ = writeln!(out, "  - {}", suggestion.message);
            }
            let _ = writeln!(out);
        }

        if !report.learning_path.is_empty() {
            let _ = writeln!(out, "study next:");
            for (i, key) in report.learning_path.iter().enumerate() {
                match self.knowledge.concept(key) {
                    Some(concept) => {
                        let _ = writeln!(
                            out,
                            "  {}. {} {}",
                            i + 1,
                            concept.label,
                            "*".repeat(concept.difficulty as usize)
                        );
                    }
                    None => {
                        let _ = writeln!(out, "  {}. {}", i + 1, key);
                    }
                }
            }
            let _ = writeln!(out);
        }

        if let Some(result) = &report.execution_result {
            render_result(&mut out, result);
        }

        out
    }

    fn render_finding(&self, out: &mut String, finding: &Finding, source: &str) {
        let severity_str = match finding.severity {
            Severity::High => "\x1b[31merror\x1b[0m",
            Severity::Medium => "\x1b[33mwarning\x1b[0m",
            Severity::Low => "\x1b[34minfo\x1b[0m",
        };

        let _ = writeln!(out, "{}[{}]: {}", severity_str, finding.rule, finding.message);

        if let Some(span) = &finding.span {
            let (line, col) = offset_to_line_col(source, span.offset);
            let _ = writeln!(out, "  --> {}:{}:{}", self.source_name, line, col);

            if let Some(source_line) = get_source_line(source, line) {
                let _ = writeln!(out, "   |");
                let _ = writeln!(out, "{:>3} | {}", line, source_line);

                let padding = " ".repeat(col.saturating_sub(1));
                let available = source_line.len().saturating_sub(col - 1);
                let underline = "^".repeat(span.length.min(available).max(1));
                let _ = writeln!(out, "   | {}{}", padding, underline);
            }
        }

        if let Some(explanation) = &finding.explanation {
            let _ = writeln!(out, "   = help: {}", explanation);
        }

        let _ = writeln!(out);
    }

    fn render_json(&self, report: &Report) -> String {
        let output = serde_json::json!({
            "source": self.source_name,
            "report": report,
        });
        serde_json::to_string_pretty(&output).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

fn render_result(out: &mut String, result: &ExecutionResult) {
    let _ = writeln!(out, "result:");
    let _ = writeln!(out, "  {}", result.columns.join(" | "));
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(cell_text).collect();
        let _ = writeln!(out, "  {}", cells.join(" | "));
    }
    if result.rows.len() < result.total_rows {
        let _ = writeln!(
            out,
            "  (showing first {} of {} rows)",
            result.rows.len(),
            result.total_rows
        );
    } else {
        let _ = writeln!(out, "  ({} rows)", result.total_rows);
    }
    let _ = writeln!(out);
}

fn cell_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Null => "NULL".to_string(),
        CellValue::Integer(i) => i.to_string(),
        CellValue::Real(f) => f.to_string(),
        CellValue::Text(s) => s.clone(),
        CellValue::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// Convert byte offset to line and column (1-indexed)
fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;

    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Get a specific line from source (1-indexed)
fn get_source_line(source: &str, line: usize) -> Option<&str> {
    source.lines().nth(line.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqltutor_core::Analyzer;

    #[test]
    fn test_offset_to_line_col() {
        let source = "SELECT *\nFROM employes";
        assert_eq!(offset_to_line_col(source, 0), (1, 1));
        assert_eq!(offset_to_line_col(source, 14), (2, 6));
    }

    #[test]
    fn test_human_output_underlines_span() {
        let knowledge = KnowledgeBase::builtin();
        let source = "SELECT *\nFROM employes";
        let report = Analyzer::new(&knowledge).analyze(source);
        let formatter = OutputFormatter::new(OutputFormat::Human, "query.sql".into(), &knowledge);
        let text = formatter.render_human(&report, source);
        assert!(text.contains("[schema_table_exists]"));
        assert!(text.contains("--> query.sql:2:6"));
        assert!(text.contains("  2 | FROM employes"));
        assert!(text.contains("   |      ^^^^^^^^"));
        assert!(text.contains("Did you mean: employees?"));
    }

    #[test]
    fn test_learning_path_uses_labels() {
        let knowledge = KnowledgeBase::builtin();
        let source = "SELECT department FROM employees WHERE MAX(salary) > 1";
        let report = Analyzer::new(&knowledge).analyze(source);
        let formatter = OutputFormatter::new(OutputFormat::Human, "q".into(), &knowledge);
        let text = formatter.render_human(&report, source);
        assert!(text.contains("study next:"));
        assert!(text.contains("1. SELECT basics *\n"));
    }

    #[test]
    fn test_json_output_wraps_report() {
        let knowledge = KnowledgeBase::builtin();
        let report = Analyzer::new(&knowledge).analyze("SELECT 1");
        let formatter = OutputFormatter::new(OutputFormat::Json, "inline".into(), &knowledge);
        let value: serde_json::Value = serde_json::from_str(&formatter.render_json(&report)).unwrap();
        assert_eq!(value["source"], "inline");
        assert_eq!(value["report"]["verdict"], "INCORRECT");
        assert_eq!(value["report"]["findings"][0]["rule"], "missing_from");
    }

    #[test]
    fn test_result_table() {
        let mut out = String::new();
        render_result(
            &mut out,
            &ExecutionResult {
                columns: vec!["id".into(), "name".into()],
                rows: vec![vec![CellValue::Integer(1), CellValue::Null]],
                total_rows: 3,
            },
        );
        assert_eq!(out, "result:\n  id | name\n  1 | NULL\n  (showing first 1 of 3 rows)\n\n");
    }
}

// Integration tests for the SQL tutor analyzer
use std::collections::HashSet;

use pretty_assertions::assert_eq;
use sqltutor_core::analyzer::{Check, CheckContext, Detection, RuleInfo};
use sqltutor_core::{
    Analyzer, AnalyzerOptions, Category, CellValue, KnowledgeBase, Origin, Report, RuleEngine,
    Severity, SqliteSandbox, Verdict,
};

fn analyze(sql: &str) -> Report {
    let knowledge = KnowledgeBase::builtin();
    Analyzer::new(&knowledge).analyze(sql)
}

fn analyze_with_sandbox(sql: &str) -> Report {
    let knowledge = KnowledgeBase::builtin();
    let sandbox = SqliteSandbox::sample(&knowledge).unwrap();
    Analyzer::new(&knowledge).with_sandbox(&sandbox).analyze(sql)
}

fn rules(report: &Report) -> Vec<&str> {
    report.findings.iter().map(|f| f.rule.as_str()).collect()
}

#[test]
fn test_missing_select_for_non_select_queries() {
    for sql in [
        "FROM employees SELECT first_name",
        "  with t as (select 1) select * from t",
        "\n\tEXPLAIN SELECT 1",
        "show tables",
    ] {
        let report = analyze(sql);
        assert!(report.has_finding("missing_select"), "expected missing_select for {sql:?}");
    }

    for sql in ["SELECT 1 FROM employees", "   select first_name from employees", "Select\n*\nFrom employees"] {
        let report = analyze(sql);
        assert!(!report.has_finding("missing_select"), "unexpected missing_select for {sql:?}");
    }
}

#[test]
fn test_pure_aggregate_select_needs_no_group_by() {
    let report = analyze("SELECT COUNT(*) FROM employees");
    assert!(!report.has_finding("missing_group_by"));
    assert_eq!(report.verdict, Verdict::Correct);
}

#[test]
fn test_mixed_select_without_group_by() {
    let report = analyze("SELECT department, COUNT(*) FROM employees");
    assert!(report.has_finding("missing_group_by"));
    assert_eq!(report.verdict, Verdict::Incorrect);
}

#[test]
fn test_grouped_query_has_no_group_by_findings() {
    let report = analyze("SELECT department, COUNT(*) FROM employees GROUP BY department");
    assert_eq!(report.findings_of(Category::SemanticError).count(), 0);
    assert_eq!(report.verdict, Verdict::Correct);
}

#[test]
fn test_aggregate_only_in_having_still_fires() {
    let report =
        analyze("SELECT department FROM employees GROUP BY department HAVING COUNT(*) > 1");
    assert_eq!(rules(&report), vec!["missing_aggregate_with_group_by"]);
    assert_eq!(report.verdict, Verdict::Incorrect);
}

#[test]
fn test_misspelled_table_gets_did_you_mean() {
    let report = analyze("SELECT e.name FROM employes e WHERE e.dept = 'Sales'");
    let finding = report
        .findings
        .iter()
        .find(|f| f.rule == "schema_table_exists")
        .unwrap();
    assert_eq!(finding.category, Category::SchemaError);
    assert_eq!(finding.severity, Severity::High);
    assert!(finding.message.contains("Did you mean: employees?"));

    let span = finding.span.unwrap();
    assert_eq!(
        &"SELECT e.name FROM employes e WHERE e.dept = 'Sales'"[span.offset..span.end()],
        "employes"
    );
}

#[test]
fn test_destructive_statement_is_blocked() {
    let knowledge = KnowledgeBase::builtin();
    let sandbox = SqliteSandbox::sample(&knowledge).unwrap();
    let analyzer = Analyzer::new(&knowledge).with_sandbox(&sandbox);

    let report = analyzer.analyze("DELETE FROM employees");
    let security: Vec<_> = report.findings_of(Category::SecurityError).collect();
    assert_eq!(security.len(), 1);
    assert_eq!(security[0].severity, Severity::High);
    assert_eq!(
        security[0].message,
        "This tutoring system only supports SELECT queries for learning purposes."
    );
    assert!(report.execution_result.is_none());
    assert_eq!(report.verdict, Verdict::Incorrect);

    let report = analyzer.analyze("SELECT COUNT(*) FROM employees");
    assert_eq!(
        report.execution_result.unwrap().rows,
        vec![vec![CellValue::Integer(7)]]
    );
}

#[test]
fn test_destructive_keywords_inside_words_are_blocked() {
    let knowledge = KnowledgeBase::builtin();
    let sandbox = SqliteSandbox::sample(&knowledge).unwrap();
    let analyzer = Analyzer::new(&knowledge).with_sandbox(&sandbox);

    for sql in [
        "SELECT created_at FROM employees",
        "SELECT last_update FROM employees",
        "SELECT first_name FROM employees WHERE first_name = 'Dropbox'",
    ] {
        let report = analyzer.analyze(sql);
        assert_eq!(report.findings_of(Category::SecurityError).count(), 1, "{sql}");
        assert!(report.execution_result.is_none());
        assert_eq!(report.verdict, Verdict::Incorrect);
    }
}

#[test]
fn test_learning_path_for_aggregate_findings() {
    let report = analyze("SELECT department FROM employees WHERE COUNT(*) > 1 AND AVG(salary) > 2");
    assert!(report.has_finding("aggregate_in_where"));

    let path = &report.learning_path;
    assert!(path.contains(&"aggregate_functions_concept".to_string()));
    assert!(path.contains(&"group_by_concept".to_string()));

    let knowledge = KnowledgeBase::builtin();
    let difficulties: Vec<u8> = path
        .iter()
        .map(|k| knowledge.concept(k).unwrap().difficulty)
        .collect();
    let mut sorted = difficulties.clone();
    sorted.sort();
    assert_eq!(difficulties, sorted);

    let unique: HashSet<&String> = path.iter().collect();
    assert_eq!(unique.len(), path.len());
}

#[test]
fn test_analysis_is_idempotent() {
    let knowledge = KnowledgeBase::builtin();
    let sandbox = SqliteSandbox::sample(&knowledge).unwrap();
    let analyzer = Analyzer::new(&knowledge).with_sandbox(&sandbox);

    for sql in [
        "SELECT department, AVG(salary) FROM employees GROUP BY department ORDER BY department",
        "SELECT * FROM employees, departments",
        "SELECT nope FROM employees",
        "DROP TABLE employees",
        "",
    ] {
        let first = serde_json::to_string(&analyzer.analyze(sql)).unwrap();
        let second = serde_json::to_string(&analyzer.analyze(sql)).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_execution_result_is_sampled() {
    let knowledge = KnowledgeBase::builtin();
    let sandbox = SqliteSandbox::sample(&knowledge).unwrap();
    let options = AnalyzerOptions {
        sample_rows: 5,
        ..AnalyzerOptions::default()
    };
    let report = Analyzer::with_options(&knowledge, options)
        .with_sandbox(&sandbox)
        .analyze("SELECT first_name, salary FROM employees ORDER BY salary DESC");

    assert_eq!(report.verdict, Verdict::Correct);
    let result = report.execution_result.unwrap();
    assert_eq!(result.columns, vec!["first_name", "salary"]);
    assert_eq!(result.total_rows, 7);
    assert_eq!(result.rows.len(), 5);
    assert_eq!(result.rows[0][0], CellValue::Text("Lisa".into()));
}

#[test]
fn test_execution_error_becomes_finding() {
    let report = analyze_with_sandbox("SELECT bonus FROM employees");
    let finding = report
        .findings_of(Category::ExecutionError)
        .next()
        .unwrap();
    assert!(finding.message.starts_with("Execution error:"));
    assert!(finding.message.contains("no such column"));
    assert_eq!(report.verdict, Verdict::Incorrect);
    assert!(report.execution_result.is_none());
    // advice is still given, without the success note
    assert!(!report.suggestions.is_empty());
    assert!(report.suggestions.iter().all(|s| s.kind != "SUCCESS"));
}

#[test]
fn test_correct_query_still_gets_advice() {
    let report = analyze("SELECT * FROM employees");
    assert_eq!(report.verdict, Verdict::Correct);
    let kinds: Vec<&str> = report.suggestions.iter().map(|s| s.kind.as_str()).collect();
    assert_eq!(kinds, vec!["SUCCESS", "BEST_PRACTICE", "BEST_PRACTICE"]);
    assert_eq!(report.suggestions[0].origin, Origin::Builtin);
    assert_eq!(report.suggestions[1].origin, Origin::KnowledgeBase);
}

#[test]
fn test_clause_order_is_partial() {
    let report = analyze("SELECT department, COUNT(*) FROM employees HAVING COUNT(*) > 1 GROUP BY department");
    assert_eq!(rules(&report), vec!["clause_order"]);
    assert!(report.findings[0]
        .message
        .ends_with("Found: SELECT -> FROM -> HAVING -> GROUP BY"));
    assert_eq!(report.verdict, Verdict::Partial);
}

#[test]
fn test_ambiguous_column_across_joined_tables() {
    let report = analyze(
        "SELECT project_name, department FROM employees e \
         JOIN projects p ON e.department = p.department ORDER BY 1",
    );
    assert_eq!(rules(&report), vec!["ambiguous_column"]);
    assert_eq!(report.verdict, Verdict::Partial);
}

#[test]
fn test_custom_knowledge_base() {
    let knowledge = KnowledgeBase::from_toml_str(
        r#"
        [tables.books.columns.isbn]
        type = "TEXT"
        primary_key = true

        [error_patterns.missing_from]
        message = "Where do the rows come from?"
        type = "SYNTAX_ERROR"
        severity = "LOW"
        "#,
    )
    .unwrap();
    let report = Analyzer::new(&knowledge).analyze("SELECT isbn");
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].message, "Where do the rows come from?");
    assert_eq!(report.findings[0].origin, Origin::KnowledgeBase);
    assert_eq!(report.verdict, Verdict::Partial);
    // no concepts, no suggestions
    assert!(report.learning_path.is_empty());
    assert!(report.suggestions.is_empty());
}

#[test]
fn test_custom_rule_runs_after_builtins() {
    struct NoDistinct;

    impl Check for NoDistinct {
        fn info(&self) -> RuleInfo {
            RuleInfo::new(
                "no_distinct",
                Category::SemanticError,
                Severity::Medium,
                "DISTINCT hides duplicate rows; use GROUP BY to see them.",
            )
        }

        fn detect(&self, ctx: &CheckContext<'_>) -> Vec<Detection> {
            if ctx.query.masked().to_uppercase().contains("DISTINCT") {
                vec![Detection::new()]
            } else {
                vec![]
            }
        }
    }

    let knowledge = KnowledgeBase::builtin();
    let mut engine = RuleEngine::builtin();
    engine.register(NoDistinct);
    let report = Analyzer::new(&knowledge)
        .with_rules(engine)
        .analyze("SELECT DISTINCT department FROM employes");
    assert_eq!(rules(&report), vec!["schema_table_exists", "no_distinct"]);
}

#[test]
fn test_report_json_shape() {
    let report = analyze("SELECT department, COUNT(*) FROM employees");
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["verdict"], "INCORRECT");
    assert_eq!(json["findings"][0]["category"], "SEMANTIC_ERROR");
    assert_eq!(json["findings"][0]["severity"], "HIGH");
    assert!(json["execution_result"].is_null());
}

//! Query analysis pipeline

pub mod grammar;
pub mod learning;
mod rules;
pub mod suggestions;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Category, Finding, Severity, Suggestion};
use crate::knowledge::KnowledgeBase;
use crate::query::{tables, Query};
use crate::sandbox::{self, ExecutionLimits, ExecutionResult, SandboxExecutor};

pub use rules::{BuiltinCheck, Check, CheckContext, Detection, RuleEngine, RuleInfo};

const EMPTY_INPUT: RuleInfo = RuleInfo::new(
    "empty_input",
    Category::EmptyInput,
    Severity::Low,
    "Please enter a SQL query.",
);

const DESTRUCTIVE_STATEMENT: RuleInfo = RuleInfo::new(
    "destructive_statement",
    Category::SecurityError,
    Severity::High,
    "This tutoring system only supports SELECT queries for learning purposes.",
);

const EXECUTION_FAILED: RuleInfo = RuleInfo::new(
    "execution_failed",
    Category::ExecutionError,
    Severity::High,
    "Execution error:",
)
.with_explanation("The query failed to execute against the sample database.");

/// Overall judgement of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Correct,
    Incorrect,
    Partial,
}

impl Verdict {
    /// Correct without findings, Incorrect with any High finding, Partial otherwise
    pub fn from_findings(findings: &[Finding]) -> Self {
        if findings.is_empty() {
            Verdict::Correct
        } else if findings.iter().any(|f| f.severity == Severity::High) {
            Verdict::Incorrect
        } else {
            Verdict::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Correct => "CORRECT",
            Verdict::Incorrect => "INCORRECT",
            Verdict::Partial => "PARTIAL",
        }
    }
}

/// Everything the tutor has to say about one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub findings: Vec<Finding>,
    pub suggestions: Vec<Suggestion>,
    /// Concept keys, easiest first
    pub learning_path: Vec<String>,
    pub verdict: Verdict,
    pub execution_result: Option<ExecutionResult>,
}

impl Report {
    pub fn has_finding(&self, rule: &str) -> bool {
        self.findings.iter().any(|f| f.rule == rule)
    }

    pub fn findings_of(&self, category: Category) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.category == category)
    }
}

/// Knobs for an [`Analyzer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerOptions {
    /// Builtin rule names to skip
    pub disabled_rules: Vec<String>,
    /// Also parse the query with a full SQL grammar
    pub strict_grammar: bool,
    pub execution_timeout: Duration,
    pub sample_rows: usize,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        let limits = ExecutionLimits::default();
        Self {
            disabled_rules: Vec::new(),
            strict_grammar: false,
            execution_timeout: limits.timeout,
            sample_rows: limits.sample_rows,
        }
    }
}

/// Analyzes student queries against a knowledge base.
///
/// The analyzer holds no per-query state; one instance can serve concurrent
/// callers.
pub struct Analyzer<'a> {
    knowledge: &'a KnowledgeBase,
    rules: RuleEngine,
    sandbox: Option<&'a dyn SandboxExecutor>,
    options: AnalyzerOptions,
}

impl<'a> Analyzer<'a> {
    pub fn new(knowledge: &'a KnowledgeBase) -> Self {
        Self::with_options(knowledge, AnalyzerOptions::default())
    }

    pub fn with_options(knowledge: &'a KnowledgeBase, options: AnalyzerOptions) -> Self {
        let mut rules = RuleEngine::builtin();
        rules.disable(&options.disabled_rules);
        Self {
            knowledge,
            rules,
            sandbox: None,
            options,
        }
    }

    /// Run queries that pass the security gate against `sandbox`
    pub fn with_sandbox(mut self, sandbox: &'a dyn SandboxExecutor) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// Replace the rule set. Disabled rule names from the options still apply.
    pub fn with_rules(mut self, mut rules: RuleEngine) -> Self {
        rules.disable(&self.options.disabled_rules);
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        self.knowledge
    }

    /// Analyze one query. Never fails: every problem becomes a finding.
    pub fn analyze(&self, sql: &str) -> Report {
        if sql.trim().is_empty() {
            let findings = vec![rules::to_finding(&EMPTY_INPUT, Detection::new(), self.knowledge)];
            return Report {
                verdict: Verdict::from_findings(&findings),
                findings,
                suggestions: Vec::new(),
                learning_path: Vec::new(),
                execution_result: None,
            };
        }

        let query = Query::parse(sql);
        let tables = tables::table_refs(&query);
        let mut findings = Vec::new();

        if self.options.strict_grammar {
            findings.extend(grammar::check(sql));
        }

        let ctx = CheckContext::new(&query, self.knowledge.schema(), &tables);
        findings.extend(self.rules.run(&ctx, self.knowledge));

        let execution_result = match sandbox::destructive_keyword(sql) {
            Some(keyword) => {
                debug!(keyword, "refused destructive statement");
                findings.push(rules::to_finding(
                    &DESTRUCTIVE_STATEMENT,
                    Detection::new(),
                    self.knowledge,
                ));
                None
            }
            None => self.execute(sql, &mut findings),
        };

        let mut suggestions = suggestions::synthesize(&query, &tables, self.knowledge);
        let learning_path = learning::plan(findings.iter().map(Finding::topic), self.knowledge);

        let verdict = Verdict::from_findings(&findings);
        if verdict == Verdict::Correct {
            suggestions.insert(0, suggestions::success());
        }
        debug!(
            verdict = verdict.as_str(),
            findings = findings.len(),
            suggestions = suggestions.len(),
            "analyzed query"
        );

        Report {
            findings,
            suggestions,
            learning_path,
            verdict,
            execution_result,
        }
    }

    fn execute(&self, sql: &str, findings: &mut Vec<Finding>) -> Option<ExecutionResult> {
        let sandbox = self.sandbox?;
        let limits = ExecutionLimits {
            timeout: self.options.execution_timeout,
            sample_rows: self.options.sample_rows,
        };
        match sandbox.execute(sql, &limits) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(error = %e, "query execution failed");
                let detection = Detection::new().with_detail(e.to_string());
                findings.push(rules::to_finding(&EXECUTION_FAILED, detection, self.knowledge));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{CellValue, ExecutionError};

    struct FixedSandbox(Result<usize, &'static str>);

    impl SandboxExecutor for FixedSandbox {
        fn execute(
            &self,
            _sql: &str,
            limits: &ExecutionLimits,
        ) -> Result<ExecutionResult, ExecutionError> {
            match self.0 {
                Ok(total_rows) => Ok(ExecutionResult {
                    columns: vec!["n".to_string()],
                    rows: (0..total_rows.min(limits.sample_rows))
                        .map(|i| vec![CellValue::Integer(i as i64)])
                        .collect(),
                    total_rows,
                }),
                Err(message) => Err(ExecutionError::Unavailable(message.to_string())),
            }
        }
    }

    #[test]
    fn test_verdict_derivation() {
        let low = Finding::new("a", Category::SyntaxError, Severity::Low, "a");
        let high = Finding::new("b", Category::SyntaxError, Severity::High, "b");
        assert_eq!(Verdict::from_findings(&[]), Verdict::Correct);
        assert_eq!(Verdict::from_findings(&[low.clone()]), Verdict::Partial);
        assert_eq!(Verdict::from_findings(&[low, high]), Verdict::Incorrect);
    }

    #[test]
    fn test_empty_input_short_circuits() {
        let knowledge = KnowledgeBase::builtin();
        let report = Analyzer::new(&knowledge).analyze("   \n\t");
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].category, Category::EmptyInput);
        assert_eq!(report.findings[0].message, "Please enter a SQL query.");
        assert_eq!(report.verdict, Verdict::Partial);
        assert!(report.suggestions.is_empty());
        assert!(report.learning_path.is_empty());
    }

    #[test]
    fn test_correct_query_gets_success_note_first() {
        let knowledge = KnowledgeBase::builtin();
        let report = Analyzer::new(&knowledge).analyze("SELECT first_name FROM employees");
        assert_eq!(report.verdict, Verdict::Correct);
        assert_eq!(report.suggestions[0].kind, "SUCCESS");
        // ORDER BY advice still follows
        assert_eq!(report.suggestions.len(), 2);
    }

    #[test]
    fn test_sandbox_result_is_attached() {
        let knowledge = KnowledgeBase::builtin();
        let sandbox = FixedSandbox(Ok(25));
        let report = Analyzer::new(&knowledge)
            .with_sandbox(&sandbox)
            .analyze("SELECT emp_id FROM employees ORDER BY emp_id");
        let result = report.execution_result.unwrap();
        assert_eq!(result.total_rows, 25);
        assert_eq!(result.rows.len(), 10);
        assert_eq!(report.verdict, Verdict::Correct);
    }

    #[test]
    fn test_sandbox_error_becomes_finding() {
        let knowledge = KnowledgeBase::builtin();
        let sandbox = FixedSandbox(Err("offline"));
        let report = Analyzer::new(&knowledge)
            .with_sandbox(&sandbox)
            .analyze("SELECT emp_id FROM employees ORDER BY emp_id");
        assert!(report.execution_result.is_none());
        let finding = report.findings_of(Category::ExecutionError).next().unwrap();
        assert_eq!(finding.message, "Execution error: sandbox unavailable: offline");
        assert_eq!(
            finding.explanation.as_deref(),
            Some("The query failed to execute against the sample database.")
        );
        assert_eq!(report.verdict, Verdict::Incorrect);
    }

    #[test]
    fn test_destructive_statement_never_reaches_sandbox() {
        struct Unreachable;
        impl SandboxExecutor for Unreachable {
            fn execute(
                &self,
                sql: &str,
                _limits: &ExecutionLimits,
            ) -> Result<ExecutionResult, ExecutionError> {
                panic!("sandbox called with {sql}");
            }
        }

        let knowledge = KnowledgeBase::builtin();
        let report = Analyzer::new(&knowledge)
            .with_sandbox(&Unreachable)
            .analyze("DROP TABLE employees");
        assert!(report.has_finding("destructive_statement"));
        assert_eq!(report.verdict, Verdict::Incorrect);
    }

    #[test]
    fn test_strict_grammar_adds_parse_error() {
        let knowledge = KnowledgeBase::builtin();
        let options = AnalyzerOptions {
            strict_grammar: true,
            ..AnalyzerOptions::default()
        };
        let report = Analyzer::with_options(&knowledge, options)
            .analyze("SELECT * FROM employees WHERE");
        assert_eq!(report.findings[0].category, Category::ParseError);
        assert!(!report.suggestions.is_empty());
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let knowledge = KnowledgeBase::builtin();
        let options = AnalyzerOptions {
            disabled_rules: vec!["missing_from".to_string()],
            ..AnalyzerOptions::default()
        };
        let analyzer = Analyzer::with_options(&knowledge, options);
        assert!(!analyzer.rules().names().contains(&"missing_from"));
        assert_eq!(analyzer.analyze("SELECT 1").verdict, Verdict::Correct);
    }
}

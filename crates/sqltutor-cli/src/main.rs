//! sqltutor CLI - feedback for student SQL queries

mod args;
mod config;
mod output;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};
use sqltutor_core::analyzer::learning;
use sqltutor_core::query::tables;
use sqltutor_core::{
    Analyzer, AnalyzerOptions, KnowledgeBase, Query, SandboxExecutor, SqliteSandbox, Verdict,
};
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command, OutputFormat};
use crate::config::{Config, Overrides};
use crate::output::OutputFormatter;

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    match run(args) {
        Ok(has_incorrect) => {
            if has_incorrect {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let quiet = args.quiet;
    match args.command {
        Command::Check {
            files,
            query,
            format,
            knowledge_base,
            seed,
            disable,
            timeout_ms,
            strict,
            no_execute,
            config: config_path,
        } => {
            let config = match config_path {
                Some(path) => Config::from_file(&path)?,
                None => Config::find_and_load()?.unwrap_or_default(),
            };

            // CLI takes precedence
            let config = config.merge_with_args(Overrides {
                knowledge_base: knowledge_base.as_deref(),
                seed: seed.as_deref(),
                format,
                disable: &disable,
                timeout_ms,
                strict,
                no_execute,
            });

            let knowledge = load_knowledge(config.knowledge_base.as_deref())?;
            let sandbox = if config.execute() {
                Some(open_sandbox(&config, &knowledge)?)
            } else {
                None
            };

            let options = AnalyzerOptions {
                disabled_rules: config.disable.clone(),
                strict_grammar: config.strict,
                execution_timeout: Duration::from_millis(config.timeout_ms()),
                ..AnalyzerOptions::default()
            };
            let mut analyzer = Analyzer::with_options(&knowledge, options);
            if let Some(sandbox) = &sandbox {
                analyzer = analyzer.with_sandbox(sandbox as &dyn SandboxExecutor);
            }

            let inputs = collect_inputs(&files, query)?;
            let output_format = config.output_format();

            let mut counts = [0usize; 3];
            for (name, content) in &inputs {
                let report = analyzer.analyze(content);
                let formatter = OutputFormatter::new(output_format, name.clone(), &knowledge);
                formatter.print_report(&report, content);

                counts[match report.verdict {
                    Verdict::Correct => 0,
                    Verdict::Partial => 1,
                    Verdict::Incorrect => 2,
                }] += 1;
            }

            if !quiet && output_format == OutputFormat::Human {
                eprintln!(
                    "Analyzed {} quer{}: {} correct, {} partially correct, {} incorrect",
                    inputs.len(),
                    if inputs.len() == 1 { "y" } else { "ies" },
                    counts[0],
                    counts[1],
                    counts[2]
                );
            }

            Ok(counts[2] > 0)
        }

        Command::Schema { knowledge_base } => {
            let knowledge = load_knowledge(knowledge_base.as_deref())?;

            println!("Schema Information:");
            println!("==================");
            for table in knowledge.schema().tables.values() {
                println!("\nTable: {}", table.name);
                for col in table.columns.values() {
                    let nullable = if col.nullable { "NULL" } else { "NOT NULL" };
                    let pk = if col.is_primary_key { " PRIMARY KEY" } else { "" };
                    println!(
                        "  - {} {} {}{}",
                        col.name,
                        col.data_type.display_name(),
                        nullable,
                        pk
                    );
                }
            }

            Ok(false)
        }

        Command::Concepts { knowledge_base } => {
            let knowledge = load_knowledge(knowledge_base.as_deref())?;

            let mut concepts: Vec<_> = knowledge.concepts().values().collect();
            concepts.sort_by_key(|c| c.difficulty);
            for concept in concepts {
                let chain = learning::prerequisites(&concept.key, &knowledge);
                let requires = if chain.is_empty() {
                    String::new()
                } else {
                    format!("  (requires {})", chain.join(" <- "))
                };
                println!(
                    "{:<30} {:<30} difficulty {}{}",
                    concept.key, concept.label, concept.difficulty, requires
                );
            }

            Ok(false)
        }

        Command::Segment { file, query } => {
            let content = match (query, file) {
                (Some(query), _) => query,
                (None, Some(file)) => read_file(&file)?,
                (None, None) => miette::bail!("Either a file or --query is required"),
            };

            let query = Query::parse(&content);
            for clause in query.clauses().iter() {
                println!(
                    "{:<9} @{:<4} {}",
                    clause.kind.keyword(),
                    clause.keyword.offset,
                    content[clause.body.offset..clause.body.end()].trim()
                );
            }
            let names = tables::table_names(&query);
            println!("tables: {}", names.join(", "));
            if let Some(misplaced) = query.clauses().first_out_of_order() {
                println!("out of order: {}", misplaced.kind.keyword());
            }

            Ok(false)
        }
    }
}

fn load_knowledge(path: Option<&Path>) -> Result<KnowledgeBase> {
    match path {
        Some(path) => KnowledgeBase::load(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to load knowledge base {}", path.display())),
        None => Ok(KnowledgeBase::builtin()),
    }
}

/// The bundled sample rows only match the builtin schema, so a custom
/// knowledge base without a seed file gets empty tables.
fn open_sandbox(config: &Config, knowledge: &KnowledgeBase) -> Result<SqliteSandbox> {
    let sandbox = match (&config.seed, &config.knowledge_base) {
        (Some(seed), _) => {
            let seed = read_file(seed)?;
            SqliteSandbox::open(knowledge.schema(), Some(&seed))
        }
        (None, None) => SqliteSandbox::sample(knowledge),
        (None, Some(_)) => SqliteSandbox::open(knowledge.schema(), None),
    };
    sandbox
        .into_diagnostic()
        .wrap_err("failed to prepare the query sandbox")
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))
}

/// (display name, SQL text) for every query to analyze
fn collect_inputs(files: &[PathBuf], query: Option<String>) -> Result<Vec<(String, String)>> {
    if let Some(query) = query {
        return Ok(vec![("<query>".to_string(), query)]);
    }

    if files.is_empty() {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .into_diagnostic()?;
        return Ok(vec![("<stdin>".to_string(), content)]);
    }

    let mut paths = Vec::new();
    for pattern in files {
        let pattern_str = pattern.display().to_string();
        if pattern_str.contains('*') {
            for path in glob::glob(&pattern_str).into_diagnostic()?.flatten() {
                paths.push(path);
            }
        } else {
            paths.push(pattern.clone());
        }
    }

    if paths.is_empty() {
        miette::bail!("No query files matched the given patterns");
    }

    paths
        .into_iter()
        .map(|path| Ok((path.display().to_string(), read_file(&path)?)))
        .collect()
}

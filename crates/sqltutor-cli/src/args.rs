//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "sqltutor")]
#[command(author, version, about = "Feedback and study hints for student SQL queries")]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print reports, no summary
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Analyze SQL queries and report findings, suggestions and a learning path
    Check {
        /// SQL files to analyze (supports glob patterns). Reads stdin when
        /// neither files nor --query are given.
        files: Vec<PathBuf>,

        /// Analyze this query text instead of files
        #[arg(long, value_name = "SQL", conflicts_with = "files")]
        query: Option<String>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Knowledge base file (.toml or .json)
        #[arg(short, long = "knowledge-base", value_name = "FILE", env = "SQLTUTOR_KNOWLEDGE_BASE")]
        knowledge_base: Option<PathBuf>,

        /// SQL run in the sandbox after the schema tables are created
        #[arg(long, value_name = "FILE")]
        seed: Option<PathBuf>,

        /// Rules to disable
        #[arg(long, value_name = "RULE")]
        disable: Vec<String>,

        /// Sandbox time limit per query
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Also check the query against a full SQL grammar
        #[arg(long)]
        strict: bool,

        /// Do not run queries against the sandbox
        #[arg(long)]
        no_execute: bool,

        /// Configuration file (defaults to sqltutor.toml in this or a parent directory)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// List the tables and columns of the knowledge base
    Schema {
        #[arg(short, long = "knowledge-base", value_name = "FILE", env = "SQLTUTOR_KNOWLEDGE_BASE")]
        knowledge_base: Option<PathBuf>,
    },

    /// List concepts with difficulty and prerequisites
    Concepts {
        #[arg(short, long = "knowledge-base", value_name = "FILE", env = "SQLTUTOR_KNOWLEDGE_BASE")]
        knowledge_base: Option<PathBuf>,
    },

    /// Show how a query is split into clauses (for debugging)
    Segment {
        /// SQL file to segment
        #[arg(required_unless_present = "query")]
        file: Option<PathBuf>,

        #[arg(long, value_name = "SQL", conflicts_with = "file")]
        query: Option<String>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Human => "human",
            OutputFormat::Json => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_are_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_check() {
        let args = Args::parse_from([
            "sqltutor",
            "-vv",
            "check",
            "--query",
            "SELECT 1",
            "--disable",
            "missing_from",
            "--format",
            "json",
            "--no-execute",
        ]);
        assert_eq!(args.verbose, 2);
        match args.command {
            Command::Check {
                query,
                disable,
                format,
                no_execute,
                ..
            } => {
                assert_eq!(query.as_deref(), Some("SELECT 1"));
                assert_eq!(disable, vec!["missing_from"]);
                assert_eq!(format, Some(OutputFormat::Json));
                assert!(no_execute);
            }
            _ => panic!("expected check"),
        }
    }
}

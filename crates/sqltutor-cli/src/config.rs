//! Configuration file handling

use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};

use crate::args::OutputFormat;

pub const CONFIG_FILE_NAME: &str = "sqltutor.toml";

const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Configuration for sqltutor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Knowledge base file (.toml or .json); the builtin one is used when unset
    pub knowledge_base: Option<PathBuf>,

    /// SQL run in the sandbox after the tables are created
    pub seed: Option<PathBuf>,

    /// Output format (human, json)
    pub format: Option<String>,

    /// Rules to disable (e.g., ["clause_order"])
    #[serde(default)]
    pub disable: Vec<String>,

    /// Sandbox time limit per query, in milliseconds
    pub timeout_ms: Option<u64>,

    /// Parse queries with a full SQL grammar as well
    #[serde(default)]
    pub strict: bool,

    /// Run queries against the sandbox (default: true)
    pub execute: Option<bool>,
}

/// CLI values that take precedence over the configuration file
#[derive(Debug, Default)]
pub struct Overrides<'a> {
    pub knowledge_base: Option<&'a Path>,
    pub seed: Option<&'a Path>,
    pub format: Option<OutputFormat>,
    pub disable: &'a [String],
    pub timeout_ms: Option<u64>,
    pub strict: bool,
    pub no_execute: bool,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).into_diagnostic()?;
        let mut config: Config = toml::from_str(&contents).into_diagnostic()?;
        // relative paths are resolved against the file's directory
        if let Some(dir) = path.parent() {
            config.knowledge_base = config.knowledge_base.map(|p| dir.join(p));
            config.seed = config.seed.map(|p| dir.join(p));
        }
        Ok(config)
    }

    /// Try to find and load sqltutor.toml in current directory or parent directories
    pub fn find_and_load() -> Result<Option<Self>> {
        let mut current_dir = std::env::current_dir().into_diagnostic()?;

        loop {
            let config_path = current_dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                tracing::debug!(path = %config_path.display(), "found config file");
                return Ok(Some(Self::from_file(&config_path)?));
            }

            if !current_dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Merge CLI arguments into configuration.
    /// CLI arguments take precedence over config file values.
    pub fn merge_with_args(mut self, args: Overrides<'_>) -> Self {
        if let Some(path) = args.knowledge_base {
            self.knowledge_base = Some(path.to_path_buf());
        }

        if let Some(path) = args.seed {
            self.seed = Some(path.to_path_buf());
        }

        if let Some(fmt) = args.format {
            self.format = Some(fmt.as_str().to_string());
        }

        if !args.disable.is_empty() {
            self.disable = args.disable.to_vec();
        }

        if args.timeout_ms.is_some() {
            self.timeout_ms = args.timeout_ms;
        }

        if args.strict {
            self.strict = true;
        }

        if args.no_execute {
            self.execute = Some(false);
        }

        self
    }

    pub fn output_format(&self) -> OutputFormat {
        match self.format.as_deref() {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Human,
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn execute(&self) -> bool {
        self.execute.unwrap_or(true)
    }
}

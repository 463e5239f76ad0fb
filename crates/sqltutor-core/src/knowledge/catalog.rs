//! Schema catalog - table and column definitions known to the tutor

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::SqlType;

/// Maximum edit distance for a table name to count as a likely typo
const TYPO_DISTANCE: usize = 2;

/// All tables, keyed by lower-cased name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub tables: IndexMap<String, Table>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, replacing any table with the same name
    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.to_lowercase(), table);
    }

    /// Look up a table by name (case-insensitive)
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_lowercase())
    }

    /// Check if a table exists
    pub fn table_exists(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    /// Get all table keys
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|s| s.as_str()).collect()
    }

    /// Known tables that look like what the user meant by `name`.
    ///
    /// A table matches when one name contains the other, or when the two are
    /// within a small edit distance of each other.
    pub fn similar_tables(&self, name: &str) -> Vec<&str> {
        let wanted = name.to_lowercase();
        self.tables
            .keys()
            .filter(|known| {
                known.contains(&wanted)
                    || wanted.contains(known.as_str())
                    || levenshtein_distance(&wanted, known) <= TYPO_DISTANCE
            })
            .map(|s| s.as_str())
            .collect()
    }
}

/// Table definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    /// Lower-cased column name -> column
    pub columns: IndexMap<String, Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: IndexMap::new(),
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.insert(column.name.to_lowercase(), column);
        self
    }

    /// Get a column by name (case-insensitive)
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.get(&name.to_lowercase())
    }

    /// Check if a column exists
    pub fn column_exists(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    /// Get all column keys
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(|s| s.as_str()).collect()
    }

    /// Columns flagged as primary key, in declaration order
    pub fn primary_key(&self) -> Vec<&Column> {
        self.columns.values().filter(|c| c.is_primary_key).collect()
    }
}

/// Column definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: SqlType,
    pub nullable: bool,
    pub is_primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: SqlType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            is_primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }
}

/// Edit distance between two strings, two-row formulation
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

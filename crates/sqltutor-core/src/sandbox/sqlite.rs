//! In-memory SQLite sandbox

use std::sync::Mutex;
use std::time::Instant;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode};
use tracing::debug;

use super::{CellValue, ExecutionError, ExecutionLimits, ExecutionResult, SandboxExecutor};
use crate::knowledge::{KnowledgeBase, Schema, Table};

/// Rows matching the builtin knowledge base schema
pub const SAMPLE_DATA: &str = include_str!("../../data/sample.sql");

/// SQLite virtual machine steps between deadline checks
const PROGRESS_STEPS: i32 = 1000;

/// An in-memory database built from a schema, read-only once seeded
pub struct SqliteSandbox {
    conn: Mutex<Connection>,
}

impl SqliteSandbox {
    /// Create every schema table, run the optional seed batch, then lock the
    /// connection to read-only.
    pub fn open(schema: &Schema, seed: Option<&str>) -> Result<Self, ExecutionError> {
        let conn = Connection::open_in_memory()?;
        for table in schema.tables.values() {
            conn.execute_batch(&create_table_sql(table))?;
        }
        if let Some(seed) = seed {
            conn.execute_batch(seed)?;
        }
        conn.execute_batch("PRAGMA query_only = ON")?;
        debug!(tables = schema.tables.len(), seeded = seed.is_some(), "opened sandbox");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Sandbox over the knowledge base schema, filled with the bundled sample rows
    pub fn sample(knowledge: &KnowledgeBase) -> Result<Self, ExecutionError> {
        Self::open(knowledge.schema(), Some(SAMPLE_DATA))
    }
}

impl SandboxExecutor for SqliteSandbox {
    fn execute(
        &self,
        sql: &str,
        limits: &ExecutionLimits,
    ) -> Result<ExecutionResult, ExecutionError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ExecutionError::Unavailable("connection lock poisoned".to_string()))?;

        let started = Instant::now();
        let deadline = started + limits.timeout;
        conn.progress_handler(PROGRESS_STEPS, Some(move || Instant::now() >= deadline));
        let result = run(&conn, sql, limits.sample_rows);
        conn.progress_handler(0, None::<fn() -> bool>);

        debug!(elapsed_ms = started.elapsed().as_millis() as u64, ok = result.is_ok(), "executed query");
        result.map_err(|e| match e {
            ExecutionError::Sqlite(ref err)
                if err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) =>
            {
                ExecutionError::Timeout(limits.timeout)
            }
            other => other,
        })
    }
}

fn run(conn: &Connection, sql: &str, sample_rows: usize) -> Result<ExecutionResult, ExecutionError> {
    let mut stmt = conn.prepare(sql.trim())?;
    if !stmt.readonly() {
        return Err(ExecutionError::NotReadOnly);
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let width = columns.len();

    let mut rows = stmt.query([])?;
    let mut sample = Vec::new();
    let mut total_rows = 0;
    while let Some(row) = rows.next()? {
        if sample.len() < sample_rows {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(cell(row.get_ref(i)?));
            }
            sample.push(cells);
        }
        total_rows += 1;
    }

    Ok(ExecutionResult {
        columns,
        rows: sample,
        total_rows,
    })
}

fn cell(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Integer(i),
        ValueRef::Real(f) => CellValue::Real(f),
        ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => CellValue::Blob(b.to_vec()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(table: &Table) -> String {
    let primary_key = table.primary_key();
    let inline_pk = primary_key.len() == 1;

    let mut defs: Vec<String> = table
        .columns
        .values()
        .map(|column| {
            let mut def = format!(
                "{} {}",
                quote_ident(&column.name),
                column.data_type.sqlite_affinity()
            );
            if inline_pk && column.is_primary_key {
                def.push_str(" PRIMARY KEY");
            }
            if !column.nullable {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();

    if primary_key.len() > 1 {
        let names: Vec<String> = primary_key.iter().map(|c| quote_ident(&c.name)).collect();
        defs.push(format!("PRIMARY KEY ({})", names.join(", ")));
    }

    format!("CREATE TABLE {} ({});", quote_ident(&table.name), defs.join(", "))
}

//! Bulk load of a cleaned CSV into a SQLite table.
//!
//! The target table is dropped and recreated on every run, then filled with
//! multi-row `INSERT` batches inside a single transaction.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info};
use rusqlite::{Connection, types::Value as SqlValue};
use serde::Serialize;

use crate::{error::PipelineError, io_utils};

pub const DEFAULT_TABLE: &str = "luxury_housing";
pub const CHUNK_ROWS: usize = 1000;
/// SQLite's default bound-parameter ceiling since 3.32.
const MAX_BOUND_PARAMETERS: usize = 32_766;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Memory,
    File(PathBuf),
}

impl DatabaseTarget {
    /// Accepts `sqlite::memory:`, `sqlite://<path>`, `sqlite:<path>`, or a bare path.
    pub fn parse(url: &str) -> Result<Self, PipelineError> {
        let trimmed = url.trim();
        let rest = if let Some(rest) = trimmed.strip_prefix("sqlite://") {
            rest
        } else if let Some(rest) = trimmed.strip_prefix("sqlite:") {
            rest
        } else if trimmed.contains("://") || trimmed.is_empty() {
            return Err(PipelineError::UnsupportedDatabase {
                url: url.to_string(),
            });
        } else {
            trimmed
        };
        match rest {
            ":memory:" | "" => Ok(DatabaseTarget::Memory),
            path => Ok(DatabaseTarget::File(PathBuf::from(path))),
        }
    }

    pub fn open(&self) -> Result<Connection> {
        match self {
            DatabaseTarget::Memory => {
                Connection::open_in_memory().context("Opening in-memory database")
            }
            DatabaseTarget::File(path) => {
                Connection::open(path).with_context(|| format!("Opening database {path:?}"))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    fn keyword(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TypeCandidate {
    possible_integer: bool,
    possible_real: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_integer: true,
            possible_real: true,
        }
    }

    fn observe(&mut self, field: &str) {
        if field.is_empty() {
            return;
        }
        if self.possible_integer && field.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_real && field.parse::<f64>().is_err() {
            self.possible_real = false;
        }
    }

    fn decide(&self) -> SqlType {
        if self.possible_integer {
            SqlType::Integer
        } else if self.possible_real {
            SqlType::Real
        } else {
            SqlType::Text
        }
    }
}

/// Column types that hold every non-empty cell of each column.
pub fn infer_column_types(width: usize, rows: &[Vec<String>]) -> Vec<SqlType> {
    let mut candidates = vec![TypeCandidate::new(); width];
    for row in rows {
        for (candidate, field) in candidates.iter_mut().zip(row) {
            candidate.observe(field);
        }
    }
    candidates.iter().map(TypeCandidate::decide).collect()
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(field: &str, ty: SqlType) -> SqlValue {
    if field.is_empty() {
        return SqlValue::Null;
    }
    match ty {
        SqlType::Integer => field
            .parse::<i64>()
            .map(SqlValue::Integer)
            .unwrap_or_else(|_| SqlValue::Text(field.to_string())),
        SqlType::Real => field
            .parse::<f64>()
            .map(SqlValue::Real)
            .unwrap_or_else(|_| SqlValue::Text(field.to_string())),
        SqlType::Text => SqlValue::Text(field.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub table: String,
    pub rows: usize,
    pub batches: usize,
    pub columns: Vec<(String, SqlType)>,
}

/// Replaces `table` in the database at `db_url` with the contents of `input`.
pub fn load_csv(input: &Path, db_url: &str, table: &str) -> Result<LoadReport> {
    let target = DatabaseTarget::parse(db_url)?;
    let mut reader = io_utils::open_csv_reader_from_path(input)?;
    let headers = io_utils::reader_headers(&mut reader, input)?;
    let rows = io_utils::read_rows(&mut reader, input, headers.len())?;
    let mut conn = target.open()?;
    let report = load_rows(&mut conn, table, &headers, &rows)?;
    info!(
        "Loaded {} row(s) into '{}' in {} batch(es)",
        report.rows, report.table, report.batches
    );
    Ok(report)
}

/// Drops and recreates `table`, then inserts `rows` in batches within one transaction.
pub fn load_rows(
    conn: &mut Connection,
    table: &str,
    headers: &[String],
    rows: &[Vec<String>],
) -> Result<LoadReport> {
    let types = infer_column_types(headers.len(), rows);
    let table_ident = quote_identifier(table);
    let column_defs = headers
        .iter()
        .zip(&types)
        .map(|(name, ty)| format!("{} {}", quote_identifier(name), ty.keyword()))
        .join(", ");
    let column_list = headers.iter().map(|h| quote_identifier(h)).join(", ");

    let tx = conn.transaction().context("Starting load transaction")?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table_ident}; CREATE TABLE {table_ident} ({column_defs});"
    ))
    .with_context(|| format!("Recreating table {table_ident}"))?;

    let chunk_rows = CHUNK_ROWS
        .min(MAX_BOUND_PARAMETERS / headers.len().max(1))
        .max(1);
    let row_placeholder = format!("({})", vec!["?"; headers.len()].join(", "));
    let mut batches = 0usize;
    for chunk in rows.chunks(chunk_rows) {
        let sql = format!(
            "INSERT INTO {table_ident} ({column_list}) VALUES {}",
            vec![row_placeholder.as_str(); chunk.len()].join(", ")
        );
        let params = chunk
            .iter()
            .flat_map(|row| row.iter().zip(&types).map(|(field, ty)| to_sql_value(field, *ty)))
            .collect::<Vec<_>>();
        tx.execute(&sql, rusqlite::params_from_iter(params))
            .with_context(|| format!("Inserting batch {} into {table_ident}", batches + 1))?;
        batches += 1;
        debug!("Inserted batch {batches} ({} row(s))", chunk.len());
    }
    tx.commit().context("Committing load transaction")?;

    Ok(LoadReport {
        table: table.to_string(),
        rows: rows.len(),
        batches,
        columns: headers.iter().cloned().zip(types).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_accepts_sqlite_urls_and_paths() {
        assert_eq!(
            DatabaseTarget::parse("sqlite::memory:").unwrap(),
            DatabaseTarget::Memory
        );
        assert_eq!(
            DatabaseTarget::parse("sqlite:///tmp/listings.db").unwrap(),
            DatabaseTarget::File(PathBuf::from("/tmp/listings.db"))
        );
        assert_eq!(
            DatabaseTarget::parse("listings.db").unwrap(),
            DatabaseTarget::File(PathBuf::from("listings.db"))
        );
        assert!(matches!(
            DatabaseTarget::parse("postgresql://user@host/db"),
            Err(PipelineError::UnsupportedDatabase { .. })
        ));
    }

    #[test]
    fn infer_column_types_narrows_per_column() {
        let rows = vec![
            strings(&["1", "1.5", "a", ""]),
            strings(&["2", "2", "3", ""]),
        ];
        assert_eq!(
            infer_column_types(4, &rows),
            vec![SqlType::Integer, SqlType::Real, SqlType::Text, SqlType::Integer]
        );
    }

    #[test]
    fn load_rows_replaces_existing_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE listings (stale TEXT); INSERT INTO listings VALUES ('x');")
            .unwrap();
        let headers = strings(&["property_id", "ticket_price_cr"]);
        let rows = vec![strings(&["P1", "5.2"]), strings(&["P2", ""])];
        let report = load_rows(&mut conn, "listings", &headers, &rows).unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(report.batches, 1);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM listings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
        let nulls: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM listings WHERE ticket_price_cr IS NULL",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(nulls, 1);
    }

    #[test]
    fn load_rows_splits_into_fixed_size_batches() {
        let mut conn = Connection::open_in_memory().unwrap();
        let headers = strings(&["id"]);
        let rows = (0..2_500).map(|i| vec![i.to_string()]).collect::<Vec<_>>();
        let report = load_rows(&mut conn, DEFAULT_TABLE, &headers, &rows).unwrap();
        assert_eq!(report.batches, 3);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM luxury_housing", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2_500);
    }
}

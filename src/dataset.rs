//! In-memory snapshot of a cleaned listing table.

use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    data::{Cell, Value, parse_cell},
    error::PipelineError,
    io_utils,
    schema::{self, FieldKind, ResolvedSchema, Schema},
};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_DATA_FILE: &str = "cleaned_luxury_housing.csv";

#[derive(Debug, Clone)]
pub struct Dataset {
    headers: Vec<String>,
    schema: ResolvedSchema,
    rows: Vec<Vec<Cell>>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, schema: ResolvedSchema, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            headers,
            schema,
            rows,
        }
    }

    /// Reads a cleaned CSV and types every cell against `schema`.
    pub fn read(path: &Path, schema: &Schema) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader_from_path(path)?;
        let headers = io_utils::reader_headers(&mut reader, path)?;
        let resolved = schema
            .resolve(&headers)
            .with_context(|| format!("Validating columns of {path:?}"))?;
        let raw_rows = io_utils::read_rows(&mut reader, path, headers.len())?;
        let rows = raw_rows
            .iter()
            .map(|raw| {
                raw.iter()
                    .enumerate()
                    .map(|(idx, field)| parse_cell(field, resolved.kind_at(idx)))
                    .collect()
            })
            .collect::<Vec<Vec<Cell>>>();
        debug!("Read {} row(s) x {} column(s) from {path:?}", rows.len(), headers.len());
        Ok(Self::new(headers, resolved, rows))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column)).and_then(|c| c.as_ref())
    }

    pub fn number(&self, row: usize, column: usize) -> Option<f64> {
        self.cell(row, column).and_then(Value::as_number)
    }

    /// Drops rows without a strictly positive price in both currency units.
    pub fn retain_positive_prices(&mut self) -> Result<usize> {
        let cr = self.schema.field(schema::PRICE_CR, FieldKind::Numeric)?;
        let inr = self.schema.field(schema::PRICE_INR, FieldKind::Numeric)?;
        let before = self.rows.len();
        let positive = |cell: Option<&Cell>| {
            matches!(cell, Some(Some(Value::Number(n))) if *n > 0.0)
        };
        self.rows
            .retain(|row| positive(row.get(inr)) && positive(row.get(cr)));
        let dropped = before - self.rows.len();
        if dropped > 0 {
            info!("Dropped {dropped} row(s) without a positive price");
        }
        Ok(dropped)
    }
}

/// Locates the cleaned dataset the views read from.
///
/// An explicit path wins. Otherwise `data/cleaned_luxury_housing.csv` is tried
/// relative to the working directory, then relative to the directory above the
/// one holding the executable.
pub fn resolve_dataset_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(PipelineError::not_found(path).into());
    }
    let relative = Path::new(DEFAULT_DATA_DIR).join(DEFAULT_DATA_FILE);
    let mut candidates = vec![relative.clone()];
    if let Some(root) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
    {
        candidates.push(root.join(&relative));
    }
    for candidate in &candidates {
        debug!("Looking for cleaned dataset at {candidate:?}");
        if candidate.exists() {
            return Ok(candidate.clone());
        }
    }
    Err(PipelineError::not_found(&relative).into())
}

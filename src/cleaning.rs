//! Raw listing CSV → cleaned listing CSV.
//!
//! The run reads every row, rewrites the header into canonical identifiers,
//! coerces `ticket_price_cr` to a number and derives `ticket_price_inr` from it,
//! then overwrites the destination with the full table. Rows whose price cannot
//! be parsed are kept with both price fields empty.

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;

use crate::{
    coerce::{self, CoercionGap},
    io_utils,
    normalize::{disambiguate_headers, normalize_headers},
    schema::{PRICE_CR, PRICE_INR},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub rows: usize,
    pub headers: Vec<String>,
    /// Rows whose price was parsed into a number.
    pub coerced: usize,
    pub gaps: Vec<CoercionGap>,
}

/// A raw table after header normalization, before it is written out.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn clean(input: &Path, output: &Path) -> Result<CleaningReport> {
    info!("Cleaning {input:?} -> {output:?}");
    let mut reader = io_utils::open_csv_reader_from_path(input)?;
    let raw_headers = io_utils::reader_headers(&mut reader, input)?;
    let raw_rows = io_utils::read_rows(&mut reader, input, raw_headers.len())?;
    debug!("Read {} raw row(s) from {input:?}", raw_rows.len());

    let (table, report) = clean_table(&raw_headers, raw_rows);
    write_table(&table, output)?;

    info!(
        "Wrote {} row(s) x {} column(s) to {output:?}",
        report.rows,
        report.headers.len()
    );
    if !report.gaps.is_empty() {
        info!(
            "{} row(s) kept with an empty {PRICE_CR} (no parseable amount)",
            report.gaps.len()
        );
    }
    Ok(report)
}

/// Normalizes headers and coerces the price column of an in-memory table.
pub fn clean_table(raw_headers: &[String], mut rows: Vec<Vec<String>>) -> (CleanedTable, CleaningReport) {
    let mut headers = disambiguate_headers(normalize_headers(raw_headers));
    let mut report = CleaningReport {
        rows: rows.len(),
        ..CleaningReport::default()
    };

    if let Some(price_idx) = headers.iter().position(|h| h == PRICE_CR) {
        let derived_idx = match headers.iter().position(|h| h == PRICE_INR) {
            Some(idx) => idx,
            None => {
                headers.push(PRICE_INR.to_string());
                headers.len() - 1
            }
        };
        for (idx, row) in rows.iter_mut().enumerate() {
            row.resize(headers.len(), String::new());
            let amount = coerce::coerce_amount(&row[price_idx]);
            match amount {
                Some(_) => report.coerced += 1,
                None => {
                    debug!("Row {}: no amount in {:?}", idx + 1, row[price_idx]);
                    report.gaps.push(CoercionGap {
                        row: idx + 1,
                        raw: row[price_idx].clone(),
                    });
                }
            }
            row[price_idx] = coerce::format_optional(amount);
            row[derived_idx] = coerce::format_optional(coerce::to_base_currency(amount));
        }
    } else {
        debug!("No {PRICE_CR} column; prices left untouched");
    }

    report.headers = headers.clone();
    (CleanedTable { headers, rows }, report)
}

pub fn write_table(table: &CleanedTable, output: &Path) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(output)?;
    writer
        .write_record(table.headers.iter())
        .context("Writing output headers")?;
    for (idx, row) in table.rows.iter().enumerate() {
        writer
            .write_record(row.iter())
            .with_context(|| format!("Writing output row {}", idx + 2))?;
    }
    writer.flush().context("Flushing output writer")?;
    Ok(())
}

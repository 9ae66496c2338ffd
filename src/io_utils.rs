//! I/O utilities for CSV reading and writing.
//!
//! All file I/O in listing-pipeline flows through this module. It provides:
//!
//! - **Reader construction**: `open_csv_reader_from_path` maps a missing or
//!   unreadable file to [`PipelineError::InputNotFound`].
//! - **Decoding**: byte records are decoded as UTF-8 through `encoding_rs`;
//!   undecodable bytes are reported as [`PipelineError::MalformedInput`].
//! - **Writer construction**: `open_csv_writer` truncates the destination, or
//!   writes to stdout for the `-` path.
//! - **Quoting**: output uses `QuoteStyle::Necessary` so absent values stay
//!   empty fields.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result};
use csv::QuoteStyle;
use encoding_rs::UTF_8;

use crate::error::PipelineError;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn open_csv_reader<R>(reader: R) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(DEFAULT_CSV_DELIMITER)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path) -> Result<csv::Reader<Box<dyn Read>>> {
    let file = File::open(path).map_err(|_| PipelineError::not_found(path))?;
    let reader: Box<dyn Read> = Box::new(BufReader::new(file));
    Ok(open_csv_reader(reader))
}

pub fn open_csv_writer(path: &Path) -> Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = if is_dash(path) {
        Box::new(std::io::stdout())
    } else {
        Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Creating output file {path:?}"))?,
        ))
    };

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(DEFAULT_CSV_DELIMITER)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(base))
}

pub fn decode_bytes(bytes: &[u8]) -> Option<String> {
    let (text, had_errors) = UTF_8.decode_without_bom_handling(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, path: &Path, line: usize) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| {
            decode_bytes(field).ok_or_else(|| {
                PipelineError::malformed(path, format!("row {line} is not valid UTF-8")).into()
            })
        })
        .collect()
}

/// Reads and decodes the header row, stripping a leading UTF-8 byte order mark.
pub fn reader_headers<R>(reader: &mut csv::Reader<R>, path: &Path) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader
        .byte_headers()
        .map_err(|err| PipelineError::malformed(path, err.to_string()))?
        .clone();
    if headers.is_empty() {
        return Err(PipelineError::malformed(path, "no header row").into());
    }
    let mut decoded = decode_record(&headers, path, 1)?;
    if let Some(first) = decoded.first_mut() {
        if first.starts_with('\u{feff}') {
            first.remove(0);
        }
    }
    Ok(decoded)
}

/// Streams every data row, padding short rows to the header width.
///
/// A row wider than the header cannot be aligned to any column and is rejected.
pub fn read_rows<R>(reader: &mut csv::Reader<R>, path: &Path, width: usize) -> Result<Vec<Vec<String>>>
where
    R: Read,
{
    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let line = idx + 2;
        let record = record.map_err(|err| PipelineError::malformed(path, err.to_string()))?;
        if record.len() > width {
            return Err(PipelineError::malformed(
                path,
                format!(
                    "row {line} has {} field(s) but the header declares {width}",
                    record.len()
                ),
            )
            .into());
        }
        let mut decoded = decode_record(&record, path, line)?;
        decoded.resize(width, String::new());
        rows.push(decoded);
    }
    Ok(rows)
}

use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::{data::cell_to_csv, filter::Selection, io_utils};

/// File name the filtered-table download is offered under.
pub const EXPORT_FILE_NAME: &str = "luxury_housing_filtered.csv";

/// Writes the selected rows, in table order, with the dataset's headers.
pub fn export_selection(selection: &Selection<'_>, output: &Path) -> Result<usize> {
    let dataset = selection.dataset();
    let mut writer = io_utils::open_csv_writer(output)?;
    writer
        .write_record(dataset.headers().iter())
        .context("Writing export headers")?;
    for &row in selection.rows() {
        let record = dataset.rows()[row].iter().map(cell_to_csv);
        writer
            .write_record(record)
            .with_context(|| format!("Writing export row {}", row + 2))?;
    }
    writer.flush().context("Flushing export writer")?;
    info!("Exported {} row(s) to {output:?}", selection.len());
    Ok(selection.len())
}

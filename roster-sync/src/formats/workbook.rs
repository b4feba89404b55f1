//! Spreadsheet workbook reading (xlsx, xls, ods) via calamine

use crate::engine::value::{excel_serial_to_date, Cell};
use calamine::{open_workbook_auto, Data, Reader};
use roster_common::{Error, Result};
use std::path::Path;
use tracing::debug;

/// Read the first worksheet of a workbook as rows of cells
pub fn read_workbook(path: &Path) -> Result<Vec<Vec<Cell>>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        Error::SchemaValidation(format!("Failed to open workbook {}: {}", path.display(), e))
    })?;

    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::SchemaValidation("workbook has no worksheets".to_string()))?;
    debug!("Reading worksheet '{}' from {}", first_sheet, path.display());

    let range = workbook.worksheet_range(&first_sheet).map_err(|e| {
        Error::SchemaValidation(format!("Failed to read worksheet '{}': {}", first_sheet, e))
    })?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect())
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::Number(dt.as_f64())),
    }
}

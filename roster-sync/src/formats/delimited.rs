//! CSV reading and writing

use crate::engine::value::Cell;
use roster_common::{Error, Result};

/// Parse CSV bytes into rows of cells; ragged rows are allowed
pub fn parse_csv(data: &[u8]) -> Result<Vec<Vec<Cell>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::SchemaValidation(format!("CSV parse failed: {}", e)))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

/// Write a cell matrix as CSV
pub fn write_csv(rows: &[Vec<Cell>]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    for row in rows {
        writer
            .write_record(row.iter().map(|c| c.to_string()))
            .map_err(|e| Error::Internal(format!("CSV write failed: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("CSV flush failed: {}", e)))
}

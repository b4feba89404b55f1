//! Physical file formats
//!
//! Import files are read into a [`RawPayload`]; exports are rendered from the
//! serializer's matrix or document into bytes. Formats are chosen by file
//! extension on the way in and by [`ExportFormat`] on the way out.

pub mod delimited;
pub mod json;
pub mod workbook;

use crate::engine::export::{to_spreadsheet, to_structured};
use crate::engine::normalize::RawPayload;
use crate::engine::schema::Schema;
use crate::engine::value::Record;
use roster_common::{Error, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Read an import file into a raw payload based on its extension
pub fn read_payload(path: &Path) -> Result<RawPayload> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let payload = match extension.as_str() {
        "csv" => RawPayload::Spreadsheet(delimited::parse_csv(&std::fs::read(path)?)?),
        "xlsx" | "xlsm" | "xls" | "ods" => RawPayload::Spreadsheet(workbook::read_workbook(path)?),
        "json" => RawPayload::Structured(json::parse_json(&std::fs::read(path)?)?),
        _ => {
            return Err(Error::InvalidInput(format!(
                "Unsupported file type '.{}' for {} (expected .csv, .xlsx, .xls, .ods or .json)",
                extension,
                path.display()
            )))
        }
    };

    info!("Read {} payload from {}", payload.kind(), path.display());
    Ok(payload)
}

/// Target encoding of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Spreadsheet encoding written as CSV
    Csv,
    /// Structured-text encoding written as JSON
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "spreadsheet" => Ok(ExportFormat::Csv),
            "json" | "structured" => Ok(ExportFormat::Json),
            other => Err(Error::InvalidInput(format!(
                "Unknown export format '{}' (expected csv or json)",
                other
            ))),
        }
    }
}

/// Serialize `records` in `format`
pub fn export_bytes(schema: &Schema, records: &[Record], format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => delimited::write_csv(&to_spreadsheet(schema, records)),
        ExportFormat::Json => json::write_json(&to_structured(schema, records)),
    }
}

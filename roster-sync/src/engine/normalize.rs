//! Normalizer: raw file payload to canonical records
//!
//! Both physical encodings funnel through one contract. Tabular payloads use
//! their first row as headers; structured payloads carry an array of objects
//! under the schema's base name. In both cases headers are resolved through
//! the schema, values are coerced by field kind, blank values become absent,
//! and rows lacking a required key are excluded and reported.

use crate::engine::schema::{FieldKind, Schema};
use crate::engine::value::{
    excel_serial_to_date, format_number, parse_date, parse_number, Cell, Record, Value,
};
use roster_common::config::OmissionPolicy;
use roster_common::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Parsed but not yet normalized file contents
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// Rows of cells, header row first
    Spreadsheet(Vec<Vec<Cell>>),
    /// JSON-like object graph with an array under the schema's base name
    Structured(serde_json::Value),
}

impl RawPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            RawPayload::Spreadsheet(_) => "spreadsheet",
            RawPayload::Structured(_) => "structured",
        }
    }
}

/// A row excluded because a required key was absent or blank
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowOmission {
    /// 1-based source position: spreadsheet row (header is row 1), or array
    /// position for structured input (first entry is row 1)
    pub row: usize,
    pub missing: Vec<String>,
}

/// Non-fatal observations made while normalizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizeWarning {
    /// Two headers resolved to the same key; the later one was used
    DuplicateHeader { key: String, header: String },
    /// Date field could not be parsed; the field was left absent
    UnparseableDate { row: usize, key: String, raw: String },
    /// Number field could not be parsed; the text was kept
    UnparseableNumber { row: usize, key: String, raw: String },
    /// Nested array/object value in structured input was skipped
    IgnoredValue { row: usize, key: String },
}

impl fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeWarning::DuplicateHeader { key, header } => {
                write!(f, "duplicate column for '{}' ('{}' used)", key, header)
            }
            NormalizeWarning::UnparseableDate { row, key, raw } => {
                write!(f, "row {}: '{}' is not a date for '{}', ignored", row, raw, key)
            }
            NormalizeWarning::UnparseableNumber { row, key, raw } => {
                write!(f, "row {}: '{}' is not a number for '{}', kept as text", row, raw, key)
            }
            NormalizeWarning::IgnoredValue { row, key } => {
                write!(f, "row {}: nested value for '{}' ignored", row, key)
            }
        }
    }
}

/// Normalizer output: accepted records in source order plus what was set aside
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Normalized {
    pub records: Vec<Record>,
    pub omissions: Vec<RowOmission>,
    pub warnings: Vec<NormalizeWarning>,
}

/// Normalize a payload against `schema`
///
/// Returns `SchemaValidation` for structurally unusable input and, under
/// [`OmissionPolicy::Fatal`], `RequiredFieldMissing` if any row was excluded.
pub fn normalize(
    schema: &Schema,
    payload: &RawPayload,
    policy: OmissionPolicy,
) -> Result<Normalized> {
    let normalized = match payload {
        RawPayload::Spreadsheet(rows) => normalize_rows(schema, rows)?,
        RawPayload::Structured(doc) => normalize_document(schema, doc)?,
    };

    debug!(
        "Normalized {} payload for '{}': {} records, {} omitted, {} warnings",
        payload.kind(),
        schema.base_name(),
        normalized.records.len(),
        normalized.omissions.len(),
        normalized.warnings.len()
    );

    if !normalized.omissions.is_empty() {
        warn!(
            "{} {} row(s) excluded for missing required fields",
            normalized.omissions.len(),
            schema.base_name()
        );
        if policy == OmissionPolicy::Fatal {
            let first = &normalized.omissions[0];
            return Err(Error::RequiredFieldMissing {
                count: normalized.omissions.len(),
                first_row: first.row,
                missing: first.missing.join(", "),
            });
        }
    }

    Ok(normalized)
}

fn normalize_rows(schema: &Schema, rows: &[Vec<Cell>]) -> Result<Normalized> {
    let header = rows
        .first()
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .ok_or_else(|| Error::SchemaValidation("missing header row".to_string()))?;

    let mut out = Normalized::default();

    // Column index -> canonical key; for duplicates the last column wins
    let mut columns: Vec<Option<String>> = vec![None; header.len()];
    let mut key_columns: HashMap<String, usize> = HashMap::new();
    for (idx, cell) in header.iter().enumerate() {
        let label = cell.to_string();
        let Some(key) = schema.resolve_header(&label) else {
            if !cell.is_empty() {
                debug!("Ignoring unrecognized column '{}'", label.trim());
            }
            continue;
        };
        if let Some(previous) = key_columns.insert(key.to_string(), idx) {
            columns[previous] = None;
            out.warnings.push(NormalizeWarning::DuplicateHeader {
                key: key.to_string(),
                header: label.trim().to_string(),
            });
        }
        columns[idx] = Some(key.to_string());
    }

    if key_columns.is_empty() {
        return Err(Error::SchemaValidation(format!(
            "header row has no recognized {} columns",
            schema.base_name()
        )));
    }
    if !key_columns.contains_key(schema.primary_key()) {
        return Err(Error::SchemaValidation(format!(
            "header row has no column for primary key '{}'",
            schema.primary_key()
        )));
    }

    for (offset, row) in rows.iter().enumerate().skip(1) {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        let row_number = offset + 1;

        let mut record = Record::new();
        for (cell, column) in row.iter().zip(columns.iter()) {
            let Some(key) = column else { continue };
            if let Some(value) = coerce(schema, key, cell, row_number, &mut out.warnings) {
                record.insert(key.clone(), value);
            }
        }

        accept(schema, record, row_number, &mut out);
    }

    Ok(out)
}

fn normalize_document(schema: &Schema, doc: &serde_json::Value) -> Result<Normalized> {
    let root = doc.as_object().ok_or_else(|| {
        Error::SchemaValidation("structured input must be an object".to_string())
    })?;
    let entries = root
        .get(schema.base_name())
        .ok_or_else(|| {
            Error::SchemaValidation(format!(
                "missing top-level key '{}'",
                schema.base_name()
            ))
        })?
        .as_array()
        .ok_or_else(|| {
            Error::SchemaValidation(format!("'{}' must be an array", schema.base_name()))
        })?;

    let mut out = Normalized::default();

    for (idx, entry) in entries.iter().enumerate() {
        let row_number = idx + 1;
        let object = entry.as_object().ok_or_else(|| {
            Error::SchemaValidation(format!(
                "{}[{}] is not an object",
                schema.base_name(),
                idx
            ))
        })?;

        let mut record = Record::new();
        let mut sources: HashMap<&str, &str> = HashMap::new();
        for (field, raw) in object {
            let Some(key) = schema.resolve_header(field) else {
                continue;
            };
            if sources.insert(key, field.as_str()).is_some() {
                out.warnings.push(NormalizeWarning::DuplicateHeader {
                    key: key.to_string(),
                    header: field.clone(),
                });
                // Last occurrence wins, including when it is blank
                record.remove(key);
            }

            let cell = match raw {
                serde_json::Value::Null => Cell::Empty,
                serde_json::Value::Bool(b) => Cell::Bool(*b),
                serde_json::Value::Number(n) => match n.as_f64() {
                    Some(f) => Cell::Number(f),
                    None => Cell::Text(n.to_string()),
                },
                serde_json::Value::String(s) => Cell::Text(s.clone()),
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                    out.warnings.push(NormalizeWarning::IgnoredValue {
                        row: row_number,
                        key: key.to_string(),
                    });
                    continue;
                }
            };

            if let Some(value) = coerce(schema, key, &cell, row_number, &mut out.warnings) {
                record.insert(key.to_string(), value);
            }
        }

        accept(schema, record, row_number, &mut out);
    }

    Ok(out)
}

fn accept(schema: &Schema, record: Record, row: usize, out: &mut Normalized) {
    let missing = schema.missing_required(&record);
    if missing.is_empty() {
        out.records.push(record);
    } else {
        debug!("Row {} excluded, missing {:?}", row, missing);
        out.omissions.push(RowOmission { row, missing });
    }
}

/// Coerce one raw cell into the field's value type; blank cells are absent
fn coerce(
    schema: &Schema,
    key: &str,
    cell: &Cell,
    row: usize,
    warnings: &mut Vec<NormalizeWarning>,
) -> Option<Value> {
    if cell.is_empty() {
        return None;
    }

    match schema.field_kind(key) {
        FieldKind::Text => match cell {
            Cell::Number(n) => Some(Value::Text(format_number(*n))),
            other => Value::text(&other.to_string()),
        },
        FieldKind::Number => match cell {
            Cell::Number(n) => Some(Value::Number(*n)),
            other => {
                let raw = other.to_string();
                match parse_number(&raw) {
                    Some(n) => Some(Value::Number(n)),
                    None => {
                        warnings.push(NormalizeWarning::UnparseableNumber {
                            row,
                            key: key.to_string(),
                            raw: raw.trim().to_string(),
                        });
                        Value::text(&raw)
                    }
                }
            }
        },
        FieldKind::Date => {
            let parsed = match cell {
                Cell::Date(d) => Some(*d),
                Cell::Number(n) => excel_serial_to_date(*n),
                other => parse_date(&other.to_string()),
            };
            if parsed.is_none() {
                warnings.push(NormalizeWarning::UnparseableDate {
                    row,
                    key: key.to_string(),
                    raw: cell.to_string().trim().to_string(),
                });
            }
            parsed.map(Value::Date)
        }
    }
}

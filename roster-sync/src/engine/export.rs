//! Serializer: authoritative collection to export documents
//!
//! Column order and labels come from the schema's export columns, so two
//! exports of the same collection are identical. Both documents re-import onto
//! the same canonical fields.

use crate::engine::schema::Schema;
use crate::engine::value::{Cell, Record};
use serde_json::{Map, Value as JsonValue};

/// Header row of human-readable labels followed by one row per record
pub fn to_spreadsheet(schema: &Schema, records: &[Record]) -> Vec<Vec<Cell>> {
    let columns = schema.export_columns();

    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(
        columns
            .iter()
            .map(|c| Cell::Text(c.label.clone()))
            .collect(),
    );

    for record in records {
        rows.push(
            columns
                .iter()
                .map(|c| record.get(&c.key).map(Cell::from).unwrap_or(Cell::Empty))
                .collect(),
        );
    }

    rows
}

/// `{ <base_name>: [ { <export fields> }, ... ] }`
///
/// Records are minimized to the export columns; absent fields are omitted and
/// anything outside the schema's export set never leaves the store.
pub fn to_structured(schema: &Schema, records: &[Record]) -> JsonValue {
    let entries = records
        .iter()
        .map(|record| {
            let mut object = Map::new();
            for column in schema.export_columns() {
                if let Some(value) = record.get(&column.key) {
                    object.insert(column.key.clone(), value.to_json());
                }
            }
            JsonValue::Object(object)
        })
        .collect();

    let mut root = Map::new();
    root.insert(schema.base_name().to_string(), JsonValue::Array(entries));
    JsonValue::Object(root)
}

//! Structured-text (JSON) reading and writing

use roster_common::{Error, Result};

pub fn parse_json(data: &[u8]) -> Result<serde_json::Value> {
    serde_json::from_slice(data)
        .map_err(|e| Error::SchemaValidation(format!("JSON parse failed: {}", e)))
}

pub fn write_json(doc: &serde_json::Value) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(doc)
        .map_err(|e| Error::Internal(format!("JSON write failed: {}", e)))?;
    bytes.push(b'\n');
    Ok(bytes)
}

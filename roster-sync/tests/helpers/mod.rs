//! Shared test utilities for roster-sync integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use roster_common::{Error, Result};
use roster_sync::engine::value::Cell;
use roster_sync::{RawPayload, Record, RecordStore, Schema, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-memory record store keyed by (record type, identity key)
///
/// Keeps insertion order so `load_all` is stable like the SQLite store.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, Vec<(String, Record)>>>,
    upsert_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seeded(schema: &Schema, records: Vec<Record>) -> Self {
        let store = Self::new();
        store.upsert(schema, &records).await.unwrap();
        store.upsert_calls.store(0, Ordering::SeqCst);
        store
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load_all(&self, schema: &Schema) -> Result<Vec<Record>> {
        let records = self.records.read().await;
        Ok(records
            .get(schema.base_name())
            .map(|rows| rows.iter().map(|(_, r)| r.clone()).collect())
            .unwrap_or_default())
    }

    async fn upsert(&self, schema: &Schema, records: &[Record]) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut all = self.records.write().await;
        let rows = all.entry(schema.base_name().to_string()).or_default();
        for record in records {
            let key = schema
                .record_key(record)
                .ok_or_else(|| Error::InvalidInput("record without primary key".into()))?;
            match rows.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => *existing = record.clone(),
                None => rows.push((key, record.clone())),
            }
        }
        Ok(())
    }
}

/// Store whose writes always fail; reads return a fixed collection
pub struct FailingStore {
    pub existing: Vec<Record>,
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn load_all(&self, _schema: &Schema) -> Result<Vec<Record>> {
        Ok(self.existing.clone())
    }

    async fn upsert(&self, _schema: &Schema, _records: &[Record]) -> Result<()> {
        Err(Error::Internal("database is locked".to_string()))
    }
}

/// Spreadsheet payload from string cells; empty strings become empty cells
pub fn sheet(rows: &[&[&str]]) -> RawPayload {
    RawPayload::Spreadsheet(
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|c| {
                        if c.is_empty() {
                            Cell::Empty
                        } else {
                            Cell::Text(c.to_string())
                        }
                    })
                    .collect()
            })
            .collect(),
    )
}

/// Record from (key, value) pairs
pub fn record(fields: &[(&str, Value)]) -> Record {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub fn applicant(utorid: &str, first: &str, last: &str, email: &str) -> Record {
    record(&[
        ("utorid", text(utorid)),
        ("first_name", text(first)),
        ("last_name", text(last)),
        ("email", text(email)),
    ])
}

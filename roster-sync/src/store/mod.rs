//! Persistence collaborator
//!
//! The engine never mutates the authoritative collection itself. Confirmed
//! batches are handed to a [`RecordStore`], which upserts them by primary key
//! and supplies the refreshed collection afterwards.

pub mod sqlite;

pub use sqlite::SqliteRecordStore;

use crate::engine::schema::Schema;
use crate::engine::value::Record;
use async_trait::async_trait;
use roster_common::Result;

/// Authoritative storage of records, keyed by primary key
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Current collection for `schema`, in a stable order
    async fn load_all(&self, schema: &Schema) -> Result<Vec<Record>>;

    /// Insert or replace `records` by primary key as one atomic batch
    async fn upsert(&self, schema: &Schema, records: &[Record]) -> Result<()>;
}

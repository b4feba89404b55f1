//! SQLite-backed record store
//!
//! Records live in the generic `records` table as JSON bodies keyed by
//! `(record_type, record_key)`. Bookkeeping timestamps are columns, never
//! record fields, so they cannot leak into diffs or exports.

use crate::engine::schema::Schema;
use crate::engine::value::Record;
use crate::store::RecordStore;
use async_trait::async_trait;
use roster_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of stored records for `schema`
    pub async fn count(&self, schema: &Schema) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE record_type = ?")
            .bind(schema.base_name())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn load_all(&self, schema: &Schema) -> Result<Vec<Record>> {
        let rows = sqlx::query(
            "SELECT record_key, body FROM records WHERE record_type = ? ORDER BY rowid",
        )
        .bind(schema.base_name())
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.get("record_key");
            let body: String = row.get("body");
            let record: Record = serde_json::from_str(&body).map_err(|e| {
                Error::Internal(format!(
                    "Failed to deserialize {} '{}': {}",
                    schema.base_name(),
                    key,
                    e
                ))
            })?;
            records.push(record);
        }

        debug!("Loaded {} {} records", records.len(), schema.base_name());
        Ok(records)
    }

    async fn upsert(&self, schema: &Schema, records: &[Record]) -> Result<()> {
        // Prepare all rows BEFORE opening the transaction
        let now = roster_common::time::now_rfc3339();
        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            let key = schema.record_key(record).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "{} record without '{}' cannot be stored",
                    schema.base_name(),
                    schema.primary_key()
                ))
            })?;
            let body = serde_json::to_string(record)
                .map_err(|e| Error::Internal(format!("Failed to serialize record: {}", e)))?;
            prepared.push((key, body));
        }

        let mut tx = self.pool.begin().await?;
        for (key, body) in &prepared {
            sqlx::query(
                r#"
                INSERT INTO records (record_type, record_key, body, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(record_type, record_key) DO UPDATE SET
                    body = excluded.body,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(schema.base_name())
            .bind(key)
            .bind(body)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!("Upserted {} {} records", prepared.len(), schema.base_name());
        Ok(())
    }
}

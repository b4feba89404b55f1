//! roster-sync library interface
//!
//! Reconciles externally authored applicant and position files against the
//! authoritative record store, and exports the store back to the same formats.

pub mod commands;
pub mod engine;
pub mod formats;
pub mod store;

pub use crate::engine::{
    compute_diff, normalize, resolve_batch, DiffSpec, DiffStatus, RawPayload,
    ReconciliationSession, Record, Schema, SchemaRegistry, SessionView, Value,
};
pub use crate::store::{RecordStore, SqliteRecordStore};

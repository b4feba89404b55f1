//! Import/export reconciliation engine
//!
//! file -> [`normalize`] -> [`compute_diff`] -> (confirmation) -> [`resolve_batch`] -> store
//!
//! collection -> [`to_spreadsheet`] / [`to_structured`] -> file

pub mod batch;
pub mod diff;
pub mod export;
pub mod normalize;
pub mod schema;
pub mod session;
pub mod value;

pub use batch::resolve_batch;
pub use diff::{compute_diff, DiffSpec, DiffStatus, DiffSummary, FieldChange};
pub use export::{to_spreadsheet, to_structured};
pub use normalize::{normalize, NormalizeWarning, Normalized, RawPayload, RowOmission};
pub use schema::{FieldKind, Schema, SchemaBuilder, SchemaRegistry};
pub use session::{ReconciliationSession, SessionView};
pub use value::{Cell, Record, Value};

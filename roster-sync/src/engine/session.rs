//! Reconciliation session: one import attempt and its derived state
//!
//! The session owns the current file, the existing collection, and the diff
//! derived from them. The diff is never patched: any change to either input
//! discards it and recomputes it from scratch. While a confirmed batch is
//! being persisted the `reconciling` flag is set and collection updates are
//! held back, so the diff is never computed against a collection that is
//! about to change underneath it.

use crate::engine::batch::resolve_batch;
use crate::engine::diff::{compute_diff, DiffSpec, DiffSummary};
use crate::engine::normalize::{normalize, Normalized, RawPayload};
use crate::engine::schema::Schema;
use crate::engine::value::Record;
use crate::store::RecordStore;
use roster_common::config::OmissionPolicy;
use roster_common::{Error, Result};
use tracing::{info, warn};
use uuid::Uuid;

/// What the user should be shown for the current session state
#[derive(Debug, Clone, PartialEq)]
pub enum SessionView<'a> {
    /// No file loaded
    Empty,
    /// Normalization or diffing failed; the raw error message
    Failed(&'a str),
    /// File loaded and diffed, nothing would change
    NoDifferences(DiffSummary),
    /// File loaded and diffed with at least one new or modified record
    Changes {
        diffs: &'a [DiffSpec],
        summary: DiffSummary,
    },
}

pub struct ReconciliationSession {
    session_id: Uuid,
    schema: Schema,
    policy: OmissionPolicy,
    file: Option<Normalized>,
    existing: Vec<Record>,
    deferred_existing: Option<Vec<Record>>,
    diff: Option<Vec<DiffSpec>>,
    error: Option<String>,
    reconciling: bool,
    generation: u64,
}

impl ReconciliationSession {
    pub fn new(schema: Schema, policy: OmissionPolicy) -> Self {
        let session = Self {
            session_id: Uuid::new_v4(),
            schema,
            policy,
            file: None,
            existing: Vec::new(),
            deferred_existing: None,
            diff: None,
            error: None,
            reconciling: false,
            generation: 0,
        };
        info!(
            "Reconciliation session {} started for '{}'",
            session.session_id,
            session.schema.base_name()
        );
        session
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Incremented every time a file is loaded or cleared
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_reconciling(&self) -> bool {
        self.reconciling
    }

    pub fn normalized(&self) -> Option<&Normalized> {
        self.file.as_ref()
    }

    pub fn existing(&self) -> &[Record] {
        &self.existing
    }

    pub fn diff(&self) -> Option<&[DiffSpec]> {
        self.diff.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Replace the current file; any previous diff and error are discarded first
    ///
    /// Normalization failures are captured as session state, not returned.
    pub fn load_payload(&mut self, payload: &RawPayload) {
        self.discard_file();

        match normalize(&self.schema, payload, self.policy) {
            Ok(normalized) => {
                info!(
                    "Session {}: loaded {} {} records from {} payload",
                    self.session_id,
                    normalized.records.len(),
                    self.schema.base_name(),
                    payload.kind()
                );
                self.file = Some(normalized);
                self.recompute();
            }
            Err(e) => {
                warn!("Session {}: import file rejected: {}", self.session_id, e);
                self.error = Some(e.to_string());
            }
        }
    }

    /// Drop the current file together with its diff and error state
    pub fn clear_file(&mut self) {
        self.discard_file();
    }

    /// Supply the settled existing collection
    ///
    /// While a batch is being persisted the update is held until the
    /// persistence call settles.
    pub fn set_existing(&mut self, records: Vec<Record>) {
        if self.reconciling {
            info!(
                "Session {}: collection update deferred until reconciliation settles",
                self.session_id
            );
            self.deferred_existing = Some(records);
            return;
        }
        self.existing = records;
        self.recompute();
    }

    pub fn view(&self) -> SessionView<'_> {
        if let Some(error) = &self.error {
            return SessionView::Failed(error);
        }
        match &self.diff {
            None => SessionView::Empty,
            Some(diffs) => {
                let summary = DiffSummary::from_diffs(diffs);
                if summary.has_changes() {
                    SessionView::Changes { diffs, summary }
                } else {
                    SessionView::NoDifferences(summary)
                }
            }
        }
    }

    /// Records the current diff would write
    pub fn pending_batch(&self) -> Result<Vec<Record>> {
        if self.reconciling {
            return Err(Error::StalePrecondition(
                "a reconciliation is already in progress".to_string(),
            ));
        }
        if let Some(error) = &self.error {
            return Err(Error::StalePrecondition(format!(
                "current file has no valid diff: {}",
                error
            )));
        }
        let diff = self.diff.as_deref().ok_or_else(|| {
            Error::StalePrecondition("no file has been diffed".to_string())
        })?;
        resolve_batch(diff)
    }

    /// Start persisting the pending batch; sets the reconciling flag
    pub fn begin_apply(&mut self) -> Result<Vec<Record>> {
        let batch = self.pending_batch()?;
        self.reconciling = true;
        info!(
            "Session {}: applying {} {} records",
            self.session_id,
            batch.len(),
            self.schema.base_name()
        );
        Ok(batch)
    }

    /// Settle a persistence call started by [`ReconciliationSession::begin_apply`]
    ///
    /// On success `refreshed` is the collection after the write. On failure
    /// the file and diff are kept so the user can retry, and any collection
    /// update that arrived in the meantime is applied now.
    pub fn finish_apply(&mut self, outcome: Result<Vec<Record>>) -> Result<()> {
        self.reconciling = false;
        let deferred = self.deferred_existing.take();

        match outcome {
            Ok(refreshed) => {
                self.set_existing(refreshed);
                Ok(())
            }
            Err(e) => {
                warn!("Session {}: batch write failed: {}", self.session_id, e);
                if let Some(records) = deferred {
                    self.set_existing(records);
                }
                Err(e)
            }
        }
    }

    /// Persist the pending batch through `store` and re-diff against the result
    ///
    /// Returns the number of records written. An all-unchanged diff writes
    /// nothing and does not call the store.
    pub async fn apply<S>(&mut self, store: &S) -> Result<usize>
    where
        S: RecordStore + ?Sized,
    {
        let batch = self.begin_apply()?;
        if batch.is_empty() {
            self.finish_apply(Ok(self.existing.clone()))?;
            return Ok(0);
        }

        let outcome = match store.upsert(&self.schema, &batch).await {
            Ok(()) => store.load_all(&self.schema).await,
            Err(e) => Err(e),
        };
        self.finish_apply(outcome)?;
        Ok(batch.len())
    }

    fn discard_file(&mut self) {
        self.generation += 1;
        self.file = None;
        self.diff = None;
        self.error = None;
    }

    /// Rebuild the diff from the current file and collection
    fn recompute(&mut self) {
        self.diff = None;
        let Some(file) = &self.file else {
            return;
        };
        self.error = None;

        match compute_diff(&self.schema, &file.records, &self.existing) {
            Ok(diffs) => {
                let summary = DiffSummary::from_diffs(&diffs);
                info!(
                    "Session {}: {} new, {} modified, {} unchanged",
                    self.session_id, summary.new, summary.modified, summary.unchanged
                );
                self.diff = Some(diffs);
            }
            Err(e) => {
                warn!("Session {}: diff failed: {}", self.session_id, e);
                self.error = Some(e.to_string());
            }
        }
    }
}

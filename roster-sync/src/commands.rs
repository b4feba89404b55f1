//! Command implementations behind the CLI
//!
//! Kept in the library so integration tests drive the same code paths as the
//! binary. Rendering is plain text for a terminal.

use crate::engine::diff::DiffSpec;
use crate::engine::schema::SchemaRegistry;
use crate::engine::session::{ReconciliationSession, SessionView};
use crate::formats::{export_bytes, read_payload, ExportFormat};
use crate::store::RecordStore;
use roster_common::config::OmissionPolicy;
use roster_common::Result;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Options for one import run
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub schema: String,
    pub apply: bool,
    pub policy: OmissionPolicy,
}

/// Result of one import run
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    /// Human-readable report of omissions, warnings and the diff
    pub report: String,
    /// Records written (0 when not applying or nothing changed)
    pub written: usize,
    /// Normalization or diffing failed; `report` carries the error
    pub failed: bool,
}

/// Normalize `path`, diff it against the store, and optionally apply the batch
pub async fn import_file<S>(
    store: &S,
    registry: &SchemaRegistry,
    path: &Path,
    options: &ImportOptions,
) -> Result<ImportOutcome>
where
    S: RecordStore + ?Sized,
{
    let schema = registry.require(&options.schema)?.clone();
    let payload = read_payload(path)?;

    let mut session = ReconciliationSession::new(schema, options.policy);
    let existing = store.load_all(session.schema()).await?;
    session.set_existing(existing);
    session.load_payload(&payload);

    let mut report = render_session(&session);
    let failed = matches!(session.view(), SessionView::Failed(_));
    let has_changes = matches!(session.view(), SessionView::Changes { .. });

    let mut written = 0;
    if options.apply && has_changes {
        written = session.apply(store).await?;
        let _ = writeln!(report, "Applied {} record(s).", written);
        info!("Import of {} applied {} records", path.display(), written);
    } else if has_changes {
        let _ = writeln!(report, "Dry run: re-run with --apply to write these changes.");
    }

    Ok(ImportOutcome {
        report,
        written,
        failed,
    })
}

/// Serialize the stored collection for `schema_name`
pub async fn export_records<S>(
    store: &S,
    registry: &SchemaRegistry,
    schema_name: &str,
    format: ExportFormat,
) -> Result<Vec<u8>>
where
    S: RecordStore + ?Sized,
{
    let schema = registry.require(schema_name)?;
    let records = store.load_all(schema).await?;
    info!("Exporting {} {} records as {}", records.len(), schema_name, format);
    export_bytes(schema, &records, format)
}

/// One block per registered schema listing its columns
pub fn describe_schemas(registry: &SchemaRegistry) -> String {
    let mut out = String::new();
    for schema in registry.iter() {
        let _ = writeln!(out, "{} (primary key: {})", schema.base_name(), schema.primary_key());
        for column in schema.export_columns() {
            let required = if schema.required_keys().contains(&column.key) {
                " [required]"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "  {:<26} {:<26} {:?}{}",
                column.key,
                column.label,
                schema.field_kind(&column.key),
                required
            );
        }
    }
    out
}

/// Text rendering of the session's current view
pub fn render_session(session: &ReconciliationSession) -> String {
    let mut out = String::new();

    if let Some(normalized) = session.normalized() {
        for omission in &normalized.omissions {
            let _ = writeln!(
                out,
                "Skipped row {}: missing {}",
                omission.row,
                omission.missing.join(", ")
            );
        }
        for warning in &normalized.warnings {
            let _ = writeln!(out, "Warning: {}", warning);
        }
    }

    match session.view() {
        SessionView::Empty => {
            let _ = writeln!(out, "No file loaded.");
        }
        SessionView::Failed(error) => {
            let _ = writeln!(out, "Import failed: {}", error);
        }
        SessionView::NoDifferences(summary) => {
            let _ = writeln!(
                out,
                "No differences: all {} record(s) match the existing {}.",
                summary.unchanged,
                session.schema().base_name()
            );
        }
        SessionView::Changes { diffs, summary } => {
            let _ = writeln!(
                out,
                "{} new, {} modified, {} unchanged",
                summary.new, summary.modified, summary.unchanged
            );
            for diff in diffs.iter().filter(|d| d.needs_write()) {
                render_diff(&mut out, session, diff);
            }
        }
    }

    out
}

fn render_diff(out: &mut String, session: &ReconciliationSession, diff: &DiffSpec) {
    let key = session
        .schema()
        .record_key(diff.obj())
        .unwrap_or_default();
    let _ = writeln!(out, "  [{}] {}", diff.status().as_str(), key);

    if let Some(changed) = diff.changed_fields() {
        for (field, change) in changed {
            let from = change
                .from
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "(empty)".to_string());
            let _ = writeln!(out, "      {}: {} -> {}", field, from, change.to);
        }
    }
}

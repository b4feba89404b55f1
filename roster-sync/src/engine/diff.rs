//! Diff engine: classify incoming records against the existing collection
//!
//! Reconciliation is one-directional. Every incoming record yields exactly one
//! [`DiffSpec`], in incoming order; existing records the file does not mention
//! are not reported. Only keys present in an incoming record are compared, so
//! a partial row never clears a field.

use crate::engine::schema::Schema;
use crate::engine::value::{Record, Value};
use roster_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    New,
    Modified,
    Unchanged,
}

impl DiffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffStatus::New => "new",
            DiffStatus::Modified => "modified",
            DiffStatus::Unchanged => "unchanged",
        }
    }
}

/// Old and new value of one changed field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    /// `None` when the existing record never had the field
    pub from: Option<Value>,
    pub to: Value,
}

/// Classified comparison of one incoming record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DiffSpec {
    /// No existing record has this primary key; `obj` is the incoming record verbatim
    New { obj: Record },
    /// `obj` is the existing record with only the changed fields overlaid
    Modified {
        obj: Record,
        changed_fields: BTreeMap<String, FieldChange>,
    },
    /// `obj` is the existing record
    Unchanged { obj: Record },
}

impl DiffSpec {
    pub fn status(&self) -> DiffStatus {
        match self {
            DiffSpec::New { .. } => DiffStatus::New,
            DiffSpec::Modified { .. } => DiffStatus::Modified,
            DiffSpec::Unchanged { .. } => DiffStatus::Unchanged,
        }
    }

    /// The record to write if this entity is applied
    pub fn obj(&self) -> &Record {
        match self {
            DiffSpec::New { obj } | DiffSpec::Modified { obj, .. } | DiffSpec::Unchanged { obj } => {
                obj
            }
        }
    }

    pub fn into_obj(self) -> Record {
        match self {
            DiffSpec::New { obj } | DiffSpec::Modified { obj, .. } | DiffSpec::Unchanged { obj } => {
                obj
            }
        }
    }

    pub fn changed_fields(&self) -> Option<&BTreeMap<String, FieldChange>> {
        match self {
            DiffSpec::Modified { changed_fields, .. } => Some(changed_fields),
            _ => None,
        }
    }

    pub fn needs_write(&self) -> bool {
        !matches!(self, DiffSpec::Unchanged { .. })
    }
}

/// Per-status counts of a diff set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub new: usize,
    pub modified: usize,
    pub unchanged: usize,
}

impl DiffSummary {
    pub fn from_diffs(diffs: &[DiffSpec]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.status() {
                DiffStatus::New => summary.new += 1,
                DiffStatus::Modified => summary.modified += 1,
                DiffStatus::Unchanged => summary.unchanged += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.new + self.modified + self.unchanged
    }

    pub fn has_changes(&self) -> bool {
        self.new + self.modified > 0
    }
}

/// Index the existing collection by identity key
///
/// Duplicate primary keys are a precondition violation and fail the whole diff.
pub fn index_existing<'a>(
    schema: &Schema,
    existing: &'a [Record],
) -> Result<HashMap<String, &'a Record>> {
    let mut lookup: HashMap<String, &Record> = HashMap::with_capacity(existing.len());
    let mut collisions: BTreeMap<String, usize> = BTreeMap::new();

    for record in existing {
        let Some(key) = schema.record_key(record) else {
            warn!(
                "Existing {} record without '{}' cannot be matched",
                schema.base_name(),
                schema.primary_key()
            );
            continue;
        };
        if lookup.insert(key.clone(), record).is_some() {
            *collisions.entry(key).or_insert(1) += 1;
        }
    }

    if let Some((key, count)) = collisions.into_iter().next() {
        return Err(Error::PrimaryKeyCollision {
            record_type: schema.base_name().to_string(),
            key,
            count,
        });
    }

    Ok(lookup)
}

/// Compute the diff set for `incoming` against `existing`
///
/// Pure: the result depends only on the two inputs and is recomputed wholesale
/// whenever either changes.
pub fn compute_diff(
    schema: &Schema,
    incoming: &[Record],
    existing: &[Record],
) -> Result<Vec<DiffSpec>> {
    let lookup = index_existing(schema, existing)?;
    let mut seen: HashSet<String> = HashSet::with_capacity(incoming.len());
    let mut diffs = Vec::with_capacity(incoming.len());

    for (idx, record) in incoming.iter().enumerate() {
        let missing = schema.missing_required(record);
        if !missing.is_empty() {
            return Err(Error::InvalidInput(format!(
                "incoming {} record {} lacks required {:?}",
                schema.base_name(),
                idx + 1,
                missing
            )));
        }
        let key = schema.record_key(record).ok_or_else(|| {
            Error::InvalidInput(format!(
                "incoming {} record {} has a blank primary key",
                schema.base_name(),
                idx + 1
            ))
        })?;

        if !seen.insert(key.clone()) {
            warn!(
                "Primary key '{}' appears more than once in the import; the last row wins",
                key
            );
        }

        let diff = match lookup.get(&key) {
            None => DiffSpec::New {
                obj: record.clone(),
            },
            Some(current) => diff_record(schema, record, current),
        };
        debug!("{} '{}': {}", schema.base_name(), key, diff.status().as_str());
        diffs.push(diff);
    }

    Ok(diffs)
}

/// Field-level comparison of a matched pair
fn diff_record(schema: &Schema, incoming: &Record, current: &Record) -> DiffSpec {
    let mut changed_fields = BTreeMap::new();

    for (key, to) in incoming {
        if !schema.has_key(key) {
            continue;
        }
        let from = current.get(key);
        let same = from.is_some_and(|f| f.matches(to));
        if !same {
            changed_fields.insert(
                key.clone(),
                FieldChange {
                    from: from.cloned(),
                    to: to.clone(),
                },
            );
        }
    }

    if changed_fields.is_empty() {
        return DiffSpec::Unchanged {
            obj: current.clone(),
        };
    }

    let mut obj = current.clone();
    for (key, change) in &changed_fields {
        obj.insert(key.clone(), change.to.clone());
    }

    DiffSpec::Modified {
        obj,
        changed_fields,
    }
}

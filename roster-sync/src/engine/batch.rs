//! Batch resolver: the records a confirmed diff actually needs to write

use crate::engine::diff::DiffSpec;
use crate::engine::value::Record;
use roster_common::{Error, Result};

/// Extract the `obj` of every new or modified entry, in diff order
///
/// Unchanged entries are dropped. An empty diff set means there is nothing
/// current to confirm, which is a usage error rather than "no changes".
pub fn resolve_batch(diffs: &[DiffSpec]) -> Result<Vec<Record>> {
    if diffs.is_empty() {
        return Err(Error::StalePrecondition(
            "no diff available to confirm".to_string(),
        ));
    }

    Ok(diffs
        .iter()
        .filter(|d| d.needs_write())
        .map(|d| d.obj().clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::diff::FieldChange;
    use crate::engine::value::Value;
    use std::collections::BTreeMap;

    fn obj(key: &str) -> Record {
        Record::from([("utorid".to_string(), Value::Text(key.to_string()))])
    }

    #[test]
    fn test_only_new_and_modified_written() {
        let diffs = vec![
            DiffSpec::Unchanged { obj: obj("a") },
            DiffSpec::New { obj: obj("b") },
            DiffSpec::Modified {
                obj: obj("c"),
                changed_fields: BTreeMap::from([(
                    "utorid".to_string(),
                    FieldChange {
                        from: None,
                        to: Value::Text("c".into()),
                    },
                )]),
            },
        ];

        let batch = resolve_batch(&diffs).unwrap();

        assert_eq!(batch, vec![obj("b"), obj("c")]);
    }

    #[test]
    fn test_all_unchanged_is_empty_batch() {
        let diffs = vec![DiffSpec::Unchanged { obj: obj("a") }];
        assert!(resolve_batch(&diffs).unwrap().is_empty());
    }

    #[test]
    fn test_empty_diff_is_stale() {
        assert!(matches!(resolve_batch(&[]), Err(Error::StalePrecondition(_))));
    }
}

//! Full-replace and partial-merge update algorithms.
//!
//! Replace sets the record to exactly the supplied field set, so omitted keys
//! disappear. Merge overlays the supplied fields recursively: objects merge
//! key by key, lists and scalars overwrite, and anything not mentioned keeps
//! its prior value at every nesting level.

use crate::{
    error::Result,
    validate::Mode,
    value::{FieldValue, Fields},
    Error, Limits, Record, Timestamp,
};

/// How a mutation combines the request body with the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// PUT: the body becomes the complete field set.
    Replace,
    /// MERGE/PATCH: the body is overlaid onto the stored fields.
    Merge,
}

impl UpdateMode {
    /// Validation regime used for bodies of this mode.
    pub fn validation_mode(self) -> Mode {
        match self {
            UpdateMode::Replace => Mode::Full,
            UpdateMode::Merge => Mode::Partial,
        }
    }
}

/// Merge a patch value over an optional stored value.
///
/// Only an object over an object recurses; every other pairing takes the
/// patch value, which replaces lists wholesale and lets null overwrite.
pub fn merge_value(stored: Option<FieldValue>, patch: FieldValue) -> FieldValue {
    match (stored, patch) {
        (Some(FieldValue::Object(base)), FieldValue::Object(overlay)) => {
            FieldValue::Object(merge_fields(base, overlay))
        }
        (_, patch) => patch,
    }
}

/// Merge a patch field map over a stored one.
pub fn merge_fields(mut base: Fields, overlay: Fields) -> Fields {
    for (key, patch) in overlay {
        let prior = base.remove(&key);
        base.insert(key, merge_value(prior, patch));
    }
    base
}

/// Compute the field set a mutation produces.
pub fn updated_fields(stored: &Fields, mode: UpdateMode, supplied: Fields) -> Fields {
    match mode {
        UpdateMode::Replace => supplied,
        UpdateMode::Merge => merge_fields(stored.clone(), supplied),
    }
}

/// Apply a mutation, returning the next revision of the record.
pub fn apply(
    record: &Record,
    mode: UpdateMode,
    supplied: Fields,
    timestamp: Timestamp,
    limits: &Limits,
) -> Result<Record> {
    let fields = updated_fields(&record.fields, mode, supplied);
    check_field_count(&fields, limits)?;

    let mut next = record.clone();
    next.update_fields(fields, timestamp);
    Ok(next)
}

/// Reject a field set with more top-level fields than allowed.
pub fn check_field_count(fields: &Fields, limits: &Limits) -> Result<()> {
    if fields.len() > limits.max_field_count {
        return Err(Error::TooManyFields {
            limit: limits.max_field_count,
            actual: fields.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        match FieldValue::from(value) {
            FieldValue::Object(fields) => fields,
            _ => unreachable!(),
        }
    }

    fn record(value: serde_json::Value) -> Record {
        Record::new("r1", "T", fields(value), 1000)
    }

    #[test]
    fn replace_drops_omitted_fields() {
        let stored = record(json!({"a": 1, "b": 2}));
        let next = apply(
            &stored,
            UpdateMode::Replace,
            fields(json!({"a": 1})),
            2000,
            &Limits::default(),
        )
        .unwrap();

        assert_eq!(next.fields, fields(json!({"a": 1})));
        assert_eq!(next.version, 2);
        assert_eq!(next.updated, 2000);
        assert_eq!(next.published, 1000);
        assert_eq!(next.id, "r1");
    }

    #[test]
    fn merge_keeps_omitted_fields() {
        let stored = record(json!({"a": 1, "b": 2}));
        let next = apply(
            &stored,
            UpdateMode::Merge,
            fields(json!({"a": 5})),
            2000,
            &Limits::default(),
        )
        .unwrap();

        assert_eq!(next.fields, fields(json!({"a": 5, "b": 2})));
    }

    #[test]
    fn merge_recurses_into_objects() {
        let base = fields(json!({
            "o": {"x": 1, "inner": {"p": "keep", "q": "old"}, "list": [1, 2, 3]},
            "top": "keep"
        }));
        let patch = fields(json!({
            "o": {"inner": {"q": "new"}, "list": [9]}
        }));

        assert_eq!(
            merge_fields(base, patch),
            fields(json!({
                "o": {"x": 1, "inner": {"p": "keep", "q": "new"}, "list": [9]},
                "top": "keep"
            }))
        );
    }

    #[test]
    fn merge_lists_replace_verbatim() {
        let base = fields(json!({"l": [{"a": 1, "b": 2}]}));
        let patch = fields(json!({"l": [{"a": 3}]}));
        assert_eq!(merge_fields(base, patch), fields(json!({"l": [{"a": 3}]})));
    }

    #[test]
    fn merge_null_overwrites() {
        let base = fields(json!({"n": 123, "o": {"x": 1}}));
        let patch = fields(json!({"n": null, "o": null}));
        assert_eq!(merge_fields(base, patch), fields(json!({"n": null, "o": null})));
    }

    #[test]
    fn empty_merge_still_bumps_version() {
        let stored = record(json!({"a": 1}));
        let next = apply(&stored, UpdateMode::Merge, Fields::new(), 1000, &Limits::default())
            .unwrap();
        assert_eq!(next.version, 2);
        assert_eq!(next.fields, stored.fields);
    }

    #[test]
    fn field_count_checked_after_merge() {
        let limits = Limits::default().with_max_field_count(2);
        let stored = record(json!({"a": 1, "b": 2}));

        assert!(apply(&stored, UpdateMode::Merge, fields(json!({"a": 3})), 1, &limits).is_ok());
        assert!(matches!(
            apply(&stored, UpdateMode::Merge, fields(json!({"c": 3})), 1, &limits),
            Err(Error::TooManyFields { limit: 2, actual: 3 })
        ));
        assert!(apply(&stored, UpdateMode::Replace, fields(json!({"c": 3})), 1, &limits).is_ok());
    }

    proptest! {
        #[test]
        fn merge_preserves_unmentioned_keys(
            base in prop::collection::btree_map("[a-f]", 0i64..100, 0..6),
            patch in prop::collection::btree_map("[a-f]", 0i64..100, 0..6),
        ) {
            let to_fields = |m: &std::collections::BTreeMap<String, i64>| -> Fields {
                m.iter().map(|(k, v)| (k.clone(), FieldValue::int(*v))).collect()
            };
            let merged = merge_fields(to_fields(&base), to_fields(&patch));

            for (key, value) in &base {
                let expected = patch.get(key).unwrap_or(value);
                prop_assert_eq!(&merged[key], &FieldValue::int(*expected));
            }
            for (key, value) in &patch {
                prop_assert_eq!(&merged[key], &FieldValue::int(*value));
            }
            prop_assert!(merged.keys().all(|k| base.contains_key(k) || patch.contains_key(k)));
        }
    }
}

//! Engine limits.
//!
//! All bounds the engine enforces live in one immutable [`Limits`] value handed
//! to [`Engine::new`](crate::Engine::new). Nothing is read from global state.

use serde::{Deserialize, Serialize};

/// Configurable bounds enforced by the engine.
///
/// Every field has a default, so a partial JSON document deserializes into a
/// complete set of limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Limits {
    /// Maximum declared + dynamic top-level fields per record
    pub max_field_count: usize,
    /// Maximum string length in UTF-16 code units
    pub max_string_length: usize,
    /// Maximum length of a field or schema name
    pub max_name_length: usize,
    /// Maximum length of a record `__id`
    pub max_id_length: usize,
    /// Maximum records per entity type, unbounded when `None`
    pub max_records_per_entity_type: Option<usize>,
    /// Maximum links per record across a `*:*` association
    pub max_links_per_record: usize,
    /// Maximum distinct navigation properties expanded on a single fetch
    pub expand_max_retrieve: usize,
    /// Maximum distinct navigation properties expanded on a list fetch
    pub expand_max_list: usize,
    /// Page size when `$top` is omitted
    pub top_default: usize,
    /// Maximum `$top` without expansion
    pub top_max: usize,
    /// Maximum `$top` when a list fetch also expands
    pub expand_top_max: usize,
    /// Maximum `$skip`
    pub skip_max: usize,
    /// Maximum full-text query length in UTF-8 bytes
    pub search_max_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_field_count: 400,
            max_string_length: 51_200,
            max_name_length: 128,
            max_id_length: 200,
            max_records_per_entity_type: None,
            max_links_per_record: 10_000,
            expand_max_retrieve: 10,
            expand_max_list: 2,
            top_default: 25,
            top_max: 10_000,
            expand_top_max: 100,
            skip_max: 100_000,
            search_max_bytes: 255,
        }
    }
}

impl Limits {
    /// Builder-style override of the field count limit.
    pub fn with_max_field_count(mut self, max: usize) -> Self {
        self.max_field_count = max;
        self
    }

    /// Builder-style override of the per-entity-type record limit.
    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records_per_entity_type = Some(max);
        self
    }

    /// Builder-style override of the `*:*` link limit.
    pub fn with_max_links(mut self, max: usize) -> Self {
        self.max_links_per_record = max;
        self
    }

    /// Builder-style override of the string length limit.
    pub fn with_max_string_length(mut self, max: usize) -> Self {
        self.max_string_length = max;
        self
    }
}

//! Record types for storing entity instances.

use crate::{
    etag::VersionTag,
    validate::{format_datetime, ID_FIELD, PUBLISHED_FIELD, UPDATED_FIELD},
    value::{fields_to_json, Fields},
    EntityTypeName, RecordId, Timestamp, Version,
};
use serde::{Deserialize, Serialize};

/// An instance of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Key, unique within the entity type
    pub id: RecordId,
    /// Entity type this record belongs to
    pub entity_type: EntityTypeName,
    /// Version number, 1 on creation and incremented on each mutation
    pub version: Version,
    /// Declared and dynamic fields
    pub fields: Fields,
    /// When the record was created (milliseconds since epoch)
    pub published: Timestamp,
    /// When the record was last modified (milliseconds since epoch)
    pub updated: Timestamp,
}

impl Record {
    /// Create a new record at version 1.
    pub fn new(
        id: impl Into<RecordId>,
        entity_type: impl Into<EntityTypeName>,
        fields: Fields,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            version: 1,
            fields,
            published: timestamp,
            updated: timestamp,
        }
    }

    /// Replace the field set, bumping version and last-modified.
    pub fn update_fields(&mut self, fields: Fields, timestamp: Timestamp) {
        self.fields = fields;
        self.version += 1;
        self.updated = timestamp;
    }

    /// Current version tag.
    pub fn tag(&self) -> VersionTag {
        VersionTag::new(self.version, self.updated)
    }

    /// JSON view with `__id` and the timestamp system fields.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = fields_to_json(&self.fields);
        map.insert(ID_FIELD.into(), self.id.clone().into());
        map.insert(
            PUBLISHED_FIELD.into(),
            format_datetime(self.published as i64).into(),
        );
        map.insert(
            UPDATED_FIELD.into(),
            format_datetime(self.updated as i64).into(),
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldValue;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        match FieldValue::from(value) {
            FieldValue::Object(fields) => fields,
            _ => unreachable!(),
        }
    }

    #[test]
    fn create_record() {
        let record = Record::new("c1", "Customer", fields(json!({"name": "Alice"})), 1000);

        assert_eq!(record.id, "c1");
        assert_eq!(record.entity_type, "Customer");
        assert_eq!(record.version, 1);
        assert_eq!(record.published, 1000);
        assert_eq!(record.updated, 1000);
        assert_eq!(record.tag().to_string(), "W/\"1-1000\"");
    }

    #[test]
    fn update_record() {
        let mut record = Record::new("c1", "Customer", fields(json!({"name": "Alice"})), 1000);
        record.update_fields(fields(json!({"name": "Alice Smith"})), 2000);

        assert_eq!(record.version, 2);
        assert_eq!(record.published, 1000);
        assert_eq!(record.updated, 2000);
        assert_eq!(record.fields["name"], FieldValue::string("Alice Smith"));
    }

    #[test]
    fn json_view_includes_system_fields() {
        let record = Record::new("c1", "Customer", fields(json!({"n": 1})), 1000);
        let view = serde_json::Value::Object(record.to_json());

        assert_eq!(
            view,
            json!({
                "__id": "c1",
                "__published": "/Date(1000)/",
                "__updated": "/Date(1000)/",
                "n": 1
            })
        );
    }

    #[test]
    fn serialization_roundtrip() {
        let record = Record::new(
            "c1",
            "Customer",
            fields(json!({"name": "Alice", "tags": ["a"], "score": 1.0})),
            1000,
        );

        let json = serde_json::to_string(&record).unwrap();
        let parsed: Record = serde_json::from_str(&json).unwrap();

        assert_eq!(record, parsed);
    }
}

//! Document store abstraction and the in-memory implementation.
//!
//! The engine delegates persistence to a [`DocumentStore`]. Every write is a
//! single-record operation; updates and deletes are compare-and-swap on the
//! stored version so concurrent writers to the same record cannot interleave.
//! Links between records are stored alongside as an undirected adjacency.

use crate::{error::Result, EntityTypeName, Error, Record, RecordId, Version};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Address of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    pub entity_type: EntityTypeName,
    pub id: RecordId,
}

impl RecordKey {
    pub fn new(entity_type: impl Into<EntityTypeName>, id: impl Into<RecordId>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}('{}')", self.entity_type, self.id)
    }
}

impl From<&Record> for RecordKey {
    fn from(record: &Record) -> Self {
        RecordKey::new(record.entity_type.clone(), record.id.clone())
    }
}

/// Persistence collaborator consumed by the engine.
pub trait DocumentStore: Send + Sync {
    /// Fetch a record.
    fn get(&self, entity_type: &str, id: &str) -> Result<Option<Record>>;

    /// Insert a new record; fails if the key is taken.
    fn insert(&self, record: Record) -> Result<()>;

    /// Overwrite a record only if the stored version is still `expected`.
    fn compare_and_swap(&self, record: Record, expected: Version) -> Result<()>;

    /// Remove a record only if the stored version is still `expected`.
    fn remove(&self, entity_type: &str, id: &str, expected: Version) -> Result<()>;

    /// All records of an entity type accepted by `predicate`, in no particular order.
    fn scan(&self, entity_type: &str, predicate: &dyn Fn(&Record) -> bool) -> Result<Vec<Record>>;

    /// Number of records of an entity type.
    fn count(&self, entity_type: &str) -> Result<usize>;

    /// Link two records; returns `false` if they were already linked.
    fn add_link(&self, a: &RecordKey, b: &RecordKey) -> Result<bool>;

    /// Unlink two records; returns `false` if they were not linked.
    fn remove_link(&self, a: &RecordKey, b: &RecordKey) -> Result<bool>;

    /// Records linked to `key`, sorted.
    fn links_of(&self, key: &RecordKey) -> Result<Vec<RecordKey>>;
}

/// Concurrent in-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<RecordKey, Record>,
    links: DashMap<RecordKey, BTreeSet<RecordKey>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across entity types.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn not_found(entity_type: &str, id: &str) -> Error {
        Error::RecordNotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    fn detach(&self, from: &RecordKey, to: &RecordKey) -> bool {
        let mut removed = false;
        if let Some(mut set) = self.links.get_mut(from) {
            removed = set.remove(to);
        }
        self.links.remove_if(from, |_, set| set.is_empty());
        removed
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, entity_type: &str, id: &str) -> Result<Option<Record>> {
        Ok(self
            .records
            .get(&RecordKey::new(entity_type, id))
            .map(|r| r.value().clone()))
    }

    fn insert(&self, record: Record) -> Result<()> {
        match self.records.entry(RecordKey::from(&record)) {
            Entry::Occupied(_) => Err(Error::RecordAlreadyExists {
                entity_type: record.entity_type,
                id: record.id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    fn compare_and_swap(&self, record: Record, expected: Version) -> Result<()> {
        match self.records.entry(RecordKey::from(&record)) {
            Entry::Vacant(_) => Err(Self::not_found(&record.entity_type, &record.id)),
            Entry::Occupied(mut slot) => {
                let stored = slot.get();
                if stored.version != expected {
                    return Err(Error::PreconditionFailed {
                        expected: format!("version {}", expected),
                        actual: stored.tag().to_string(),
                    });
                }
                slot.insert(record);
                Ok(())
            }
        }
    }

    fn remove(&self, entity_type: &str, id: &str, expected: Version) -> Result<()> {
        let key = RecordKey::new(entity_type, id);
        match self.records.entry(key.clone()) {
            Entry::Vacant(_) => return Err(Self::not_found(entity_type, id)),
            Entry::Occupied(slot) => {
                if slot.get().version != expected {
                    return Err(Error::PreconditionFailed {
                        expected: format!("version {}", expected),
                        actual: slot.get().tag().to_string(),
                    });
                }
                slot.remove();
            }
        }

        if let Some((_, others)) = self.links.remove(&key) {
            for other in others {
                self.detach(&other, &key);
            }
        }
        Ok(())
    }

    fn scan(&self, entity_type: &str, predicate: &dyn Fn(&Record) -> bool) -> Result<Vec<Record>> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.key().entity_type == entity_type && predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn count(&self, entity_type: &str) -> Result<usize> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.key().entity_type == entity_type)
            .count())
    }

    fn add_link(&self, a: &RecordKey, b: &RecordKey) -> Result<bool> {
        let added = self.links.entry(a.clone()).or_default().insert(b.clone());
        self.links.entry(b.clone()).or_default().insert(a.clone());
        Ok(added)
    }

    fn remove_link(&self, a: &RecordKey, b: &RecordKey) -> Result<bool> {
        let removed = self.detach(a, b);
        self.detach(b, a);
        Ok(removed)
    }

    fn links_of(&self, key: &RecordKey) -> Result<Vec<RecordKey>> {
        Ok(self
            .links
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }
}

//! The engine facade.
//!
//! [`Engine`] is the external interface: record CRUD, list and fetch queries,
//! and link management. It owns no data itself; records live in a
//! [`DocumentStore`], schema comes from a [`CatalogSource`] and time from a
//! [`Clock`]. Every mutation touches exactly one record and commits through
//! the store's compare-and-swap.

use crate::{
    clock::{Clock, SystemClock},
    error::Result,
    etag::{Precondition, VersionTag},
    query::{Expand, InlineCount, ListQuery, QueryOptions, RecordQuery, Select},
    schema::{Catalog, Multiplicity, Navigation},
    source::CatalogSource,
    store::{DocumentStore, RecordKey},
    update::{self, UpdateMode},
    validate::{Mode, Validator, METADATA_FIELD},
    Error, Limits, Record, RecordId,
};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// A record together with its rendered response body.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub record: Record,
    /// Fields after projection, plus `__metadata` and navigation properties
    pub body: Map<String, Value>,
}

impl Entry {
    pub fn tag(&self) -> VersionTag {
        self.record.tag()
    }
}

/// One page of a list query.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub entries: Vec<Entry>,
    /// Total matches before paging, when `$inlinecount=allpages`
    pub count: Option<usize>,
}

/// Dynamic entity data engine.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn DocumentStore>,
    catalog: Arc<dyn CatalogSource>,
    limits: Limits,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine reading the system clock.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        catalog: Arc<dyn CatalogSource>,
        limits: Limits,
    ) -> Self {
        Self {
            store,
            catalog,
            limits,
            clock: Arc::new(SystemClock),
        }
    }

    /// Builder-style method to replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Current catalog.
    pub fn catalog(&self) -> Result<Arc<Catalog>> {
        self.catalog.catalog()
    }

    /// Force the next operation to reload the catalog.
    pub fn invalidate_catalog(&self) {
        self.catalog.invalidate();
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Create a record. The id is generated when the body has none.
    pub fn create_record(&self, entity_type: &str, body: &Value) -> Result<Entry> {
        let catalog = self.catalog()?;
        let record = self.insert_record(&catalog, entity_type, body)?;
        self.render_entry(&catalog, record, &Select::All, &Expand::default())
    }

    fn insert_record(&self, catalog: &Catalog, entity_type: &str, body: &Value) -> Result<Record> {
        let definition = catalog.entity_type(entity_type)?;
        let now = self.clock.now();
        let validated =
            Validator::new(catalog, &self.limits, now).validate_body(definition, body, Mode::Full)?;
        update::check_field_count(&validated.fields, &self.limits)?;

        if let Some(limit) = self.limits.max_records_per_entity_type {
            if self.store.count(entity_type)? >= limit {
                return Err(Error::RecordLimit {
                    entity_type: entity_type.to_string(),
                    limit,
                });
            }
        }

        let id = validated
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let record = Record::new(id, entity_type, validated.fields, now);
        self.store.insert(record.clone())?;

        tracing::debug!(
            entity_type = %record.entity_type,
            id = %record.id,
            "record created"
        );
        Ok(record)
    }

    /// Replace every field of a record.
    pub fn replace_record(
        &self,
        entity_type: &str,
        id: &str,
        body: &Value,
        precondition: &Precondition,
    ) -> Result<VersionTag> {
        self.mutate(entity_type, id, body, precondition, UpdateMode::Replace)
    }

    /// Merge a partial body into a record.
    pub fn merge_record(
        &self,
        entity_type: &str,
        id: &str,
        body: &Value,
        precondition: &Precondition,
    ) -> Result<VersionTag> {
        self.mutate(entity_type, id, body, precondition, UpdateMode::Merge)
    }

    fn mutate(
        &self,
        entity_type: &str,
        id: &str,
        body: &Value,
        precondition: &Precondition,
        mode: UpdateMode,
    ) -> Result<VersionTag> {
        let catalog = self.catalog()?;
        let definition = catalog.entity_type(entity_type)?;
        let stored = self.fetch(entity_type, id)?;
        self.check_precondition(precondition, &stored)?;

        let now = self.clock.now();
        let validator = Validator::new(&catalog, &self.limits, now);
        let validated = validator.validate_body(definition, body, mode.validation_mode())?;
        let mut next = update::apply(&stored, mode, validated.fields, now, &self.limits)?;
        if mode == UpdateMode::Merge {
            validator.complete_nested(definition, &mut next.fields)?;
        }
        let tag = next.tag();
        self.store.compare_and_swap(next, stored.version)?;

        tracing::debug!(
            entity_type,
            id,
            ?mode,
            version = tag.version,
            "record updated"
        );
        Ok(tag)
    }

    /// Delete a record and the links it holds.
    pub fn delete_record(
        &self,
        entity_type: &str,
        id: &str,
        precondition: &Precondition,
    ) -> Result<()> {
        let catalog = self.catalog()?;
        catalog.entity_type(entity_type)?;
        let stored = self.fetch(entity_type, id)?;
        self.check_precondition(precondition, &stored)?;

        let key = RecordKey::from(&stored);
        let links = self.store.links_of(&key)?;
        for navigation in catalog.navigations(entity_type) {
            if navigation.source.multiplicity == Multiplicity::Many
                && links
                    .iter()
                    .any(|other| other.entity_type == navigation.target_type())
            {
                return Err(Error::LinkedRecord(stored.id));
            }
        }

        self.store.remove(entity_type, id, stored.version)?;
        tracing::debug!(entity_type, id, "record deleted");
        Ok(())
    }

    /// Fetch one record with `$select` and `$expand` applied.
    pub fn get_record(&self, entity_type: &str, id: &str, options: &QueryOptions) -> Result<Entry> {
        let catalog = self.catalog()?;
        let query = RecordQuery::parse(options, &catalog, entity_type, &self.limits)?;
        let record = self.fetch(entity_type, id)?;
        self.render_entry(&catalog, record, &query.select, &query.expand)
    }

    /// List the records of an entity type.
    pub fn list_records(&self, entity_type: &str, options: &QueryOptions) -> Result<Page> {
        let catalog = self.catalog()?;
        self.list_where(&catalog, entity_type, options, None)
    }

    fn list_where(
        &self,
        catalog: &Catalog,
        entity_type: &str,
        options: &QueryOptions,
        restrict: Option<&HashSet<RecordId>>,
    ) -> Result<Page> {
        let query = ListQuery::parse(options, catalog, entity_type, &self.limits)?;
        let matched = self.store.scan(entity_type, &|record| {
            restrict.map_or(true, |ids| ids.contains(&record.id)) && query.matches(record)
        })?;
        let (page, total) = query.page(matched);

        tracing::debug!(entity_type, total, returned = page.len(), "records listed");

        let entries = page
            .into_iter()
            .map(|record| self.render_entry(catalog, record, &query.select, &query.expand))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page {
            entries,
            count: (query.inlinecount == InlineCount::AllPages).then_some(total),
        })
    }

    // ========================================================================
    // Links
    // ========================================================================

    /// Link a record to a record of the navigation's target type.
    pub fn create_link(
        &self,
        entity_type: &str,
        id: &str,
        navigation: &str,
        target_id: &str,
    ) -> Result<()> {
        let catalog = self.catalog()?;
        let nav = resolve_navigation(&catalog, entity_type, navigation)?;
        let source = RecordKey::from(&self.fetch(entity_type, id)?);
        let target = RecordKey::from(&self.fetch(nav.target_type(), target_id)?);

        let source_links = self.links_to(&source, nav.target_type())?;
        let target_links = self.links_to(&target, entity_type)?;
        let pair = format!("{} -> {}", source, target);

        if source_links.contains(&target) {
            return Err(Error::LinkAlreadyExists(pair));
        }
        if nav.target.multiplicity.is_single() && !source_links.is_empty() {
            return Err(Error::Multiplicity(format!(
                "{} already links a {}",
                source,
                nav.target_type()
            )));
        }
        if nav.source.multiplicity.is_single() && !target_links.is_empty() {
            return Err(Error::Multiplicity(format!(
                "{} already links a {}",
                target, entity_type
            )));
        }
        if nav.is_many_to_many() {
            let limit = self.limits.max_links_per_record;
            for (key, links) in [(&source, &source_links), (&target, &target_links)] {
                if links.len() >= limit {
                    return Err(Error::LinkLimit {
                        id: key.id.clone(),
                        limit,
                    });
                }
            }
        }

        if !self.store.add_link(&source, &target)? {
            return Err(Error::LinkAlreadyExists(pair));
        }
        tracing::debug!(%source, %target, "link created");
        Ok(())
    }

    /// Remove a link.
    pub fn delete_link(
        &self,
        entity_type: &str,
        id: &str,
        navigation: &str,
        target_id: &str,
    ) -> Result<()> {
        let catalog = self.catalog()?;
        let nav = resolve_navigation(&catalog, entity_type, navigation)?;
        let source = RecordKey::from(&self.fetch(entity_type, id)?);
        let target = RecordKey::new(nav.target_type(), target_id);

        if !self.store.remove_link(&source, &target)? {
            return Err(Error::LinkNotFound(format!("{} -> {}", source, target)));
        }
        tracing::debug!(%source, %target, "link deleted");
        Ok(())
    }

    /// Ids of the records linked through a navigation property.
    pub fn list_links(&self, entity_type: &str, id: &str, navigation: &str) -> Result<Vec<RecordId>> {
        let catalog = self.catalog()?;
        let nav = resolve_navigation(&catalog, entity_type, navigation)?;
        let source = RecordKey::from(&self.fetch(entity_type, id)?);
        Ok(self
            .links_to(&source, nav.target_type())?
            .into_iter()
            .map(|key| key.id)
            .collect())
    }

    /// Create a record of the navigation's target type already linked to
    /// the source record. Nothing is left behind if linking fails.
    pub fn create_via_navigation(
        &self,
        entity_type: &str,
        id: &str,
        navigation: &str,
        body: &Value,
    ) -> Result<Entry> {
        let catalog = self.catalog()?;
        let nav = resolve_navigation(&catalog, entity_type, navigation)?;
        let target_type = nav.target_type().to_string();
        self.fetch(entity_type, id)?;

        let created = self.insert_record(&catalog, &target_type, body)?;
        if let Err(err) = self.create_link(entity_type, id, navigation, &created.id) {
            self.store
                .remove(&created.entity_type, &created.id, created.version)?;
            tracing::debug!(
                entity_type = %target_type,
                id = %created.id,
                "created record rolled back"
            );
            return Err(err);
        }
        self.render_entry(&catalog, created, &Select::All, &Expand::default())
    }

    /// List the records linked through a navigation property.
    pub fn list_related(
        &self,
        entity_type: &str,
        id: &str,
        navigation: &str,
        options: &QueryOptions,
    ) -> Result<Page> {
        let catalog = self.catalog()?;
        let nav = resolve_navigation(&catalog, entity_type, navigation)?;
        let target_type = nav.target_type().to_string();
        let source = RecordKey::from(&self.fetch(entity_type, id)?);

        let ids: HashSet<RecordId> = self
            .links_to(&source, &target_type)?
            .into_iter()
            .map(|key| key.id)
            .collect();
        self.list_where(&catalog, &target_type, options, Some(&ids))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn fetch(&self, entity_type: &str, id: &str) -> Result<Record> {
        self.store
            .get(entity_type, id)?
            .ok_or_else(|| Error::RecordNotFound {
                entity_type: entity_type.to_string(),
                id: id.to_string(),
            })
    }

    fn check_precondition(&self, precondition: &Precondition, stored: &Record) -> Result<()> {
        precondition.check(&stored.tag()).inspect_err(|err| {
            tracing::warn!(
                entity_type = %stored.entity_type,
                id = %stored.id,
                "precondition rejected: {}",
                err
            );
        })
    }

    fn links_to(&self, key: &RecordKey, entity_type: &str) -> Result<Vec<RecordKey>> {
        Ok(self
            .store
            .links_of(key)?
            .into_iter()
            .filter(|other| other.entity_type == entity_type)
            .collect())
    }

    fn render_entry(
        &self,
        catalog: &Catalog,
        record: Record,
        select: &Select,
        expand: &Expand,
    ) -> Result<Entry> {
        let key = RecordKey::from(&record);
        let mut body = select.apply(record.to_json());
        body.insert(METADATA_FIELD.into(), metadata(&record));

        for nav in catalog.navigations(&record.entity_type) {
            let name = nav.name();
            let value = if expand.contains(&name) {
                self.expanded(&key, &nav)?
            } else {
                json!({ "__deferred": { "uri": format!("{}/{}", key, name) } })
            };
            body.insert(name, value);
        }
        Ok(Entry { record, body })
    }

    fn expanded(&self, key: &RecordKey, nav: &Navigation<'_>) -> Result<Value> {
        let mut related = Vec::new();
        for other in self.links_to(key, nav.target_type())? {
            if let Some(record) = self.store.get(&other.entity_type, &other.id)? {
                let mut body = record.to_json();
                body.insert(METADATA_FIELD.into(), metadata(&record));
                related.push(Value::Object(body));
            }
        }
        Ok(if nav.target.multiplicity.is_single() {
            related.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(related)
        })
    }
}

fn resolve_navigation<'a>(
    catalog: &'a Catalog,
    entity_type: &str,
    navigation: &str,
) -> Result<Navigation<'a>> {
    catalog.entity_type(entity_type)?;
    catalog
        .navigation(entity_type, navigation)
        .ok_or_else(|| Error::NavigationNotFound(format!("{}/{}", entity_type, navigation)))
}

fn metadata(record: &Record) -> Value {
    json!({
        "uri": RecordKey::from(record).to_string(),
        "etag": record.tag().to_string(),
        "type": record.entity_type,
    })
}

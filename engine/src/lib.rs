//! # Cellbox Engine
//!
//! A dynamic entity data engine for multi-tenant data platforms.
//!
//! Clients declare schemas at runtime and then store records that mix strictly
//! typed declared fields with freely typed dynamic ones. This crate holds the
//! rules that govern those records: validation, update algorithms, optimistic
//! concurrency and query evaluation. Transport, authentication and physical
//! storage live outside it.
//!
//! ## Core Concepts
//!
//! ### Schema
//!
//! A [`Catalog`] holds [`EntityType`]s with declared [`Property`]s,
//! [`ComplexType`]s for nested structures and paired [`AssociationEnd`]s for
//! relationships. The engine reads it through a [`CatalogSource`].
//!
//! ### Records
//!
//! A [`Record`] carries an id, a version, creation and modification timestamps
//! and a map of [`FieldValue`]s. Declared fields are validated and converted
//! to a canonical form; dynamic fields accept any scalar.
//!
//! ### Updates
//!
//! Replace (PUT) sets the exact field set. Merge (MERGE/PATCH) overlays the body
//! recursively onto nested objects. Both bump the version.
//!
//! ### Concurrency
//!
//! Each record exposes a [`VersionTag`] `W/"<version>-<timestamp>"`. A
//! mutation may carry a [`Precondition`] and commits through a single-record
//! compare-and-swap in the [`DocumentStore`].
//!
//! ### Queries
//!
//! [`QueryOptions`] carries `$filter`, `$orderby`, `$select`, `$expand`, `q`,
//! `$top`, `$skip` and `$inlinecount`.
//!
//! ## Quick Start
//!
//! ```rust
//! use cellbox_engine::{
//!     Catalog, Engine, EntityType, Limits, MemoryStore, Precondition, PrimitiveKind,
//!     Property, QueryOptions, StaticCatalog,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! // 1. Declare a schema
//! let catalog = Catalog::new().with_entity_type(EntityType::new(
//!     "Pet",
//!     vec![
//!         Property::new("name", PrimitiveKind::String).not_null(),
//!         Property::new("age", PrimitiveKind::Int32),
//!     ],
//! ));
//! let limits = Limits::default();
//! let source = StaticCatalog::new(catalog, &limits).unwrap();
//!
//! // 2. Create an engine over an in-memory store
//! let engine = Engine::new(Arc::new(MemoryStore::new()), Arc::new(source), limits);
//!
//! // 3. Create and update records
//! let pochi = engine
//!     .create_record("Pet", &json!({"__id": "pochi", "name": "Pochi", "color": "white"}))
//!     .unwrap();
//! let tag = engine
//!     .merge_record("Pet", "pochi", &json!({"age": 3}), &Precondition::tag(pochi.tag()))
//!     .unwrap();
//! assert_eq!(tag.version, 2);
//!
//! // 4. Query records
//! let page = engine
//!     .list_records("Pet", &QueryOptions::new().with_filter("age ge 2"))
//!     .unwrap();
//! assert_eq!(page.entries.len(), 1);
//! assert_eq!(page.entries[0].body["color"], "white");
//! ```

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod etag;
pub mod query;
pub mod record;
pub mod schema;
pub mod source;
pub mod store;
pub mod update;
pub mod validate;
pub mod value;

// Re-export main types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Limits;
pub use engine::{Engine, Entry, Page};
pub use error::{Error, ErrorKind};
pub use etag::{Precondition, VersionTag};
pub use query::{InlineCount, ListQuery, QueryOptions, RecordQuery};
pub use record::Record;
pub use schema::{
    AssociationEnd, Catalog, CollectionKind, ComplexType, ComplexTypeProperty, EntityType,
    FieldType, Multiplicity, Navigation, PrimitiveKind, Property,
};
pub use source::{CachedCatalog, CatalogSource, StaticCatalog};
pub use store::{DocumentStore, MemoryStore, RecordKey};
pub use update::UpdateMode;
pub use validate::{Mode, Validator};
pub use value::{FieldValue, Fields, Scalar};

/// Type aliases for clarity
pub type RecordId = String;
pub type EntityTypeName = String;
pub type Version = u64;
pub type Timestamp = u64;

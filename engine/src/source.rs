//! Where the engine gets its schema catalog from.
//!
//! Schema objects are managed elsewhere; the engine only reads them through a
//! [`CatalogSource`]. [`CachedCatalog`] loads lazily, validates once and keeps
//! the result until [`CatalogSource::invalidate`] is called.

use crate::{error::Result, schema::Catalog, Limits};
use parking_lot::RwLock;
use std::sync::Arc;

/// Supplier of the current schema catalog.
pub trait CatalogSource: Send + Sync {
    fn catalog(&self) -> Result<Arc<Catalog>>;

    /// Drop any cached state so the next read sees fresh definitions.
    fn invalidate(&self) {}
}

/// A fixed catalog, validated up front.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    catalog: Arc<Catalog>,
}

impl StaticCatalog {
    pub fn new(catalog: Catalog, limits: &Limits) -> Result<Self> {
        catalog.validate(limits)?;
        Ok(Self {
            catalog: Arc::new(catalog),
        })
    }
}

impl CatalogSource for StaticCatalog {
    fn catalog(&self) -> Result<Arc<Catalog>> {
        Ok(Arc::clone(&self.catalog))
    }
}

type Loader = Box<dyn Fn() -> Result<Catalog> + Send + Sync>;

/// Lazily loaded catalog that stays cached until invalidated.
pub struct CachedCatalog {
    loader: Loader,
    limits: Limits,
    cached: RwLock<Option<Arc<Catalog>>>,
}

impl CachedCatalog {
    pub fn new<F>(limits: Limits, loader: F) -> Self
    where
        F: Fn() -> Result<Catalog> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            limits,
            cached: RwLock::new(None),
        }
    }

    /// Whether a catalog is currently cached.
    pub fn is_loaded(&self) -> bool {
        self.cached.read().is_some()
    }
}

impl std::fmt::Debug for CachedCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCatalog")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl CatalogSource for CachedCatalog {
    fn catalog(&self) -> Result<Arc<Catalog>> {
        if let Some(catalog) = self.cached.read().as_ref() {
            return Ok(Arc::clone(catalog));
        }

        let mut cached = self.cached.write();
        // Another reader may have loaded it while we waited for the lock.
        if let Some(catalog) = cached.as_ref() {
            return Ok(Arc::clone(catalog));
        }
        let catalog = (self.loader)()?;
        catalog.validate(&self.limits)?;
        let catalog = Arc::new(catalog);
        *cached = Some(Arc::clone(&catalog));
        tracing::debug!(
            entity_types = catalog.entity_types.len(),
            complex_types = catalog.complex_types.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    fn invalidate(&self) {
        *self.cached.write() = None;
        tracing::debug!("catalog invalidated");
    }
}

//! `$expand` navigation lists.

use crate::{error::Result, schema::Catalog, Error};

const OPTION: &str = "$expand";

/// Navigation properties to inline, in request order without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expand {
    names: Vec<String>,
}

impl Expand {
    /// Parse `$expand` for an entity type; `cap` bounds the distinct names.
    pub fn parse(source: &str, catalog: &Catalog, entity_type: &str, cap: usize) -> Result<Self> {
        let mut names: Vec<String> = Vec::new();
        if source.trim().is_empty() {
            return Ok(Self { names });
        }
        for item in source.split(',').map(str::trim) {
            if item.is_empty() {
                return Err(Error::syntax(OPTION, "empty item"));
            }
            if catalog.navigation(entity_type, item).is_none() {
                return Err(Error::syntax(
                    OPTION,
                    format!("'{}' is not a navigation property of {}", item, entity_type),
                ));
            }
            if !names.iter().any(|n| n == item) {
                names.push(item.to_string());
            }
        }
        if names.len() > cap {
            return Err(Error::limit(
                OPTION,
                format!("{} navigation properties exceeds limit of {}", names.len(), cap),
            ));
        }
        Ok(Self { names })
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, navigation: &str) -> bool {
        self.names.iter().any(|n| n == navigation)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

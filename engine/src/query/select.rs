//! `$select` projection.

use crate::{
    error::Result,
    schema::NAVIGATION_PREFIX,
    validate::{check_name, ID_FIELD, METADATA_FIELD, PUBLISHED_FIELD, UPDATED_FIELD},
    Error,
};
use std::collections::BTreeSet;

const OPTION: &str = "$select";

/// Which fields of a record to return.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Select {
    #[default]
    All,
    Fields(BTreeSet<String>),
}

impl Select {
    pub fn parse(source: &str) -> Result<Self> {
        let mut names = BTreeSet::new();
        for item in source.split(',').map(str::trim) {
            if item.is_empty() {
                return Err(Error::syntax(OPTION, "empty item"));
            }
            if item == "*" {
                return Ok(Select::All);
            }
            check_item(item)?;
            names.insert(item.to_string());
        }
        Ok(Select::Fields(names))
    }

    /// Whether a top-level key survives the projection.
    pub fn includes(&self, key: &str) -> bool {
        match self {
            Select::All => true,
            Select::Fields(names) => key == ID_FIELD || key == METADATA_FIELD || names.contains(key),
        }
    }

    pub fn apply(
        &self,
        mut body: serde_json::Map<String, serde_json::Value>,
    ) -> serde_json::Map<String, serde_json::Value> {
        if !matches!(self, Select::All) {
            body.retain(|key, _| self.includes(key));
        }
        body
    }
}

/// A system field, a property name or a `_Target` navigation name.
fn check_item(item: &str) -> Result<()> {
    if [ID_FIELD, PUBLISHED_FIELD, UPDATED_FIELD, METADATA_FIELD].contains(&item) {
        return Ok(());
    }
    let name = item.strip_prefix(NAVIGATION_PREFIX).unwrap_or(item);
    check_name("property", name, usize::MAX)
        .map_err(|_| Error::syntax(OPTION, format!("'{}' is not a property name", item)))
}

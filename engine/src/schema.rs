//! Schema catalog.
//!
//! The catalog holds the entity types, complex types and association ends that
//! records are validated and navigated against. It is a pure lookup structure:
//! the engine consumes it but never mutates it.

use crate::{error::Result, validate, EntityTypeName, Error, Limits};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Primitive property types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    #[serde(rename = "Edm.String")]
    String,
    #[serde(rename = "Edm.Int32")]
    Int32,
    /// Narrow-precision float: at most five integer and five fractional digits
    #[serde(rename = "Edm.Single")]
    Single,
    #[serde(rename = "Edm.Double")]
    Double,
    #[serde(rename = "Edm.Boolean")]
    Boolean,
    /// Milliseconds since epoch, written as `/Date(<ms>)/`
    #[serde(rename = "Edm.DateTime")]
    DateTime,
    /// Declared name whose scalar type is not fixed
    #[serde(rename = "Edm.Untyped")]
    Untyped,
}

impl PrimitiveKind {
    /// All primitive kinds.
    pub const ALL: [PrimitiveKind; 7] = [
        PrimitiveKind::String,
        PrimitiveKind::Int32,
        PrimitiveKind::Single,
        PrimitiveKind::Double,
        PrimitiveKind::Boolean,
        PrimitiveKind::DateTime,
        PrimitiveKind::Untyped,
    ];

    /// The `Edm.*` name of this kind.
    pub fn edm_name(self) -> &'static str {
        match self {
            PrimitiveKind::String => "Edm.String",
            PrimitiveKind::Int32 => "Edm.Int32",
            PrimitiveKind::Single => "Edm.Single",
            PrimitiveKind::Double => "Edm.Double",
            PrimitiveKind::Boolean => "Edm.Boolean",
            PrimitiveKind::DateTime => "Edm.DateTime",
            PrimitiveKind::Untyped => "Edm.Untyped",
        }
    }

    /// Parse an `Edm.*` name.
    pub fn from_edm_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.edm_name() == name)
    }

    /// Whether values of this kind are numbers.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Int32 | PrimitiveKind::Single | PrimitiveKind::Double
        )
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.edm_name())
    }
}

/// Type of a declared property: a primitive or the name of a complex type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Primitive(PrimitiveKind),
    Complex(String),
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        match PrimitiveKind::from_edm_name(&name) {
            Some(kind) => FieldType::Primitive(kind),
            None => FieldType::Complex(name),
        }
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.to_string()
    }
}

impl From<PrimitiveKind> for FieldType {
    fn from(kind: PrimitiveKind) -> Self {
        FieldType::Primitive(kind)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Primitive(kind) => write!(f, "{}", kind),
            FieldType::Complex(name) => f.write_str(name),
        }
    }
}

/// Whether a property holds one value or a list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    #[default]
    None,
    List,
}

/// A declared field of an entity type or complex type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// Field name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether null is accepted
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Single value or list
    #[serde(default)]
    pub collection_kind: CollectionKind,
    /// Value applied when the field is omitted on create or replace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
}

fn default_nullable() -> bool {
    true
}

/// Fields of a complex type share the shape of entity type properties.
pub type ComplexTypeProperty = Property;

impl Property {
    /// Create a nullable single-valued property.
    pub fn new(name: impl Into<String>, field_type: impl Into<FieldType>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            nullable: true,
            collection_kind: CollectionKind::None,
            default_value: None,
        }
    }

    /// Create a property whose type is the named complex type.
    pub fn complex(name: impl Into<String>, complex_type: impl Into<String>) -> Self {
        Self::new(name, FieldType::Complex(complex_type.into()))
    }

    /// Builder-style: reject null.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Builder-style: hold a list of the declared type.
    pub fn list(mut self) -> Self {
        self.collection_kind = CollectionKind::List;
        self
    }

    /// Builder-style: default value for omitted fields.
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn is_list(&self) -> bool {
        self.collection_kind == CollectionKind::List
    }

    /// Primitive kind, if the property is not complex.
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self.field_type {
            FieldType::Primitive(kind) => Some(kind),
            FieldType::Complex(_) => None,
        }
    }

    /// Human-readable type, e.g. `Edm.Int32` or `List(Address)`.
    pub fn type_label(&self) -> String {
        if self.is_list() {
            format!("List({})", self.field_type)
        } else {
            self.field_type.to_string()
        }
    }
}

/// A record kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityType {
    /// Entity type name
    pub name: EntityTypeName,
    /// Declared properties
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl EntityType {
    pub fn new(name: impl Into<EntityTypeName>, properties: Vec<Property>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    /// Look up a declared property.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// A named nested structure type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexType {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<ComplexTypeProperty>,
}

impl ComplexType {
    pub fn new(name: impl Into<String>, properties: Vec<ComplexTypeProperty>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&ComplexTypeProperty> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Cardinality of one side of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    #[serde(rename = "0..1")]
    ZeroOrOne,
    #[serde(rename = "1")]
    One,
    #[serde(rename = "*")]
    Many,
}

impl Multiplicity {
    /// Whether at most one record may sit on this side.
    pub fn is_single(self) -> bool {
        !matches!(self, Multiplicity::Many)
    }
}

impl std::fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Multiplicity::ZeroOrOne => write!(f, "0..1"),
            Multiplicity::One => write!(f, "1"),
            Multiplicity::Many => write!(f, "*"),
        }
    }
}

/// One side of a relationship between two entity types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationEnd {
    /// End name, unique within its entity type
    pub name: String,
    /// Entity type on this side
    pub entity_type: EntityTypeName,
    /// How many records may sit on this side of one link
    pub multiplicity: Multiplicity,
    /// Name of the paired end
    pub partner: String,
    /// Entity type of the paired end
    pub partner_type: EntityTypeName,
}

impl AssociationEnd {
    /// Create an unpaired end; [`Catalog::with_association`] fills the partner.
    pub fn new(
        name: impl Into<String>,
        entity_type: impl Into<EntityTypeName>,
        multiplicity: Multiplicity,
    ) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            multiplicity,
            partner: String::new(),
            partner_type: EntityTypeName::new(),
        }
    }
}

/// A resolved navigation property: the end on the source entity type and its
/// partner on the target entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation<'a> {
    pub source: &'a AssociationEnd,
    pub target: &'a AssociationEnd,
}

impl Navigation<'_> {
    /// Navigation property name, `_` followed by the target entity type.
    pub fn name(&self) -> String {
        navigation_name(&self.target.entity_type)
    }

    pub fn target_type(&self) -> &str {
        &self.target.entity_type
    }

    /// Both ends are `*`.
    pub fn is_many_to_many(&self) -> bool {
        !self.source.multiplicity.is_single() && !self.target.multiplicity.is_single()
    }
}

/// Prefix marking a navigation property.
pub const NAVIGATION_PREFIX: char = '_';

/// Navigation property name for a target entity type.
pub fn navigation_name(target: &str) -> String {
    format!("{}{}", NAVIGATION_PREFIX, target)
}

/// The full set of schema definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    /// Entity types by name
    #[serde(default)]
    pub entity_types: HashMap<EntityTypeName, EntityType>,
    /// Complex types by name
    #[serde(default)]
    pub complex_types: HashMap<String, ComplexType>,
    /// Association ends, paired by `partner`
    #[serde(default)]
    pub association_ends: Vec<AssociationEnd>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity type.
    pub fn add_entity_type(&mut self, entity_type: EntityType) -> &mut Self {
        self.entity_types
            .insert(entity_type.name.clone(), entity_type);
        self
    }

    /// Builder-style method to add an entity type.
    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.add_entity_type(entity_type);
        self
    }

    /// Builder-style method to add a complex type.
    pub fn with_complex_type(mut self, complex_type: ComplexType) -> Self {
        self.complex_types
            .insert(complex_type.name.clone(), complex_type);
        self
    }

    /// Builder-style method to pair two ends into an association.
    pub fn with_association(mut self, mut a: AssociationEnd, mut b: AssociationEnd) -> Self {
        a.partner = b.name.clone();
        a.partner_type = b.entity_type.clone();
        b.partner = a.name.clone();
        b.partner_type = a.entity_type.clone();
        self.association_ends.push(a);
        self.association_ends.push(b);
        self
    }

    /// Look up an entity type.
    pub fn entity_type(&self, name: &str) -> Result<&EntityType> {
        self.entity_types
            .get(name)
            .ok_or_else(|| Error::EntityTypeNotFound(name.to_string()))
    }

    /// Look up a complex type.
    pub fn complex_type(&self, name: &str) -> Option<&ComplexType> {
        self.complex_types.get(name)
    }

    /// The end paired with `end`. End names are only unique per entity type,
    /// so both sides must name each other's type as well.
    pub fn partner_of(&self, end: &AssociationEnd) -> Option<&AssociationEnd> {
        self.association_ends.iter().find(|other| {
            !std::ptr::eq(*other, end)
                && other.name == end.partner
                && other.entity_type == end.partner_type
                && other.partner == end.name
                && other.partner_type == end.entity_type
        })
    }

    /// All navigation properties of an entity type, sorted by name.
    pub fn navigations(&self, entity_type: &str) -> Vec<Navigation<'_>> {
        let mut navs: Vec<_> = self
            .association_ends
            .iter()
            .filter(|end| end.entity_type == entity_type)
            .filter_map(|source| {
                self.partner_of(source)
                    .map(|target| Navigation { source, target })
            })
            .collect();
        navs.sort_by(|a, b| a.target.entity_type.cmp(&b.target.entity_type));
        navs
    }

    /// Resolve a `_Target` navigation property on an entity type.
    pub fn navigation(&self, entity_type: &str, name: &str) -> Option<Navigation<'_>> {
        let target = name.strip_prefix(NAVIGATION_PREFIX)?;
        if target.is_empty() {
            return None;
        }
        self.navigations(entity_type)
            .into_iter()
            .find(|nav| nav.target.entity_type == target)
    }

    /// Check the catalog for internal consistency.
    ///
    /// Rejects bad names, duplicate properties, unknown or cyclic complex type
    /// references, dangling association ends and default values that do not
    /// conform to their property type.
    pub fn validate(&self, limits: &Limits) -> Result<()> {
        for (key, entity_type) in &self.entity_types {
            if *key != entity_type.name {
                return Err(Error::InvalidCatalog(format!(
                    "entity type registered as '{}' is named '{}'",
                    key, entity_type.name
                )));
            }
            validate::check_name("entity type", &entity_type.name, limits.max_name_length)?;
            self.validate_properties(&entity_type.name, &entity_type.properties, limits)?;
        }

        for (key, complex_type) in &self.complex_types {
            if *key != complex_type.name {
                return Err(Error::InvalidCatalog(format!(
                    "complex type registered as '{}' is named '{}'",
                    key, complex_type.name
                )));
            }
            validate::check_name("complex type", &complex_type.name, limits.max_name_length)?;
            self.validate_properties(&complex_type.name, &complex_type.properties, limits)?;
        }

        self.check_complex_cycles()?;
        self.validate_associations()?;

        let validator = validate::Validator::new(self, limits, 0);
        for entity_type in self.entity_types.values() {
            validator.check_defaults(&entity_type.properties)?;
        }
        for complex_type in self.complex_types.values() {
            validator.check_defaults(&complex_type.properties)?;
        }

        Ok(())
    }

    fn validate_properties(&self, owner: &str, properties: &[Property], limits: &Limits) -> Result<()> {
        let mut seen = HashSet::new();
        for property in properties {
            validate::check_name("property", &property.name, limits.max_name_length)?;
            if !seen.insert(property.name.as_str()) {
                return Err(Error::InvalidCatalog(format!(
                    "duplicate property '{}' in {}",
                    property.name, owner
                )));
            }
            if let FieldType::Complex(name) = &property.field_type {
                if !self.complex_types.contains_key(name) {
                    return Err(Error::UnknownComplexType(name.clone()));
                }
            }
        }
        Ok(())
    }

    fn check_complex_cycles(&self) -> Result<()> {
        fn visit<'a>(
            catalog: &'a Catalog,
            name: &'a str,
            path: &mut Vec<&'a str>,
            done: &mut HashSet<&'a str>,
        ) -> Result<()> {
            if done.contains(name) {
                return Ok(());
            }
            if path.contains(&name) {
                return Err(Error::InvalidCatalog(format!(
                    "complex type '{}' contains itself",
                    name
                )));
            }
            path.push(name);
            if let Some(complex_type) = catalog.complex_types.get(name) {
                for property in &complex_type.properties {
                    if let FieldType::Complex(inner) = &property.field_type {
                        visit(catalog, inner, path, done)?;
                    }
                }
            }
            path.pop();
            done.insert(name);
            Ok(())
        }

        let mut done = HashSet::new();
        for name in self.complex_types.keys() {
            visit(self, name, &mut Vec::new(), &mut done)?;
        }
        Ok(())
    }

    fn validate_associations(&self) -> Result<()> {
        let mut pairs = HashSet::new();
        let mut names = HashSet::new();
        for end in &self.association_ends {
            if !self.entity_types.contains_key(&end.entity_type) {
                return Err(Error::InvalidCatalog(format!(
                    "association end '{}' refers to unknown entity type '{}'",
                    end.name, end.entity_type
                )));
            }
            if !names.insert((end.entity_type.as_str(), end.name.as_str())) {
                return Err(Error::InvalidCatalog(format!(
                    "duplicate association end '{}' on {}",
                    end.name, end.entity_type
                )));
            }
            let partner = self.partner_of(end).ok_or_else(|| {
                Error::InvalidCatalog(format!("association end '{}' has no partner", end.name))
            })?;
            // One association per ordered pair of entity types keeps `_Target` unambiguous.
            if !pairs.insert((end.entity_type.as_str(), partner.entity_type.as_str())) {
                return Err(Error::InvalidCatalog(format!(
                    "more than one association between {} and {}",
                    end.entity_type, partner.entity_type
                )));
            }
        }
        Ok(())
    }
}

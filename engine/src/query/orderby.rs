//! `$orderby` parsing and record comparison.

use crate::{
    error::Result,
    schema::{EntityType, FieldType, PrimitiveKind},
    validate::{self, parse_datetime, ID_FIELD, PUBLISHED_FIELD, UPDATED_FIELD},
    value::{FieldValue, Scalar},
    Error, Record,
};
use std::cmp::Ordering;

const OPTION: &str = "$orderby";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// What a sort key reads from a record.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SortMember {
    Id,
    Published,
    Updated,
    Field { name: String, datetime: bool },
}

impl SortMember {
    fn value(&self, record: &Record) -> Option<Scalar> {
        match self {
            SortMember::Id => Some(Scalar::String(record.id.clone())),
            SortMember::Published => Some(Scalar::Int(record.published as i64)),
            SortMember::Updated => Some(Scalar::Int(record.updated as i64)),
            SortMember::Field { name, datetime } => match record.fields.get(name)? {
                FieldValue::Scalar(Scalar::String(s)) if *datetime => {
                    parse_datetime(s).map(Scalar::Int)
                }
                FieldValue::Scalar(scalar) => Some(scalar.clone()),
                _ => None,
            },
        }
    }
}

/// One `prop [asc|desc]` item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    member: SortMember,
    pub direction: Direction,
}

/// A parsed `$orderby`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    keys: Vec<OrderKey>,
}

impl Default for OrderBy {
    /// Creation order.
    fn default() -> Self {
        Self {
            keys: vec![OrderKey {
                member: SortMember::Published,
                direction: Direction::Asc,
            }],
        }
    }
}

impl OrderBy {
    /// Parse `$orderby` against an entity type.
    pub fn parse(source: &str, entity_type: &EntityType) -> Result<Self> {
        let keys = source
            .split(',')
            .map(|item| parse_key(item.trim(), entity_type))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keys })
    }

    /// Compare two records. Ties fall back to `__id` ascending.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.keys
            .iter()
            .map(|key| {
                let ordering = compare_values(key.member.value(a), key.member.value(b));
                match key.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }

    pub fn sort(&self, records: &mut [Record]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

fn parse_key(item: &str, entity_type: &EntityType) -> Result<OrderKey> {
    let mut parts = item.split_whitespace();
    let name = parts
        .next()
        .ok_or_else(|| Error::syntax(OPTION, "empty sort key"))?;
    let direction = match parts.next() {
        None | Some("asc") => Direction::Asc,
        Some("desc") => Direction::Desc,
        Some(other) => {
            return Err(Error::syntax(
                OPTION,
                format!("invalid direction '{}'", other),
            ));
        }
    };
    if let Some(extra) = parts.next() {
        return Err(Error::syntax(
            OPTION,
            format!("unexpected '{}' after sort key", extra),
        ));
    }

    let member = match name {
        ID_FIELD => SortMember::Id,
        PUBLISHED_FIELD => SortMember::Published,
        UPDATED_FIELD => SortMember::Updated,
        _ => {
            validate::check_name("sort key", name, usize::MAX)
                .map_err(|_| Error::syntax(OPTION, format!("invalid sort key '{}'", name)))?;
            let datetime = match entity_type.property(name) {
                Some(property) if property.is_list() => {
                    return Err(Error::syntax(
                        OPTION,
                        format!("cannot sort by list property '{}'", name),
                    ));
                }
                Some(property) => match property.field_type {
                    FieldType::Complex(_) => {
                        return Err(Error::syntax(
                            OPTION,
                            format!("cannot sort by complex property '{}'", name),
                        ));
                    }
                    FieldType::Primitive(kind) => kind == PrimitiveKind::DateTime,
                },
                None => false,
            };
            SortMember::Field {
                name: name.to_string(),
                datetime,
            }
        }
    };
    Ok(OrderKey { member, direction })
}

/// Missing sorts first, then booleans, numbers and strings.
fn compare_values(a: Option<Scalar>, b: Option<Scalar>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a
            .kind_rank()
            .cmp(&b.kind_rank())
            .then_with(|| a.compare(&b).unwrap_or(Ordering::Equal)),
    }
}

//! Type coercion and validation.
//!
//! Two regimes coexist in one record. A key with a schema entry takes the strict
//! path: its value must conform to the declared type and is converted to the
//! canonical representation. A key without one takes the permissive path: any
//! scalar is accepted as-is and the type may change between writes, but
//! objects are refused.
//!
//! Each primitive kind maps to one check function via [`checker`].

use crate::{
    error::Result,
    schema::{Catalog, EntityType, FieldType, PrimitiveKind, Property},
    value::{FieldValue, Fields, Scalar},
    Error, Limits, RecordId, Timestamp,
};

/// Record key field.
pub const ID_FIELD: &str = "__id";
/// Creation timestamp system field.
pub const PUBLISHED_FIELD: &str = "__published";
/// Last-modified timestamp system field.
pub const UPDATED_FIELD: &str = "__updated";
/// Metadata system field.
pub const METADATA_FIELD: &str = "__metadata";

/// Fields clients may never write.
pub const SYSTEM_FIELDS: [&str; 3] = [PUBLISHED_FIELD, UPDATED_FIELD, METADATA_FIELD];

/// Earliest accepted `Edm.DateTime` in milliseconds (1753-01-01T00:00:00Z).
pub const DATETIME_MIN: i64 = -6_847_804_800_000;
/// Latest accepted `Edm.DateTime` in milliseconds (9999-12-31T23:59:59.999Z).
pub const DATETIME_MAX: i64 = 253_402_300_799_999;

/// Keyword resolving a `Edm.DateTime` value to the current time.
pub const SYSUTCDATETIME: &str = "SYSUTCDATETIME()";

const SINGLE_MAX_DIGITS: usize = 5;
const DOUBLE_MIN_MAGNITUDE: f64 = 2.23e-308;
const DOUBLE_MAX_MAGNITUDE: f64 = 1.79e308;

/// Check a property, entity type or complex type name.
///
/// ASCII letters and digits, plus `-` and `_` after the first character.
pub fn check_name(what: &'static str, name: &str, max_len: usize) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphanumeric()
                && name.len() <= max_len
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName {
            what,
            name: name.to_string(),
        })
    }
}

/// Check a record `__id`.
///
/// Like [`check_name`], with `:` also allowed after the first character.
pub fn check_id(id: &str, max_len: usize) -> Result<()> {
    let mut chars = id.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphanumeric()
                && id.len() <= max_len
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName {
            what: "record id",
            name: id.to_string(),
        })
    }
}

/// Format milliseconds as an `Edm.DateTime` string.
pub fn format_datetime(ms: i64) -> String {
    format!("/Date({})/", ms)
}

/// Parse a `/Date(<ms>)/` string.
pub fn parse_datetime(s: &str) -> Option<i64> {
    s.strip_prefix("/Date(")?
        .strip_suffix(")/")?
        .parse()
        .ok()
}

/// Whether partially supplied objects are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Create and replace: omitted fields take defaults, required fields must be present.
    Full,
    /// Merge: only supplied fields are checked.
    Partial,
}

/// A validated request body.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    /// `__id` when supplied as a string
    pub id: Option<RecordId>,
    /// Canonical field values
    pub fields: Fields,
}

type CheckFn = fn(&Validator<'_>, &str, &Scalar) -> Result<Scalar>;

/// Validation function for a primitive kind.
pub fn checker(kind: PrimitiveKind) -> CheckFn {
    match kind {
        PrimitiveKind::String => check_string,
        PrimitiveKind::Int32 => check_int32,
        PrimitiveKind::Single => check_single,
        PrimitiveKind::Double => check_double,
        PrimitiveKind::Boolean => check_boolean,
        PrimitiveKind::DateTime => check_datetime,
        PrimitiveKind::Untyped => check_untyped,
    }
}

fn check_string(v: &Validator<'_>, field: &str, value: &Scalar) -> Result<Scalar> {
    match value {
        Scalar::String(s) => {
            v.check_length(field, s)?;
            Ok(value.clone())
        }
        other => Err(Error::type_mismatch(field, PrimitiveKind::String, other.kind_name())),
    }
}

fn check_int32(_: &Validator<'_>, field: &str, value: &Scalar) -> Result<Scalar> {
    let int = match value {
        Scalar::Int(i) => *i,
        Scalar::Float(f) if f.fract() == 0.0 && f.is_finite() => *f as i64,
        other => {
            return Err(Error::type_mismatch(field, PrimitiveKind::Int32, other.kind_name()));
        }
    };
    if i32::try_from(int).is_err() {
        return Err(Error::InvalidValue {
            field: field.to_string(),
            detail: format!("{} is outside the 32-bit integer range", int),
        });
    }
    Ok(Scalar::Int(int))
}

fn check_single(_: &Validator<'_>, field: &str, value: &Scalar) -> Result<Scalar> {
    let (int_digits, frac_digits) = match value {
        Scalar::Int(i) => (i.unsigned_abs().to_string().len(), 0),
        Scalar::Float(f) if f.is_finite() => float_digits(*f),
        other => {
            return Err(Error::type_mismatch(field, PrimitiveKind::Single, other.kind_name()));
        }
    };
    if int_digits > SINGLE_MAX_DIGITS || frac_digits > SINGLE_MAX_DIGITS {
        return Err(Error::InvalidValue {
            field: field.to_string(),
            detail: format!(
                "at most {} integer and {} fractional digits allowed",
                SINGLE_MAX_DIGITS, SINGLE_MAX_DIGITS
            ),
        });
    }
    Ok(value.clone())
}

/// Integer and fractional digit counts of a float's shortest decimal form.
pub(crate) fn float_digits(f: f64) -> (usize, usize) {
    let text = f.abs().to_string();
    match text.split_once('.') {
        Some((int, frac)) => (int.len(), frac.len()),
        None => (text.len(), 0),
    }
}

fn check_double(_: &Validator<'_>, field: &str, value: &Scalar) -> Result<Scalar> {
    let number = match value.as_f64() {
        Some(n) => n,
        None => {
            return Err(Error::type_mismatch(field, PrimitiveKind::Double, value.kind_name()));
        }
    };
    let magnitude = number.abs();
    if number != 0.0 && !(DOUBLE_MIN_MAGNITUDE..=DOUBLE_MAX_MAGNITUDE).contains(&magnitude) {
        return Err(Error::InvalidValue {
            field: field.to_string(),
            detail: format!("{} is outside the double range", number),
        });
    }
    Ok(value.clone())
}

fn check_boolean(_: &Validator<'_>, field: &str, value: &Scalar) -> Result<Scalar> {
    match value {
        Scalar::Bool(_) => Ok(value.clone()),
        other => Err(Error::type_mismatch(field, PrimitiveKind::Boolean, other.kind_name())),
    }
}

fn check_datetime(v: &Validator<'_>, field: &str, value: &Scalar) -> Result<Scalar> {
    let text = match value {
        Scalar::String(s) => s,
        other => {
            return Err(Error::type_mismatch(field, PrimitiveKind::DateTime, other.kind_name()));
        }
    };
    let ms = if text.eq_ignore_ascii_case(SYSUTCDATETIME) {
        v.now as i64
    } else {
        parse_datetime(text).ok_or_else(|| Error::InvalidValue {
            field: field.to_string(),
            detail: format!("'{}' is not of the form /Date(<ms>)/", text),
        })?
    };
    if !(DATETIME_MIN..=DATETIME_MAX).contains(&ms) {
        return Err(Error::InvalidValue {
            field: field.to_string(),
            detail: format!("{} is outside the supported date range", ms),
        });
    }
    Ok(Scalar::String(format_datetime(ms)))
}

fn check_untyped(v: &Validator<'_>, field: &str, value: &Scalar) -> Result<Scalar> {
    if let Scalar::String(s) = value {
        v.check_length(field, s)?;
    }
    Ok(value.clone())
}

/// Validates request bodies against the catalog.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    catalog: &'a Catalog,
    limits: &'a Limits,
    now: Timestamp,
}

impl<'a> Validator<'a> {
    /// `now` resolves `SYSUTCDATETIME()` values.
    pub fn new(catalog: &'a Catalog, limits: &'a Limits, now: Timestamp) -> Self {
        Self {
            catalog,
            limits,
            now,
        }
    }

    fn check_length(&self, field: &str, s: &str) -> Result<()> {
        let units = s.encode_utf16().count();
        if units > self.limits.max_string_length {
            return Err(Error::InvalidValue {
                field: field.to_string(),
                detail: format!(
                    "string of {} units exceeds limit of {}",
                    units, self.limits.max_string_length
                ),
            });
        }
        Ok(())
    }

    /// Validate a client body for an entity type.
    pub fn validate_body(
        &self,
        entity_type: &EntityType,
        body: &serde_json::Value,
        mode: Mode,
    ) -> Result<Body> {
        let object = body
            .as_object()
            .ok_or_else(|| Error::InvalidPayload("body must be a JSON object".into()))?;

        let mut id = None;
        let mut fields = Fields::new();
        for (key, raw) in object {
            if key == ID_FIELD {
                id = match raw {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => {
                        check_id(s, self.limits.max_id_length)?;
                        Some(s.clone())
                    }
                    other => {
                        return Err(Error::type_mismatch(
                            ID_FIELD,
                            PrimitiveKind::String,
                            FieldValue::from(other).kind_name(),
                        ));
                    }
                };
                continue;
            }
            if SYSTEM_FIELDS.contains(&key.as_str()) {
                return Err(Error::ReservedField(key.clone()));
            }
            check_name("property", key, self.limits.max_name_length)?;

            let value = FieldValue::from(raw);
            let canonical = match entity_type.property(key) {
                Some(property) => self.validate_declared(key, property, &value, mode)?,
                None => self.validate_dynamic(key, &value)?,
            };
            fields.insert(key.clone(), canonical);
        }

        if mode == Mode::Full {
            self.fill_omitted("", &entity_type.properties, &mut fields)?;
        }

        Ok(Body { id, fields })
    }

    /// Validate a value against a declared property.
    pub fn validate_declared(
        &self,
        path: &str,
        property: &Property,
        value: &FieldValue,
        mode: Mode,
    ) -> Result<FieldValue> {
        match value {
            FieldValue::Null if property.nullable => Ok(FieldValue::Null),
            FieldValue::Null => Err(Error::type_mismatch(path, property.type_label(), "Null")),
            FieldValue::List(items) if property.is_list() => items
                .iter()
                .map(|item| match item {
                    FieldValue::Null => {
                        Err(Error::type_mismatch(path, &property.field_type, "Null"))
                    }
                    FieldValue::List(_) => {
                        Err(Error::type_mismatch(path, &property.field_type, "List"))
                    }
                    item => self.validate_element(path, property, item, mode),
                })
                .collect::<Result<Vec<_>>>()
                .map(FieldValue::List),
            FieldValue::List(_) => Err(Error::type_mismatch(path, property.type_label(), "List")),
            other if property.is_list() => {
                Err(Error::type_mismatch(path, property.type_label(), other.kind_name()))
            }
            other => self.validate_element(path, property, other, mode),
        }
    }

    fn validate_element(
        &self,
        path: &str,
        property: &Property,
        value: &FieldValue,
        mode: Mode,
    ) -> Result<FieldValue> {
        match (&property.field_type, value) {
            (FieldType::Primitive(kind), FieldValue::Scalar(scalar)) => {
                checker(*kind)(self, path, scalar).map(FieldValue::Scalar)
            }
            (FieldType::Complex(name), FieldValue::Object(fields)) => {
                self.validate_complex(path, name, fields, mode)
            }
            (field_type, other) => Err(Error::type_mismatch(path, field_type, other.kind_name())),
        }
    }

    fn validate_complex(
        &self,
        path: &str,
        complex_name: &str,
        fields: &Fields,
        mode: Mode,
    ) -> Result<FieldValue> {
        let complex_type = self
            .catalog
            .complex_type(complex_name)
            .ok_or_else(|| Error::UnknownComplexType(complex_name.to_string()))?;

        let mut out = Fields::new();
        for (key, value) in fields {
            let child_path = format!("{}/{}", path, key);
            if SYSTEM_FIELDS.contains(&key.as_str()) || key == ID_FIELD {
                return Err(Error::ReservedField(child_path));
            }
            let property =
                complex_type
                    .property(key)
                    .ok_or_else(|| Error::UndeclaredComplexField {
                        complex_type: complex_type.name.clone(),
                        field: child_path.clone(),
                    })?;
            out.insert(
                key.clone(),
                self.validate_declared(&child_path, property, value, mode)?,
            );
        }

        if mode == Mode::Full {
            self.fill_omitted(path, &complex_type.properties, &mut out)?;
        }
        Ok(FieldValue::Object(out))
    }

    /// Check the complex values of a merged field set in full mode.
    ///
    /// Nested defaults are filled and required nested fields enforced, also
    /// where a partial object landed on a missing or null stored value or
    /// inside a list.
    pub fn complete_nested(&self, entity_type: &EntityType, fields: &mut Fields) -> Result<()> {
        for property in &entity_type.properties {
            if !matches!(property.field_type, FieldType::Complex(_)) {
                continue;
            }
            if let Some(value) = fields.get_mut(&property.name) {
                if !matches!(value, FieldValue::Null) {
                    *value = self.validate_declared(&property.name, property, value, Mode::Full)?;
                }
            }
        }
        Ok(())
    }

    /// Apply defaults to omitted declared fields and reject omitted required ones.
    fn fill_omitted(&self, path: &str, properties: &[Property], fields: &mut Fields) -> Result<()> {
        for property in properties {
            if fields.contains_key(&property.name) {
                continue;
            }
            let child_path = if path.is_empty() {
                property.name.clone()
            } else {
                format!("{}/{}", path, property.name)
            };
            match &property.default_value {
                Some(default) => {
                    let value = self.validate_declared(
                        &child_path,
                        property,
                        &FieldValue::from(default),
                        Mode::Full,
                    )?;
                    fields.insert(property.name.clone(), value);
                }
                None if !property.nullable => {
                    return Err(Error::MissingRequiredField(child_path));
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Validate a value for a key with no schema entry.
    pub fn validate_dynamic(&self, key: &str, value: &FieldValue) -> Result<FieldValue> {
        match value {
            FieldValue::Null => Ok(FieldValue::Null),
            FieldValue::Scalar(scalar) => {
                check_untyped(self, key, scalar).map(FieldValue::Scalar)
            }
            FieldValue::Object(_) => Err(Error::UndeclaredObject(key.to_string())),
            FieldValue::List(items) => {
                let mut rank = None;
                for item in items {
                    let scalar = match item {
                        FieldValue::Scalar(s) => s,
                        FieldValue::Object(_) | FieldValue::List(_) => {
                            return Err(Error::UndeclaredObject(key.to_string()));
                        }
                        FieldValue::Null => {
                            return Err(Error::type_mismatch(key, "List of scalars", "Null"));
                        }
                    };
                    check_untyped(self, key, scalar)?;
                    match rank {
                        None => rank = Some(scalar.kind_rank()),
                        Some(r) if r != scalar.kind_rank() => {
                            return Err(Error::type_mismatch(
                                key,
                                "homogeneous List",
                                scalar.kind_name(),
                            ));
                        }
                        Some(_) => {}
                    }
                }
                Ok(value.clone())
            }
        }
    }

    /// Check that every default value conforms to its property.
    pub fn check_defaults(&self, properties: &[Property]) -> Result<()> {
        for property in properties {
            if let Some(default) = &property.default_value {
                self.validate_declared(
                    &property.name,
                    property,
                    &FieldValue::from(default),
                    Mode::Full,
                )?;
            }
        }
        Ok(())
    }
}

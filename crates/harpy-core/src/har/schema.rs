//! Field bookkeeping and validation shared by every HAR entity.
//!
//! Each entity declares a static [`Schema`]: the JSON names of its fields,
//! their kinds and whether they are required. A single generic validator walks
//! a `serde_json::Value` against that schema, so intake from JSON and
//! re-validation of hand-built entities go through the same rules.

use super::timestamp::Timestamp;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Shape a field's value must have.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Timestamp,
    Entity(&'static Schema),
    List(&'static Schema),
}

impl FieldKind {
    pub fn describe(&self) -> String {
        match self {
            FieldKind::String => "string".to_string(),
            FieldKind::Integer => "integer".to_string(),
            FieldKind::Number => "number".to_string(),
            FieldKind::Boolean => "boolean".to_string(),
            FieldKind::Timestamp => "ISO-8601 timestamp".to_string(),
            FieldKind::Entity(schema) => format!("{} object", schema.entity),
            FieldKind::List(schema) => format!("list of {}", schema.entity),
        }
    }
}

/// One declared field of an entity.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl Field {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Declared fields of one entity kind, in emission order.
#[derive(Debug)]
pub struct Schema {
    pub entity: &'static str,
    pub fields: &'static [Field],
}

impl Schema {
    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.required).map(|f| f.name)
    }

    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.kind)
    }

    /// Check `value` against this schema, recursing into nested entities.
    ///
    /// Absent required fields yield [`Error::MissingValue`]; present fields of
    /// the wrong shape (including `null` on a required field) yield
    /// [`Error::Validation`]. Unknown keys are ignored and `null` on an optional
    /// field counts as absent.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let object = value.as_object().ok_or_else(|| {
            Error::validation(self.entity, "(self)", "object", shape(value))
        })?;

        for field in self.fields {
            match object.get(field.name) {
                None if field.required => {
                    return Err(Error::MissingValue {
                        entity: self.entity,
                        field: field.name,
                    });
                }
                None => {}
                Some(Value::Null) if !field.required => {}
                Some(value) => self.validate_field(field, value)?,
            }
        }

        Ok(())
    }

    fn validate_field(&self, field: &Field, value: &Value) -> Result<()> {
        let mismatch = || {
            Error::validation(self.entity, field.name, field.kind.describe(), shape(value))
        };

        match field.kind {
            FieldKind::String if value.is_string() => Ok(()),
            FieldKind::Integer if value.is_i64() => Ok(()),
            FieldKind::Number if value.is_number() => Ok(()),
            FieldKind::Boolean if value.is_boolean() => Ok(()),
            FieldKind::Timestamp => match value.as_str() {
                Some(text) if Timestamp::parse(text).is_some() => Ok(()),
                Some(text) => Err(Error::validation(
                    self.entity,
                    field.name,
                    field.kind.describe(),
                    format!("\"{}\"", text),
                )),
                None => Err(mismatch()),
            },
            FieldKind::Entity(schema) if value.is_object() => schema.validate(value),
            FieldKind::List(schema) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                for item in items {
                    if !item.is_object() {
                        return Err(Error::validation(
                            self.entity,
                            field.name,
                            field.kind.describe(),
                            format!("list containing {}", shape(item)),
                        ));
                    }
                    schema.validate(item)?;
                }
                Ok(())
            }
            _ => Err(mismatch()),
        }
    }
}

/// Name of a JSON value's shape, for error messages.
pub fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Where an entity is built from.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// The entity's valid default instance.
    Defaults,
    /// JSON text, parsed then validated.
    Json(&'a str),
    /// Already-parsed JSON, validated.
    Value(&'a Value),
}

/// Behaviour shared by every HAR entity.
///
/// `Default::default()` is the empty placeholder: every field unset, no
/// validation. [`HarEntity::with_defaults`] is the valid default instance.
pub trait HarEntity: Serialize + DeserializeOwned + Default {
    fn schema() -> &'static Schema;

    /// Valid instance used when no source is given.
    fn with_defaults() -> Self;

    /// Leading part of [`HarEntity::summary`].
    fn label(&self) -> String {
        Self::schema().entity.to_string()
    }

    /// Entity-specific rules that go beyond field shapes.
    fn check(&self) -> Result<()> {
        Ok(())
    }

    fn construct(source: Source<'_>, empty: bool) -> Result<Self> {
        if empty {
            return Ok(Self::default());
        }

        match source {
            Source::Defaults => Ok(Self::with_defaults()),
            Source::Json(text) => Self::from_json(text),
            Source::Value(value) => Self::from_value(value),
        }
    }

    fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    fn from_value(value: &Value) -> Result<Self> {
        Self::schema().validate(value)?;
        let entity: Self = Deserialize::deserialize(value)?;
        entity.check()?;
        Ok(entity)
    }

    /// Re-run validation on an entity built by field assignment.
    fn validate(&self) -> Result<()> {
        let value = serde_json::to_value(self)?;
        Self::schema().validate(&value)?;
        self.check()
    }

    /// Names of the fields that hold a value, in schema order.
    fn populated_fields(&self) -> Vec<&'static str> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Self::schema()
                .fields
                .iter()
                .filter(|f| map.get(f.name).is_some_and(|v| !v.is_null()))
                .map(|f| f.name)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.populated_fields().is_empty()
    }

    fn summary(&self) -> String {
        let fields = self.populated_fields();
        if fields.is_empty() {
            format!("<{}: (empty)>", self.label())
        } else {
            format!("<{}: ({})>", self.label(), fields.join(", "))
        }
    }
}

/// Entities that are at heart a name/value pair.
pub trait KeyValue: HarEntity {
    fn pair(key: impl Into<String>, value: impl Into<String>) -> Self;

    fn key(&self) -> &str;

    fn value(&self) -> &str;
}

/// First item whose key matches `key`, ignoring ASCII case.
pub fn find<'a, T: KeyValue>(items: &'a [T], key: &str) -> Option<&'a T> {
    items.iter().find(|item| item.key().eq_ignore_ascii_case(key))
}

use super::schema::{FieldKind, HarEntity, Schema};
use super::timestamp::Timestamp;
use super::types::Container;
use crate::Result;
use chrono::{FixedOffset, Offset, Utc};
use serde_json::Value;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Settings applied when entities are encoded to JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Offset given to timestamps that were recorded without one.
    pub default_offset: FixedOffset,
}

impl EncodeOptions {
    pub fn with_offset(default_offset: FixedOffset) -> Self {
        Self { default_offset }
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            default_offset: Utc.fix(),
        }
    }
}

pub struct HarWriter;

impl HarWriter {
    /// Encode any entity to a JSON value, pinning offset-less timestamps.
    pub fn encode<T: HarEntity>(entity: &T, options: &EncodeOptions) -> Result<Value> {
        let mut value = serde_json::to_value(entity)?;
        localize(&mut value, T::schema(), options.default_offset);
        Ok(value)
    }

    /// Write a HAR structure to a file
    pub fn to_file(har: &Container, path: &Path, options: &EncodeOptions) -> Result<()> {
        tracing::debug!("Writing HAR file to: {}", path.display());

        let value = Self::encode(har, options)?;
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &value)?;

        tracing::info!(
            "Successfully wrote HAR file with {} entries to {}",
            har.entries().len(),
            path.display()
        );

        Ok(())
    }

    /// Convert a HAR structure to a JSON string
    pub fn to_string(har: &Container, options: &EncodeOptions) -> Result<String> {
        tracing::debug!("Converting HAR to string");

        let json = serde_json::to_string_pretty(&Self::encode(har, options)?)?;

        Ok(json)
    }

    /// Convert any entity to a compact JSON string
    pub fn to_string_compact<T: HarEntity>(entity: &T, options: &EncodeOptions) -> Result<String> {
        tracing::debug!("Converting {} to compact string", T::schema().entity);

        let json = serde_json::to_string(&Self::encode(entity, options)?)?;

        Ok(json)
    }
}

fn localize(value: &mut Value, schema: &Schema, offset: FixedOffset) {
    let Some(object) = value.as_object_mut() else {
        return;
    };

    for field in schema.fields {
        let Some(slot) = object.get_mut(field.name) else {
            continue;
        };
        match field.kind {
            FieldKind::Timestamp => {
                if let Some(ts) = slot.as_str().and_then(Timestamp::parse) {
                    *slot = Value::String(ts.encode(offset));
                }
            }
            FieldKind::Entity(nested) => localize(slot, nested, offset),
            FieldKind::List(nested) => {
                if let Some(items) = slot.as_array_mut() {
                    for item in items {
                        localize(item, nested, offset);
                    }
                }
            }
            _ => {}
        }
    }
}

//! Topic schemas: per-field metadata, unit validation and a copy-on-write cache.
//!
//! Fetching schemas is the job of a [`SchemaResolver`]; this module only
//! interprets what it hands back.

mod cache;
mod unit;

pub use cache::SchemaCache;
pub use unit::Unit;

use serde::Deserialize;
use serde_json::Value as Json;

use crate::error::{Result, SchemaMismatch};

/// Metadata for one field of a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    pub description: Option<String>,
    pub unit: Unit,
    /// True when the field is stored packed as `name0..name{N-1}`.
    pub is_array: bool,
    /// Number of packed sub-samples, when known.
    pub sample_count: Option<usize>,
}

impl FieldSchema {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            unit: Unit::Unknown,
            is_array: false,
            sample_count: None,
        }
    }

    pub fn array(name: impl Into<String>, sample_count: Option<usize>) -> Self {
        Self {
            is_array: true,
            sample_count,
            ..Self::scalar(name)
        }
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Immutable schema snapshot for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSchema {
    topic: String,
    fields: Vec<FieldSchema>,
}

impl TopicSchema {
    pub fn new(topic: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            topic: topic.into(),
            fields,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn array_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.is_array)
    }

    /// Fills unknown array sample counts from the topic's stored column names.
    ///
    /// Counts that cannot be resolved unambiguously stay `None`.
    pub fn with_resolved_counts(mut self, columns: &[String]) -> Self {
        let bases: Vec<String> = self.array_fields().map(|f| f.name.clone()).collect();
        for field in self.fields.iter_mut().filter(|f| f.is_array) {
            if field.sample_count.is_none() {
                field.sample_count = crate::unpack::count_packed_columns(&field.name, &bases, columns)
                    .ok()
                    .flatten();
            }
        }
        self
    }
}

/// Source of topic schemas (for example a schema registry client).
pub trait SchemaResolver: Send + Sync {
    fn get_schema(&self, topic: &str) -> Result<TopicSchema>;
}

impl<F> SchemaResolver for F
where
    F: Fn(&str) -> Result<TopicSchema> + Send + Sync,
{
    fn get_schema(&self, topic: &str) -> Result<TopicSchema> {
        self(topic)
    }
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    units: Option<String>,
    #[serde(rename = "type", default)]
    kind: Json,
}

/// Parses an Avro registry subject document into a [`TopicSchema`].
///
/// Accepts `{"schema": "<avro json>"}`, `{"schema": {...}}` or the Avro
/// record itself. Absent descriptions and units degrade to `None` and
/// [`Unit::Unknown`]; a unit string that does not parse is an error.
pub fn parse_registry_schema(
    topic: &str,
    document: &Json,
) -> std::result::Result<TopicSchema, SchemaMismatch> {
    let record = match document.get("schema") {
        Some(Json::String(text)) => serde_json::from_str::<Json>(text)
            .map_err(|e| SchemaMismatch::MalformedSchema(e.to_string()))?,
        Some(inner) => inner.clone(),
        None => document.clone(),
    };
    let raw: RawSchema = serde_json::from_value(record)
        .map_err(|e| SchemaMismatch::MalformedSchema(e.to_string()))?;

    let mut fields = Vec::with_capacity(raw.fields.len());
    for field in raw.fields {
        let unit = match field.units.as_deref() {
            None => Unit::Unknown,
            Some(text) => Unit::parse(text).ok_or_else(|| SchemaMismatch::MalformedUnit {
                field: field.name.clone(),
                unit: text.to_string(),
            })?,
        };
        fields.push(FieldSchema {
            is_array: is_array_type(&field.kind),
            name: field.name,
            description: field.description.filter(|d| !d.trim().is_empty()),
            unit,
            sample_count: None,
        });
    }
    Ok(TopicSchema::new(topic, fields))
}

/// `{"type": "array", ...}`, possibly inside a nullable union.
fn is_array_type(kind: &Json) -> bool {
    match kind {
        Json::Object(map) => map.get("type").and_then(Json::as_str) == Some("array"),
        Json::Array(branches) => branches.iter().any(is_array_type),
        _ => false,
    }
}

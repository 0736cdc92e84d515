use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::component::{AnyHandle, Extensions, Handle};

/// Schema object (JSON Schema subset used by OpenAPI).
///
/// Keywords without a dedicated field are kept verbatim in `keywords`; they
/// are written back out unchanged but never evaluated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// `$id`, registered in the document's schema identity table
    pub id: Option<String>,
    /// `$anchor`, registered next to `$id`s as `{resource}#{anchor}`
    pub anchor: Option<String>,
    /// `$schema` dialect URI
    pub dialect: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Empty when the schema declares no type. 3.1 allows several.
    pub schema_type: Vec<SchemaType>,
    pub format: Option<String>,
    /// 3.0 `nullable`
    pub nullable: bool,
    pub required: Vec<String>,
    pub properties: IndexMap<String, Handle<Schema>>,
    pub additional_properties: Option<AdditionalProperties>,
    pub items: Option<Handle<Schema>>,
    pub all_of: Vec<Handle<Schema>>,
    pub any_of: Vec<Handle<Schema>>,
    pub one_of: Vec<Handle<Schema>>,
    pub not: Option<Handle<Schema>>,
    pub discriminator: Option<Discriminator>,
    pub enum_values: Vec<Value>,
    pub default: Option<Value>,
    pub example: Option<Value>,
    pub read_only: bool,
    pub write_only: bool,
    pub deprecated: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub pattern: Option<String>,
    pub keywords: IndexMap<String, Value>,
    pub extensions: Extensions,
}

impl Schema {
    /// Convenience constructor for a schema of a single type
    pub fn of_type(schema_type: SchemaType) -> Self {
        Self {
            schema_type: vec![schema_type],
            ..Default::default()
        }
    }

    pub fn has_type(&self, schema_type: SchemaType) -> bool {
        self.schema_type.contains(&schema_type)
    }

    /// The single declared type, ignoring `null`
    pub fn primary_type(&self) -> Option<SchemaType> {
        self.schema_type
            .iter()
            .copied()
            .find(|t| *t != SchemaType::Null)
    }

    /// Whether `null` is an accepted value, in either the 3.0 or the 3.1 form
    pub fn is_nullable(&self) -> bool {
        self.nullable || self.has_type(SchemaType::Null)
    }

    pub(crate) fn collect_children(&self, out: &mut Vec<AnyHandle>) {
        out.extend(self.properties.values().map(|h| AnyHandle::Schema(*h)));
        if let Some(AdditionalProperties::Schema(h)) = &self.additional_properties {
            out.push(AnyHandle::Schema(*h));
        }
        out.extend(self.items.iter().map(|h| AnyHandle::Schema(*h)));
        out.extend(self.all_of.iter().map(|h| AnyHandle::Schema(*h)));
        out.extend(self.any_of.iter().map(|h| AnyHandle::Schema(*h)));
        out.extend(self.one_of.iter().map(|h| AnyHandle::Schema(*h)));
        out.extend(self.not.iter().map(|h| AnyHandle::Schema(*h)));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

impl SchemaType {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
            SchemaType::Null => "null",
        }
    }
}

impl FromStr for SchemaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(SchemaType::String),
            "number" => Ok(SchemaType::Number),
            "integer" => Ok(SchemaType::Integer),
            "boolean" => Ok(SchemaType::Boolean),
            "array" => Ok(SchemaType::Array),
            "object" => Ok(SchemaType::Object),
            "null" => Ok(SchemaType::Null),
            other => Err(format!("unknown schema type '{}'", other)),
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `additionalProperties`: either a boolean or a schema
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Handle<Schema>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discriminator {
    pub property_name: String,
    pub mapping: IndexMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_type_skips_null() {
        let schema = Schema {
            schema_type: vec![SchemaType::Null, SchemaType::String],
            ..Default::default()
        };
        assert_eq!(schema.primary_type(), Some(SchemaType::String));
        assert!(schema.is_nullable());
    }

    #[test]
    fn test_schema_type_round_trips_through_str() {
        for name in ["string", "number", "integer", "boolean", "array", "object", "null"] {
            let parsed: SchemaType = name.parse().unwrap();
            assert_eq!(parsed.as_str(), name);
        }
        assert!("map".parse::<SchemaType>().is_err());
    }
}

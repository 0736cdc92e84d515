//! Text to node-tree conversion
//!
//! Both JSON and YAML input end up as a `serde_json::Value`. YAML mapping
//! keys that are not strings are stringified; tagged values lose their tag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Guess from a location's file extension
    pub fn from_location(location: &Url) -> Option<Self> {
        let path = location.path().to_ascii_lowercase();
        if path.ends_with(".json") {
            Some(Format::Json)
        } else if path.ends_with(".yaml") || path.ends_with(".yml") {
            Some(Format::Yaml)
        } else {
            None
        }
    }

    /// Guess from content: JSON documents start with `{` or `[`
    pub fn sniff(bytes: &[u8]) -> Self {
        let first = bytes
            .strip_prefix(b"\xEF\xBB\xBF")
            .unwrap_or(bytes)
            .iter()
            .find(|b| !b.is_ascii_whitespace());
        match first {
            Some(b'{') | Some(b'[') => Format::Json,
            _ => Format::Yaml,
        }
    }

    /// Location extension first, content second
    pub fn infer(location: Option<&Url>, bytes: &[u8]) -> Self {
        location
            .and_then(Format::from_location)
            .unwrap_or_else(|| Format::sniff(bytes))
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            other => Err(format!("unknown format '{}'", other)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
            Format::Yaml => f.write_str("yaml"),
        }
    }
}

/// Parse text in the given format into a node tree
pub fn parse(bytes: &[u8], format: Format) -> Result<Value> {
    match format {
        Format::Json => Ok(serde_json::from_slice(bytes)?),
        Format::Yaml => {
            let yaml: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
            Ok(yaml_to_json(yaml))
        }
    }
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                map.insert(yaml_key(key), yaml_to_json(value));
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => s,
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Null => "null".to_string(),
        // Complex keys are rare; keep their YAML text.
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sniff_format() {
        assert_eq!(Format::sniff(b"  \n{\"openapi\": \"3.1.0\"}"), Format::Json);
        assert_eq!(Format::sniff(b"openapi: 3.1.0"), Format::Yaml);
        assert_eq!(Format::sniff(b""), Format::Yaml);
    }

    #[test]
    fn test_extension_wins_over_content() {
        let location = Url::parse("file:///api.json").unwrap();
        assert_eq!(Format::infer(Some(&location), b"openapi: 3.1.0"), Format::Json);
        let location = Url::parse("https://example.com/spec").unwrap();
        assert_eq!(Format::infer(Some(&location), b"{}"), Format::Json);
    }

    #[test]
    fn test_yaml_keys_are_stringified() {
        let value = parse(b"responses:\n  200:\n    description: ok\n  default:\n    description: err\n", Format::Yaml).unwrap();
        assert_eq!(
            value,
            json!({"responses": {"200": {"description": "ok"}, "default": {"description": "err"}}})
        );
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(parse(b"{\"openapi\": ", Format::Json).is_err());
    }
}

//! Output schema loading and structural validation.
//!
//! The research service requires every property in a custom schema to carry a
//! `type` and a `description`; nested objects and arrays of objects are checked
//! the same way.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::SchemaError;

/// Load a schema from a file path or an inline JSON document.
///
/// An existing file always wins over the inline interpretation.
pub fn load_schema(arg: Option<&str>) -> Result<Option<Value>, SchemaError> {
    let Some(arg) = arg else {
        return Ok(None);
    };

    let path = Path::new(arg);
    if path.is_file() {
        let raw = fs::read_to_string(path).map_err(|source| SchemaError::SchemaIo {
            path: path.to_path_buf(),
            source,
        })?;
        let schema =
            serde_json::from_str(&raw).map_err(|source| SchemaError::InvalidSchemaFile {
                path: path.to_path_buf(),
                source,
            })?;
        return Ok(Some(schema));
    }

    serde_json::from_str(arg)
        .map(Some)
        .map_err(|source| SchemaError::InvalidSchemaArgument { source })
}

/// Check that `schema` meets the service's structural requirements.
pub fn validate_schema(schema: &Value) -> Result<(), SchemaError> {
    let properties = properties_of(schema).ok_or(SchemaError::MissingPropertiesKey)?;
    check_properties(properties, "")
}

/// Number of top-level properties, used for progress output.
pub fn property_count(schema: &Value) -> usize {
    properties_of(schema).map_or(0, Map::len)
}

fn properties_of(node: &Value) -> Option<&Map<String, Value>> {
    node.get("properties").and_then(Value::as_object)
}

fn check_properties(properties: &Map<String, Value>, prefix: &str) -> Result<(), SchemaError> {
    for (name, property) in properties {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };

        if property.get("type").is_none() {
            return Err(SchemaError::MissingType { path });
        }
        if property.get("description").is_none() {
            return Err(SchemaError::MissingDescription { path });
        }

        match type_of(property) {
            Some("object") => {
                if let Some(nested) = properties_of(property) {
                    check_properties(nested, &path)?;
                }
            }
            Some("array") => {
                let items = property.get("items");
                if let Some(nested) = items
                    .filter(|items| type_of(items) == Some("object"))
                    .and_then(properties_of)
                {
                    check_properties(nested, &format!("{path}[]"))?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn type_of(node: &Value) -> Option<&str> {
    node.get("type").and_then(Value::as_str)
}

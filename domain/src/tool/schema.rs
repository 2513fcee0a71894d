//! Tool input/output schemas.
//!
//! A [`Schema`] is a flat, JSON-Schema-equivalent description of an object:
//! a set of named fields, each with a [`FieldType`] and a `required` flag.
//! Nested structure is expressed with `object`/`array` fields whose contents
//! are not checked further.
//!
//! Schemas can be written natively (the catalog TOML format) or converted
//! from a JSON Schema document with [`Schema::from_json_schema`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Any,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Any => "any",
        }
    }

    /// Whether a concrete JSON value conforms to this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
            FieldType::Any => true,
        }
    }

    /// Whether a value declared as `other` can always be used where `self`
    /// is expected.
    pub fn accepts(&self, other: FieldType) -> bool {
        *self == FieldType::Any
            || other == FieldType::Any
            || *self == other
            || (*self == FieldType::Number && other == FieldType::Integer)
    }

    fn from_json_schema_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(FieldType::String),
            "number" => Some(FieldType::Number),
            "integer" => Some(FieldType::Integer),
            "boolean" => Some(FieldType::Boolean),
            "object" => Some(FieldType::Object),
            "array" => Some(FieldType::Array),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// JSON type name of a value, for diagnostics.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single field of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl FieldSpec {
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
            description: String::new(),
        }
    }

    pub fn optional(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            description: String::new(),
        }
    }
}

/// A detected mismatch between an object and a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaMismatch {
    Missing(String),
    Unknown(String),
    WrongType {
        field: String,
        expected: FieldType,
        found: &'static str,
    },
    NotAnObject(&'static str),
}

impl std::fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaMismatch::Missing(field) => write!(f, "missing required field '{}'", field),
            SchemaMismatch::Unknown(field) => write!(f, "unknown field '{}'", field),
            SchemaMismatch::WrongType {
                field,
                expected,
                found,
            } => write!(f, "field '{}' expected {}, found {}", field, expected, found),
            SchemaMismatch::NotAnObject(found) => write!(f, "expected an object, found {}", found),
        }
    }
}

/// Object schema for tool inputs or outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
    /// Allow fields that are not declared
    #[serde(default)]
    pub additional: bool,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn allow_additional(mut self) -> Self {
        self.additional = true;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }

    /// Check a concrete JSON value against this schema.
    pub fn check_value(&self, value: &Value) -> Vec<SchemaMismatch> {
        match value {
            Value::Object(map) => self.check_object(map),
            other => vec![SchemaMismatch::NotAnObject(json_type_name(other))],
        }
    }

    /// Check a concrete object against this schema, returning every mismatch.
    pub fn check_object(&self, object: &Map<String, Value>) -> Vec<SchemaMismatch> {
        let mut mismatches = Vec::new();

        for name in self.required_fields() {
            if !object.contains_key(name) {
                mismatches.push(SchemaMismatch::Missing(name.to_string()));
            }
        }

        for (name, value) in object {
            match self.fields.get(name) {
                Some(spec) if !spec.field_type.matches(value) && !value.is_null() => {
                    mismatches.push(SchemaMismatch::WrongType {
                        field: name.clone(),
                        expected: spec.field_type,
                        found: json_type_name(value),
                    });
                }
                Some(spec) if value.is_null() && spec.required => {
                    mismatches.push(SchemaMismatch::Missing(name.clone()));
                }
                Some(_) => {}
                None if !self.additional => {
                    mismatches.push(SchemaMismatch::Unknown(name.clone()));
                }
                None => {}
            }
        }

        mismatches
    }

    /// Structural sanity check used at registration time.
    pub fn check_definition(&self) -> Result<(), String> {
        for name in self.fields.keys() {
            if name.trim().is_empty() {
                return Err("schema contains an empty field name".to_string());
            }
            if name.contains(['.', '[', ']', '$', '{', '}']) {
                return Err(format!("schema field '{}' contains reserved characters", name));
            }
        }
        Ok(())
    }

    /// Convert a JSON Schema object document (`type`, `properties`,
    /// `required`, `additionalProperties`) into a [`Schema`].
    pub fn from_json_schema(document: &Value) -> Result<Self, String> {
        let object = document
            .as_object()
            .ok_or_else(|| "JSON schema must be an object".to_string())?;

        if let Some(kind) = object.get("type").and_then(|t| t.as_str())
            && kind != "object"
        {
            return Err(format!("top-level JSON schema type must be 'object', got '{}'", kind));
        }

        let required: Vec<&str> = object
            .get("required")
            .and_then(|r| r.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let mut schema = Schema::new();
        if let Some(properties) = object.get("properties").and_then(|p| p.as_object()) {
            for (name, property) in properties {
                let field_type = match property.get("type").and_then(|t| t.as_str()) {
                    Some(type_name) => FieldType::from_json_schema_name(type_name)
                        .ok_or_else(|| format!("unsupported JSON schema type '{}'", type_name))?,
                    None => FieldType::Any,
                };
                let description = property
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default()
                    .to_string();
                schema.fields.insert(
                    name.clone(),
                    FieldSpec {
                        field_type,
                        required: required.contains(&name.as_str()),
                        description,
                    },
                );
            }
        }

        schema.additional = object
            .get("additionalProperties")
            .and_then(|a| a.as_bool())
            .unwrap_or(false);

        schema.check_definition()?;
        Ok(schema)
    }
}

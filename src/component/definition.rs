//! Canonical component definition and its configuration schema.

use crate::types::{ComponentId, Size};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_NAME: &str = "Custom Widget";
pub const DEFAULT_DESCRIPTION: &str = "Created by agent";
pub const DEFAULT_ICON: &str = "🧩";
pub const DEFAULT_CATEGORY: &str = "general";
pub const DEFAULT_SIZE: Size = Size::new(4, 3);
pub const DEFAULT_MIN_SIZE: Size = Size::new(2, 2);

/// Where a definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Shipped with the system; immutable and never persisted.
    Builtin,
    /// Produced by the compilation pipeline; persisted as source.
    Custom,
}

/// Editor kind of a configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    String,
    Text,
    Json,
}

impl FieldType {
    /// Lenient parse; unknown kinds fall back to `String`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" | "checkbox" => FieldType::Boolean,
            "text" | "textarea" | "multiline" => FieldType::Text,
            "json" | "object" | "array" => FieldType::Json,
            _ => FieldType::String,
        }
    }

    fn fallback_default(self) -> Value {
        match self {
            FieldType::Boolean => Value::Bool(false),
            FieldType::Json => Value::String("[]".to_string()),
            FieldType::String | FieldType::Text => Value::String(String::new()),
        }
    }
}

/// One user-editable configuration field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigField {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub default: Value,
    pub label: String,
}

impl ConfigField {
    pub fn new(field_type: FieldType, default: Value, label: impl Into<String>) -> Self {
        Self {
            field_type,
            default,
            label: label.into(),
        }
    }
}

/// Ordered mapping from field key to field declaration.
///
/// Serialized as a JSON object whose key order is the declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSchema {
    fields: Vec<(String, ConfigField)>,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used by the builtin catalog.
    pub fn with(mut self, key: &str, field: ConfigField) -> Self {
        self.insert(key, field);
        self
    }

    /// Insert or replace a field, keeping the original position on replace.
    pub fn insert(&mut self, key: &str, field: ConfigField) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = field,
            None => self.fields.push((key.to_string(), field)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigField> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigField)> {
        self.fields.iter().map(|(k, f)| (k.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Default values for every field, in declaration order.
    pub fn defaults(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(k, f)| (k.clone(), f.default.clone()))
            .collect()
    }

    /// Build a schema from loosely-shaped agent JSON.
    ///
    /// Accepts `{key: {type, default, label}}`; a bare value in place of the field
    /// object is taken as the default with its type inferred. Entries that are
    /// neither are skipped.
    pub fn from_json_lenient(value: &Value) -> Self {
        let mut schema = ConfigSchema::new();
        let Some(object) = value.as_object() else {
            return schema;
        };
        for (key, raw) in object {
            let field = match raw {
                Value::Object(spec) => {
                    let field_type = spec
                        .get("type")
                        .and_then(Value::as_str)
                        .map(FieldType::parse_lenient)
                        .unwrap_or(FieldType::String);
                    let default = spec
                        .get("default")
                        .cloned()
                        .unwrap_or_else(|| field_type.fallback_default());
                    let label = spec
                        .get("label")
                        .and_then(Value::as_str)
                        .filter(|l| !l.trim().is_empty())
                        .unwrap_or(key)
                        .to_string();
                    ConfigField::new(field_type, default, label)
                }
                Value::Bool(_) => ConfigField::new(FieldType::Boolean, raw.clone(), key.clone()),
                Value::String(_) | Value::Number(_) => {
                    ConfigField::new(FieldType::String, raw.clone(), key.clone())
                }
                _ => continue,
            };
            schema.insert(key, field);
        }
        schema
    }
}

impl Serialize for ConfigSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, field) in &self.fields {
            map.serialize_entry(key, field)?;
        }
        map.end()
    }
}

struct ConfigSchemaVisitor;

impl<'de> Visitor<'de> for ConfigSchemaVisitor {
    type Value = ConfigSchema;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of config field declarations")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ConfigSchema, A::Error> {
        let mut schema = ConfigSchema::new();
        while let Some((key, field)) = access.next_entry::<String, ConfigField>()? {
            schema.insert(&key, field);
        }
        Ok(schema)
    }
}

impl<'de> Deserialize<'de> for ConfigSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ConfigSchemaVisitor)
    }
}

/// The canonical, persistable component unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDefinition {
    pub id: ComponentId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: String,
    pub default_size: Size,
    pub min_size: Size,
    #[serde(default)]
    pub config_schema: ConfigSchema,
    /// Author-supplied source. Empty for builtins.
    #[serde(default)]
    pub source: String,
    pub origin: Origin,
}

impl ComponentDefinition {
    pub fn is_builtin(&self) -> bool {
        self.origin == Origin::Builtin
    }

    /// Check the structural invariants of a definition.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Component id cannot be empty".to_string());
        }
        if self.origin == Origin::Custom && self.source.trim().is_empty() {
            return Err(format!("Custom component '{}' has no source", self.id));
        }
        if !self.min_size.fits_within(self.default_size) {
            return Err(format!(
                "Component '{}' minSize {}x{} exceeds defaultSize {}x{}",
                self.id,
                self.min_size.w,
                self.min_size.h,
                self.default_size.w,
                self.default_size.h
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_keeps_declaration_order_through_serde() {
        let schema = ConfigSchema::new()
            .with(
                "zeta",
                ConfigField::new(FieldType::String, json!("z"), "Zeta"),
            )
            .with(
                "alpha",
                ConfigField::new(FieldType::Boolean, json!(true), "Alpha"),
            );
        let text = serde_json::to_string(&schema).unwrap();
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());

        let back: ConfigSchema = serde_json::from_str(&text).unwrap();
        let keys: Vec<&str> = back.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(back, schema);
    }

    #[test]
    fn lenient_schema_fills_labels_and_types() {
        let raw = json!({
            "title": {"type": "string", "default": "Hi"},
            "enabled": {"type": "checkbox", "label": "Enabled?"},
            "items": {"type": "mystery"},
            "limit": 5,
            "junk": null
        });
        let schema = ConfigSchema::from_json_lenient(&raw);
        assert_eq!(schema.len(), 4);
        let title = schema.get("title").unwrap();
        assert_eq!(title.label, "title");
        assert_eq!(title.default, json!("Hi"));
        let enabled = schema.get("enabled").unwrap();
        assert_eq!(enabled.field_type, FieldType::Boolean);
        assert_eq!(enabled.default, json!(false));
        assert_eq!(schema.get("items").unwrap().field_type, FieldType::String);
        assert_eq!(schema.get("limit").unwrap().default, json!(5));
        assert!(schema.get("junk").is_none());
    }

    #[test]
    fn validate_rejects_custom_without_source() {
        let def = ComponentDefinition {
            id: "x".into(),
            name: DEFAULT_NAME.into(),
            description: DEFAULT_DESCRIPTION.into(),
            icon: DEFAULT_ICON.into(),
            category: DEFAULT_CATEGORY.into(),
            default_size: DEFAULT_SIZE,
            min_size: DEFAULT_MIN_SIZE,
            config_schema: ConfigSchema::new(),
            source: "  ".into(),
            origin: Origin::Custom,
        };
        assert!(def.validate().is_err());
    }
}

//! Best-effort definition assembled from agent text, before compilation.

use super::definition::{
    ComponentDefinition, ConfigSchema, Origin, DEFAULT_CATEGORY, DEFAULT_DESCRIPTION,
    DEFAULT_ICON, DEFAULT_MIN_SIZE, DEFAULT_NAME, DEFAULT_SIZE,
};
use crate::types::{generate_component_id, ComponentId, Size};
use serde_json::{Map, Value};

/// Extractor output: every display field is filled, `source` may be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedDefinition {
    pub id: ComponentId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: String,
    pub default_size: Size,
    pub min_size: Size,
    pub config_schema: ConfigSchema,
    pub source: Option<String>,
}

impl ProposedDefinition {
    /// Read a metadata object as produced by an agent.
    ///
    /// Fields that are missing or of the wrong shape are left to `normalize`.
    /// The source may arrive as `source` or the older `code` key.
    pub fn from_metadata(object: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let id = object
            .get("id")
            .and_then(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_default();
        let source = text("source").or_else(|| text("code"));

        let mut proposed = Self {
            id,
            name: text("name").unwrap_or_default(),
            description: text("description").unwrap_or_default(),
            icon: text("icon").unwrap_or_default(),
            category: text("category").unwrap_or_default(),
            default_size: object
                .get("defaultSize")
                .and_then(parse_size)
                .unwrap_or(DEFAULT_SIZE),
            min_size: object
                .get("minSize")
                .and_then(parse_size)
                .unwrap_or(DEFAULT_MIN_SIZE),
            config_schema: object
                .get("configSchema")
                .map(ConfigSchema::from_json_lenient)
                .unwrap_or_default(),
            source,
        };
        proposed.normalize();
        proposed
    }

    /// Minimal metadata for a source block that arrived without any.
    pub fn synthesized(source: String, inferred_name: Option<String>) -> Self {
        let mut proposed = Self {
            id: generate_component_id(),
            name: inferred_name.unwrap_or_default(),
            description: String::new(),
            icon: String::new(),
            category: String::new(),
            default_size: DEFAULT_SIZE,
            min_size: DEFAULT_MIN_SIZE,
            config_schema: ConfigSchema::new(),
            source: Some(source),
        };
        proposed.normalize();
        proposed
    }

    /// Fill every missing non-source field with its default and restore the
    /// `min_size <= default_size` invariant.
    pub fn normalize(&mut self) {
        if self.id.trim().is_empty() {
            self.id = generate_component_id();
        }
        fill(&mut self.name, DEFAULT_NAME);
        fill(&mut self.description, DEFAULT_DESCRIPTION);
        fill(&mut self.icon, DEFAULT_ICON);
        fill(&mut self.category, DEFAULT_CATEGORY);
        self.default_size = Size::new(self.default_size.w.max(1), self.default_size.h.max(1));
        self.min_size = Size::new(self.min_size.w.max(1), self.min_size.h.max(1))
            .min(self.default_size);
        if let Some(source) = &self.source {
            if source.trim().is_empty() {
                self.source = None;
            }
        }
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Turn into a custom definition; `None` when there is no source.
    pub fn into_definition(self) -> Option<ComponentDefinition> {
        let source = self.source?;
        Some(ComponentDefinition {
            id: self.id,
            name: self.name,
            description: self.description,
            icon: self.icon,
            category: self.category,
            default_size: self.default_size,
            min_size: self.min_size,
            config_schema: self.config_schema,
            source,
            origin: Origin::Custom,
        })
    }
}

fn fill(field: &mut String, default: &str) {
    if field.trim().is_empty() {
        *field = default.to_string();
    }
}

/// Accepts `{w,h}`, `{width,height}`, `[w,h]` and `"WxH"`.
pub(crate) fn parse_size(value: &Value) -> Option<Size> {
    let dim = |v: &Value| -> Option<u32> {
        match v {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
                .map(|n| n.min(u32::MAX as u64) as u32),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    };
    match value {
        Value::Object(obj) => {
            let w = obj.get("w").or_else(|| obj.get("width")).and_then(dim)?;
            let h = obj.get("h").or_else(|| obj.get("height")).and_then(dim)?;
            Some(Size::new(w, h))
        }
        Value::Array(items) if items.len() == 2 => Some(Size::new(dim(&items[0])?, dim(&items[1])?)),
        Value::String(s) => {
            let (w, h) = s.split_once(|c: char| c == 'x' || c == 'X')?;
            Some(Size::new(w.trim().parse().ok()?, h.trim().parse().ok()?))
        }
        _ => None,
    }
}

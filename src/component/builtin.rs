//! Builtin component catalog.
//!
//! Builtin implementations are rendered natively by the host surface; only their
//! declarative metadata lives here.

use super::definition::{ComponentDefinition, ConfigField, ConfigSchema, FieldType, Origin};
use crate::types::Size;
use serde_json::json;

fn builtin(
    id: &str,
    name: &str,
    description: &str,
    icon: &str,
    category: &str,
    default_size: Size,
    min_size: Size,
    config_schema: ConfigSchema,
) -> ComponentDefinition {
    ComponentDefinition {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        category: category.to_string(),
        default_size,
        min_size,
        config_schema,
        source: String::new(),
        origin: Origin::Builtin,
    }
}

/// The builtin definitions in catalog order.
pub fn builtin_definitions() -> Vec<ComponentDefinition> {
    vec![
        builtin(
            "clock",
            "Clock",
            "Current time with timezone support",
            "🕐",
            "general",
            Size::new(3, 2),
            Size::new(2, 2),
            ConfigSchema::new()
                .with(
                    "timezone",
                    ConfigField::new(FieldType::String, json!("local"), "Timezone"),
                )
                .with(
                    "format24h",
                    ConfigField::new(FieldType::Boolean, json!(true), "24h format"),
                ),
        ),
        builtin(
            "weather",
            "Weather",
            "Current weather and forecast",
            "⛅",
            "data",
            Size::new(4, 3),
            Size::new(3, 2),
            ConfigSchema::new().with("city", ConfigField::new(FieldType::String, json!(""), "City")),
        ),
        builtin(
            "notes",
            "Notes",
            "Quick notes and text",
            "📝",
            "general",
            Size::new(3, 3),
            Size::new(2, 2),
            ConfigSchema::new()
                .with("content", ConfigField::new(FieldType::Text, json!(""), "Notes")),
        ),
        builtin(
            "countdown",
            "Countdown",
            "Countdown to a target date",
            "⏳",
            "general",
            Size::new(4, 2),
            Size::new(3, 2),
            ConfigSchema::new()
                .with(
                    "title",
                    ConfigField::new(FieldType::String, json!("Countdown"), "Title"),
                )
                .with(
                    "targetDate",
                    ConfigField::new(
                        FieldType::String,
                        json!(""),
                        "Target date (YYYY-MM-DD)",
                    ),
                )
                .with("emoji", ConfigField::new(FieldType::String, json!("🎯"), "Emoji")),
        ),
        builtin(
            "portfolio",
            "Portfolio",
            "Investment portfolio overview",
            "📈",
            "finance",
            Size::new(6, 4),
            Size::new(4, 3),
            ConfigSchema::new().with(
                "positions",
                ConfigField::new(FieldType::Json, json!("[]"), "Positions (JSON)"),
            ),
        ),
    ]
}

/// True when `id` names a builtin component.
pub fn is_builtin_id(id: &str) -> bool {
    builtin_definitions().iter().any(|d| d.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_valid_and_unique() {
        let defs = builtin_definitions();
        let mut ids: Vec<&str> = defs.iter().map(|d| d.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), defs.len());
        for def in &defs {
            assert!(def.is_builtin());
            assert!(def.validate().is_ok(), "{} invalid", def.id);
        }
        assert!(is_builtin_id("clock"));
        assert!(!is_builtin_id("clock2"));
    }
}

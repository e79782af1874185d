use crate::component::definition::{
    DEFAULT_CATEGORY, DEFAULT_DESCRIPTION, DEFAULT_ICON, DEFAULT_MIN_SIZE, DEFAULT_NAME,
    DEFAULT_SIZE,
};
use crate::component::{ComponentDefinition, ConfigSchema, Origin};
use crate::error::ApiError;
use crate::types::{ComponentId, Size};
use serde::{Deserialize, Serialize};

/// The persisted shape of a custom component: declarative fields and source.
/// Origin and the compiled factory are never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredComponent {
    #[serde(default)]
    pub id: ComponentId,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_size")]
    pub default_size: Size,
    #[serde(default = "default_min_size")]
    pub min_size: Size,
    #[serde(default)]
    pub config_schema: ConfigSchema,
    #[serde(default)]
    pub source: String,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_size() -> Size {
    DEFAULT_SIZE
}

fn default_min_size() -> Size {
    DEFAULT_MIN_SIZE
}

impl StoredComponent {
    pub fn from_definition(definition: &ComponentDefinition) -> Self {
        Self {
            id: definition.id.clone(),
            name: definition.name.clone(),
            description: definition.description.clone(),
            icon: definition.icon.clone(),
            category: definition.category.clone(),
            default_size: definition.default_size,
            min_size: definition.min_size,
            config_schema: definition.config_schema.clone(),
            source: definition.source.clone(),
        }
    }

    /// Rebuild a custom definition, clamping sizes the same way fresh
    /// proposals are normalized.
    pub fn into_definition(self) -> ComponentDefinition {
        let default_size = Size::new(self.default_size.w.max(1), self.default_size.h.max(1));
        let min_size = Size::new(self.min_size.w.max(1), self.min_size.h.max(1)).min(default_size);
        ComponentDefinition {
            id: self.id,
            name: self.name,
            description: self.description,
            icon: self.icon,
            category: self.category,
            default_size,
            min_size,
            config_schema: self.config_schema,
            source: self.source,
            origin: Origin::Custom,
        }
    }
}

/// A persisted record that could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadedComponents {
    /// Decoded records in file order.
    pub records: Vec<StoredComponent>,
    pub rejected: Vec<RejectedRecord>,
}

/// Persistence port for custom component sources.
///
/// `load` fails only when the store as a whole is unreadable; individual bad
/// records land in [`LoadedComponents::rejected`].
pub trait ComponentRepository: Send + Sync {
    fn load(&self) -> Result<LoadedComponents, ApiError>;
    /// Replace the whole persisted set.
    fn save_all(&self, components: &[StoredComponent]) -> Result<(), ApiError>;
}

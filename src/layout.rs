//! Layout
//!
//! Placed component instances on the dashboard grid. The drag/resize surface is
//! external; this module owns the instance list, its placement rules and its
//! persistence as `layout.json`.

pub mod storage;

pub use storage::{InMemoryLayoutRepository, LayoutRepository, XdgLayoutRepository};

use crate::component::ComponentDefinition;
use crate::error::ApiError;
use crate::types::{generate_instance_id, ComponentId, InstanceId, Size};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// One placed instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutItem {
    pub instance_id: InstanceId,
    pub definition_id: ComponentId,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub min_w: u32,
    pub min_h: u32,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl LayoutItem {
    pub fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }

    /// Schema defaults overlaid with this instance's stored values.
    pub fn effective_config(&self, definition: &ComponentDefinition) -> Map<String, Value> {
        let mut config = definition.config_schema.defaults();
        for (key, value) in &self.config {
            config.insert(key.clone(), value.clone());
        }
        config
    }
}

/// How a new instance should be placed.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub default_size: Size,
    pub min_size: Size,
    pub default_config: Map<String, Value>,
}

impl Placement {
    pub fn for_definition(definition: &ComponentDefinition) -> Self {
        Self {
            default_size: definition.default_size,
            min_size: definition.min_size,
            default_config: definition.config_schema.defaults(),
        }
    }
}

/// New position and size for an existing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// The instance list and its placement rules, without persistence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    items: Vec<LayoutItem>,
}

impl Layout {
    pub fn from_items(items: Vec<LayoutItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[LayoutItem] {
        &self.items
    }

    pub fn get(&self, instance_id: &str) -> Option<&LayoutItem> {
        self.items.iter().find(|i| i.instance_id == instance_id)
    }

    pub fn instances_of<'a>(&'a self, definition_id: &'a str) -> impl Iterator<Item = &'a LayoutItem> {
        self.items.iter().filter(move |i| i.definition_id == definition_id)
    }

    /// First free row: one past the bottom edge of the lowest instance.
    pub fn next_row(&self) -> u32 {
        self.items.iter().map(|i| i.y + i.h).max().unwrap_or(0)
    }

    /// Place a new instance at the left edge below everything else.
    pub fn attach(&mut self, definition_id: &str, placement: Placement) -> InstanceId {
        let instance_id = generate_instance_id();
        let item = LayoutItem {
            instance_id: instance_id.clone(),
            definition_id: definition_id.to_string(),
            x: 0,
            y: self.next_row(),
            w: placement.default_size.w,
            h: placement.default_size.h,
            min_w: placement.min_size.w,
            min_h: placement.min_size.h,
            config: placement.default_config,
        };
        self.items.push(item);
        instance_id
    }

    pub fn remove(&mut self, instance_id: &str) -> Option<LayoutItem> {
        let position = self.items.iter().position(|i| i.instance_id == instance_id)?;
        Some(self.items.remove(position))
    }

    /// Remove every instance of a definition.
    pub fn remove_definition(&mut self, definition_id: &str) -> Vec<LayoutItem> {
        let (removed, kept): (Vec<LayoutItem>, Vec<LayoutItem>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|i| i.definition_id == definition_id);
        self.items = kept;
        removed
    }

    /// Apply new geometry. Sizes are clamped to the instance minimum.
    pub fn update_geometry(&mut self, instance_id: &str, geometry: Geometry) -> Result<(), ApiError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.instance_id == instance_id)
            .ok_or_else(|| ApiError::InstanceNotFound(instance_id.to_string()))?;
        item.x = geometry.x;
        item.y = geometry.y;
        item.w = geometry.w.max(item.min_w);
        item.h = geometry.h.max(item.min_h);
        Ok(())
    }

    /// Shallow-merge `patch` into the instance config.
    pub fn update_config(
        &mut self,
        instance_id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), ApiError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.instance_id == instance_id)
            .ok_or_else(|| ApiError::InstanceNotFound(instance_id.to_string()))?;
        for (key, value) in patch {
            item.config.insert(key, value);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A [`Layout`] written through to a repository after every change. The
/// in-memory layout stays authoritative when a write fails.
pub struct LayoutStore {
    layout: Layout,
    repository: Arc<dyn LayoutRepository>,
}

impl LayoutStore {
    /// Load the persisted layout. An unreadable file starts an empty layout.
    pub fn load(repository: Arc<dyn LayoutRepository>) -> Self {
        let layout = match repository.load() {
            Ok(items) => Layout::from_items(items),
            Err(e) => {
                warn!("Layout unreadable, starting empty: {}", e);
                Layout::default()
            }
        };
        Self { layout, repository }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    fn persist(&self) {
        if let Err(e) = self.repository.save(self.layout.items()) {
            warn!("Failed to persist layout: {}", e);
        }
    }

    pub fn attach_instance(&mut self, definition_id: &str, placement: Placement) -> InstanceId {
        let instance_id = self.layout.attach(definition_id, placement);
        info!(definition = %definition_id, instance = %instance_id, "instance attached");
        self.persist();
        instance_id
    }

    pub fn remove_instance(&mut self, instance_id: &str) -> Result<LayoutItem, ApiError> {
        let removed = self
            .layout
            .remove(instance_id)
            .ok_or_else(|| ApiError::InstanceNotFound(instance_id.to_string()))?;
        self.persist();
        Ok(removed)
    }

    pub fn remove_definition(&mut self, definition_id: &str) -> Vec<LayoutItem> {
        let removed = self.layout.remove_definition(definition_id);
        if !removed.is_empty() {
            self.persist();
        }
        removed
    }

    pub fn update_geometry(&mut self, instance_id: &str, geometry: Geometry) -> Result<(), ApiError> {
        self.layout.update_geometry(instance_id, geometry)?;
        self.persist();
        Ok(())
    }

    pub fn update_config(
        &mut self,
        instance_id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), ApiError> {
        self.layout.update_config(instance_id, patch)?;
        self.persist();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn placement(w: u32, h: u32) -> Placement {
        Placement {
            default_size: Size::new(w, h),
            min_size: Size::new(2, 2),
            default_config: Map::new(),
        }
    }

    #[test]
    fn new_instances_stack_below_the_lowest_edge() {
        let mut layout = Layout::default();
        let first = layout.attach("clock", placement(3, 2));
        let second = layout.attach("notes", placement(3, 3));
        layout
            .update_geometry(&second, Geometry { x: 6, y: 10, w: 3, h: 3 })
            .unwrap();
        let third = layout.attach("clock", placement(4, 3));

        assert_eq!(layout.get(&first).unwrap().y, 0);
        assert_eq!(layout.get(&third).unwrap().y, 13);
        assert_eq!(layout.get(&third).unwrap().x, 0);
        assert_eq!(layout.instances_of("clock").count(), 2);
        assert!(uuid::Uuid::parse_str(&first).is_ok());
        assert_ne!(first, third);
    }

    #[test]
    fn geometry_is_clamped_and_unknown_ids_fail() {
        let mut layout = Layout::default();
        let id = layout.attach("clock", placement(3, 2));
        layout
            .update_geometry(&id, Geometry { x: 1, y: 1, w: 0, h: 1 })
            .unwrap();
        let item = layout.get(&id).unwrap();
        assert_eq!((item.w, item.h), (2, 2));
        assert!(matches!(
            layout.update_geometry("nope", Geometry { x: 0, y: 0, w: 1, h: 1 }),
            Err(ApiError::InstanceNotFound(_))
        ));
    }

    #[test]
    fn config_patch_is_shallow() {
        let mut layout = Layout::default();
        let mut p = placement(3, 2);
        p.default_config.insert("city".into(), json!("Oslo"));
        p.default_config.insert("units".into(), json!({"temp": "C"}));
        let id = layout.attach("weather", p);

        let mut patch = Map::new();
        patch.insert("units".into(), json!({"wind": "m/s"}));
        layout.update_config(&id, patch).unwrap();

        let config = &layout.get(&id).unwrap().config;
        assert_eq!(config["city"], json!("Oslo"));
        assert_eq!(config["units"], json!({"wind": "m/s"}));
    }

    #[test]
    fn remove_definition_takes_every_instance() {
        let mut layout = Layout::default();
        layout.attach("a", placement(1, 1));
        let keep = layout.attach("b", placement(1, 1));
        layout.attach("a", placement(1, 1));
        assert_eq!(layout.remove_definition("a").len(), 2);
        assert_eq!(layout.len(), 1);
        assert!(layout.get(&keep).is_some());
        assert!(layout.remove("missing").is_none());
    }

    #[test]
    fn store_writes_through() {
        let repo = Arc::new(InMemoryLayoutRepository::new());
        let mut store = LayoutStore::load(repo.clone());
        let id = store.attach_instance("clock", placement(3, 2));
        assert_eq!(repo.items().len(), 1);
        store.remove_instance(&id).unwrap();
        assert!(repo.items().is_empty());
        assert!(store.remove_instance(&id).is_err());
    }

    #[test]
    fn failed_writes_keep_the_in_memory_layout() {
        let repo = Arc::new(InMemoryLayoutRepository::failing("disk full"));
        let mut store = LayoutStore::load(repo.clone());
        let id = store.attach_instance("clock", placement(3, 2));
        assert_eq!(store.layout().len(), 1);
        store
            .update_geometry(&id, Geometry { x: 1, y: 0, w: 4, h: 2 })
            .unwrap();
        assert_eq!(store.remove_definition("clock").len(), 1);
        assert!(store.layout().is_empty());
        assert!(repo.items().is_empty());
    }

    #[test]
    fn unreadable_layout_starts_empty() {
        let store = LayoutStore::load(Arc::new(InMemoryLayoutRepository::failing("bad")));
        assert!(store.layout().is_empty());
    }
}

//! Component Registry
//!
//! Maps component ids to definitions. Builtin entries are fixed at construction;
//! custom entries are added, replaced and removed at runtime. Every mutation
//! returns a [`RegistryEvent`] that [`RegistryPersistence`] turns into a write
//! of the custom sources. Compiled factories are never persisted; `bootstrap`
//! recompiles them from source.

pub mod persistence;
pub mod repository;

pub use persistence::RegistryPersistence;
pub use repository::{
    ComponentRepository, InMemoryComponentRepository, LoadedComponents, RejectedRecord,
    StoredComponent, XdgComponentRepository,
};

use crate::compiler::{CompiledComponent, Compiler};
use crate::component::{ComponentDefinition, Origin};
use crate::error::ApiError;
use crate::types::ComponentId;
use tracing::{info, warn};

/// A definition plus, for customs, its compiled factory.
#[derive(Debug)]
pub struct RegistryEntry {
    pub definition: ComponentDefinition,
    /// `None` for builtins, which the host renders natively.
    pub component: Option<CompiledComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Registered { id: ComponentId, replaced: bool },
    Unregistered { id: ComponentId },
}

impl RegistryEvent {
    pub fn id(&self) -> &str {
        match self {
            RegistryEvent::Registered { id, .. } | RegistryEvent::Unregistered { id } => id,
        }
    }
}

/// A persisted component that did not make it into the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedComponent {
    pub id: String,
    pub reason: String,
}

/// What `bootstrap` installed and what it had to drop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BootstrapReport {
    pub loaded: Vec<ComponentId>,
    pub dropped: Vec<DroppedComponent>,
    /// Set when the store itself could not be read.
    pub store_error: Option<String>,
}

impl BootstrapReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && self.store_error.is_none()
    }
}

/// Component registry
pub struct ComponentRegistry {
    builtins: Vec<RegistryEntry>,
    /// Registration order; replacement keeps the original position.
    custom: Vec<RegistryEntry>,
}

impl ComponentRegistry {
    /// A registry holding only the given builtin definitions.
    pub fn with_builtins(builtins: Vec<ComponentDefinition>) -> Self {
        let builtins = builtins
            .into_iter()
            .map(|mut definition| {
                definition.origin = Origin::Builtin;
                RegistryEntry {
                    definition,
                    component: None,
                }
            })
            .collect();
        Self {
            builtins,
            custom: Vec::new(),
        }
    }

    /// Build a registry from builtins plus every persisted custom component
    /// that still compiles. Never fails; problems are logged and reported.
    pub fn bootstrap(
        builtins: Vec<ComponentDefinition>,
        repository: &dyn ComponentRepository,
        compiler: &Compiler,
    ) -> (Self, BootstrapReport) {
        let mut registry = Self::with_builtins(builtins);
        let mut report = BootstrapReport::default();

        let loaded = match repository.load() {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Component store unreadable, starting with builtins only: {}", e);
                report.store_error = Some(e.to_string());
                return (registry, report);
            }
        };

        for rejected in loaded.rejected {
            warn!("Dropping undecodable component {}: {}", rejected.key, rejected.reason);
            report.dropped.push(DroppedComponent {
                id: rejected.key,
                reason: rejected.reason,
            });
        }

        for record in loaded.records {
            let definition = record.into_definition();
            let id = definition.id.clone();
            let outcome = registry.check_registrable(&definition).and_then(|_| {
                compiler
                    .compile(&definition.source)
                    .map_err(|e| ApiError::InvalidDefinition(format!("Compilation failed: {}", e)))
            });
            let result = outcome.and_then(|component| registry.register(definition, component));
            match result {
                Ok(_) => report.loaded.push(id),
                Err(e) => {
                    warn!("Dropping persisted component {}: {}", id, e);
                    report.dropped.push(DroppedComponent {
                        id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            dropped = report.dropped.len(),
            "component registry bootstrapped"
        );
        (registry, report)
    }

    fn check_registrable(&self, definition: &ComponentDefinition) -> Result<(), ApiError> {
        if self.is_builtin(&definition.id) {
            return Err(ApiError::ProtectedComponent(definition.id.clone()));
        }
        if definition.source.trim().is_empty() {
            return Err(ApiError::InvalidDefinition(format!(
                "Custom component '{}' has no source",
                definition.id
            )));
        }
        Ok(())
    }

    /// Register or atomically replace a custom component.
    pub fn register(
        &mut self,
        mut definition: ComponentDefinition,
        component: CompiledComponent,
    ) -> Result<RegistryEvent, ApiError> {
        definition.origin = Origin::Custom;
        self.check_registrable(&definition)?;
        definition.validate().map_err(ApiError::InvalidDefinition)?;

        let id = definition.id.clone();
        let entry = RegistryEntry {
            definition,
            component: Some(component),
        };
        let replaced = match self.custom.iter_mut().find(|e| e.definition.id == id) {
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.custom.push(entry);
                false
            }
        };
        info!(id = %id, replaced, "component registered");
        Ok(RegistryEvent::Registered { id, replaced })
    }

    /// Remove a custom component. Builtin and unknown ids are a no-op.
    pub fn unregister(&mut self, id: &str) -> Option<RegistryEvent> {
        let position = self.custom.iter().position(|e| e.definition.id == id)?;
        self.custom.remove(position);
        info!(id = %id, "component unregistered");
        Some(RegistryEvent::Unregistered { id: id.to_string() })
    }

    pub fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.builtins
            .iter()
            .chain(self.custom.iter())
            .find(|e| e.definition.id == id)
    }

    pub fn definition(&self, id: &str) -> Option<&ComponentDefinition> {
        self.get(id).map(|e| &e.definition)
    }

    pub fn component(&self, id: &str) -> Option<&CompiledComponent> {
        self.get(id).and_then(|e| e.component.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn is_builtin(&self, id: &str) -> bool {
        self.builtins.iter().any(|e| e.definition.id == id)
    }

    /// Builtins in catalog order, then customs in registration order.
    pub fn list_all(&self) -> Vec<&ComponentDefinition> {
        self.builtins
            .iter()
            .chain(self.custom.iter())
            .map(|e| &e.definition)
            .collect()
    }

    pub fn list_by_category(&self, category: &str) -> Vec<&ComponentDefinition> {
        self.list_all()
            .into_iter()
            .filter(|d| d.category == category)
            .collect()
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for definition in self.list_all() {
            if !seen.contains(&definition.category.as_str()) {
                seen.push(&definition.category);
            }
        }
        seen
    }

    pub fn custom_definitions(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.custom.iter().map(|e| &e.definition)
    }

    pub fn len(&self) -> usize {
        self.builtins.len() + self.custom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

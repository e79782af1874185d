//! Writes custom component sources whenever the registry changes.

use crate::error::ApiError;
use crate::registry::{ComponentRegistry, ComponentRepository, RegistryEvent, StoredComponent};
use std::sync::Arc;
use tracing::debug;

/// Subscriber that mirrors the registry's custom set into a repository.
#[derive(Clone)]
pub struct RegistryPersistence {
    repository: Arc<dyn ComponentRepository>,
}

impl RegistryPersistence {
    pub fn new(repository: Arc<dyn ComponentRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn ComponentRepository> {
        &self.repository
    }

    /// Persist the full custom set after `event`. Builtins never reach the store.
    pub fn handle(&self, event: &RegistryEvent, registry: &ComponentRegistry) -> Result<(), ApiError> {
        let records: Vec<StoredComponent> = registry
            .custom_definitions()
            .map(StoredComponent::from_definition)
            .collect();
        debug!(id = %event.id(), count = records.len(), "persisting custom components");
        self.repository.save_all(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::component::builtin_definitions;
    use crate::pipeline::{compile_definition, CompileOutcome};
    use crate::registry::{InMemoryComponentRepository, XdgComponentRepository};

    const REPLY: &str = "```json\n{\"widget\": {\"id\": \"greeter\", \"name\": \"Greeter\"}}\n```\n```jsx\nfunction Widget({ config }) { return <p>Hello {config.who}</p> }\n```";

    #[test]
    fn every_event_writes_the_custom_set() {
        let repo = Arc::new(InMemoryComponentRepository::new());
        let persistence = RegistryPersistence::new(repo.clone());
        let mut registry = ComponentRegistry::with_builtins(builtin_definitions());

        let CompileOutcome::Success { definition, component } = compile_definition(REPLY) else {
            panic!("reply should compile");
        };
        let event = registry.register(definition, component).unwrap();
        persistence.handle(&event, &registry).unwrap();
        assert_eq!(repo.records().len(), 1);
        assert_eq!(repo.records()[0].id, "greeter");

        let event = registry.unregister("greeter").unwrap();
        persistence.handle(&event, &registry).unwrap();
        assert!(repo.records().is_empty());
        assert_eq!(repo.save_count(), 2);
    }

    #[test]
    fn persisted_file_holds_source_but_no_compiled_artifacts() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("components.json");
        let repo = Arc::new(XdgComponentRepository::new(&path));
        let persistence = RegistryPersistence::new(repo.clone());
        let mut registry = ComponentRegistry::with_builtins(builtin_definitions());

        let CompileOutcome::Success { definition, component } = compile_definition(REPLY) else {
            panic!("reply should compile");
        };
        let event = registry.register(definition, component).unwrap();
        persistence.handle(&event, &registry).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        let record = json["greeter"].as_object().unwrap();
        let mut keys: Vec<&str> = record.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "category",
                "configSchema",
                "defaultSize",
                "description",
                "icon",
                "id",
                "minSize",
                "name",
                "source"
            ]
        );
        assert!(json.get("clock").is_none());

        let (reloaded, report) = ComponentRegistry::bootstrap(
            builtin_definitions(),
            repo.as_ref(),
            &crate::compiler::Compiler::default(),
        );
        assert!(report.is_clean());
        assert_eq!(
            reloaded.definition("greeter"),
            registry.definition("greeter")
        );
        assert!(compile(&reloaded.definition("greeter").unwrap().source).is_ok());
    }
}

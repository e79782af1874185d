//! Dashboard
//!
//! Composes the component registry, its persistence subscriber and the layout
//! store. This is the [`ComponentHost`] the orchestrator installs into, and
//! the surface the CLI inspects and edits.

use crate::compiler::{ComponentInstance, Compiler, Node, RenderProps};
use crate::component::{builtin_definitions, ComponentDefinition};
use crate::config::PanelkitConfig;
use crate::error::ApiError;
use crate::layout::{
    Geometry, Layout, LayoutItem, LayoutRepository, LayoutStore, Placement, XdgLayoutRepository,
};
use crate::orchestrator::{ComponentHost, Installation};
use crate::registry::{
    BootstrapReport, ComponentRegistry, ComponentRepository, RegistryEvent, RegistryPersistence,
    XdgComponentRepository,
};
use crate::agent::ComponentSummary;
use crate::compiler::CompiledComponent;
use crate::types::InstanceId;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Re-renders allowed after effects or handlers change state.
const MAX_SETTLE_PASSES: usize = 8;

/// Result of rendering a layout instance.
#[derive(Debug)]
pub enum Rendered {
    /// Builtins are drawn natively by the host surface, not by panelkit.
    Builtin(ComponentDefinition),
    Tree(Node),
}

/// What `remove_component` took out.
#[derive(Debug)]
pub struct Removal {
    pub event: RegistryEvent,
    pub instances: Vec<LayoutItem>,
}

pub struct Dashboard {
    registry: ComponentRegistry,
    persistence: RegistryPersistence,
    layout: LayoutStore,
    report: BootstrapReport,
}

impl Dashboard {
    /// Open the dashboard stored under the configured data directory.
    pub fn open(config: &PanelkitConfig) -> Result<Self, ApiError> {
        let components = Arc::new(XdgComponentRepository::from_storage(&config.storage)?);
        let layout = Arc::new(XdgLayoutRepository::from_storage(&config.storage)?);
        Ok(Self::with_repositories(
            components,
            layout,
            &Compiler::new(config.compiler.clone()),
        ))
    }

    pub fn with_repositories(
        components: Arc<dyn ComponentRepository>,
        layout: Arc<dyn LayoutRepository>,
        compiler: &Compiler,
    ) -> Self {
        let (registry, report) =
            ComponentRegistry::bootstrap(builtin_definitions(), components.as_ref(), compiler);
        Self {
            registry,
            persistence: RegistryPersistence::new(components),
            layout: LayoutStore::load(layout),
            report,
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn layout(&self) -> &Layout {
        self.layout.layout()
    }

    pub fn bootstrap_report(&self) -> &BootstrapReport {
        &self.report
    }

    fn persist(&self, event: &RegistryEvent) {
        if let Err(e) = self.persistence.handle(event, &self.registry) {
            warn!("Failed to persist components after {:?}: {}", event, e);
        }
    }

    /// Register without placing an instance.
    pub fn register(
        &mut self,
        definition: ComponentDefinition,
        component: CompiledComponent,
    ) -> Result<RegistryEvent, ApiError> {
        let event = self.registry.register(definition, component)?;
        self.persist(&event);
        Ok(event)
    }

    /// Unregister a custom component and remove its instances.
    pub fn remove_component(&mut self, id: &str) -> Result<Removal, ApiError> {
        if self.registry.is_builtin(id) {
            return Err(ApiError::ProtectedComponent(id.to_string()));
        }
        let event = self
            .registry
            .unregister(id)
            .ok_or_else(|| ApiError::ComponentNotFound(id.to_string()))?;
        self.persist(&event);
        let instances = self.layout.remove_definition(id);
        Ok(Removal { event, instances })
    }

    /// Place a new instance of any registered component.
    pub fn add_instance(&mut self, definition_id: &str) -> Result<InstanceId, ApiError> {
        let definition = self
            .registry
            .definition(definition_id)
            .ok_or_else(|| ApiError::ComponentNotFound(definition_id.to_string()))?;
        let placement = Placement::for_definition(definition);
        Ok(self.layout.attach_instance(definition_id, placement))
    }

    pub fn remove_instance(&mut self, instance_id: &str) -> Result<LayoutItem, ApiError> {
        self.layout.remove_instance(instance_id)
    }

    pub fn update_geometry(&mut self, instance_id: &str, geometry: Geometry) -> Result<(), ApiError> {
        self.layout.update_geometry(instance_id, geometry)
    }

    pub fn update_instance_config(
        &mut self,
        instance_id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), ApiError> {
        self.layout.update_config(instance_id, patch)
    }

    /// Render a layout instance, then press each button whose text contains one
    /// of `clicks`, in order. Config changes requested by the component are
    /// merged into the stored instance config.
    pub fn render_instance(
        &mut self,
        instance_id: &str,
        clicks: &[String],
    ) -> Result<Rendered, ApiError> {
        let item = self
            .layout()
            .get(instance_id)
            .cloned()
            .ok_or_else(|| ApiError::InstanceNotFound(instance_id.to_string()))?;
        let entry = self
            .registry
            .get(&item.definition_id)
            .ok_or_else(|| ApiError::ComponentNotFound(item.definition_id.clone()))?;
        let Some(component) = &entry.component else {
            return Ok(Rendered::Builtin(entry.definition.clone()));
        };

        let mut instance = component.instantiate();
        let mut props = RenderProps::new(item.effective_config(&entry.definition), item.size());
        let mut tree = settle(&mut instance, &props)?;
        let mut patches = Vec::new();

        for label in clicks {
            let handler = tree
                .find_element(&|el| {
                    el.props.get("onClick").is_some_and(|h| h.is_function())
                        && el
                            .children
                            .iter()
                            .map(Node::text_content)
                            .collect::<String>()
                            .contains(label.as_str())
                })
                .and_then(|el| el.props.get("onClick").cloned())
                .ok_or_else(|| {
                    ApiError::RenderFailed(format!("no clickable element labelled '{}'", label))
                })?;
            instance
                .invoke(&handler, Vec::new())
                .map_err(|e| ApiError::RenderFailed(e.to_string()))?;

            for patch in instance.take_config_changes() {
                for (key, value) in &patch {
                    props.config.insert(key.clone(), value.clone());
                }
                patches.push(patch);
            }
            tree = settle(&mut instance, &props)?;
        }
        instance
            .unmount()
            .map_err(|e| ApiError::RenderFailed(e.to_string()))?;

        for patch in patches {
            self.layout.update_config(instance_id, patch)?;
        }
        Ok(Rendered::Tree(tree))
    }
}

/// Render until state stops changing.
fn settle(instance: &mut ComponentInstance, props: &RenderProps) -> Result<Node, ApiError> {
    let mut tree = instance
        .render(props)
        .map_err(|e| ApiError::RenderFailed(e.to_string()))?;
    let mut passes = 1;
    while instance.needs_render() && passes < MAX_SETTLE_PASSES {
        tree = instance
            .render(props)
            .map_err(|e| ApiError::RenderFailed(e.to_string()))?;
        passes += 1;
    }
    debug!(passes, "instance settled");
    Ok(tree)
}

impl ComponentHost for Dashboard {
    fn summaries(&self) -> Vec<ComponentSummary> {
        self.registry
            .list_all()
            .into_iter()
            .map(|d| ComponentSummary {
                id: d.id.clone(),
                name: d.name.clone(),
                builtin: d.is_builtin(),
            })
            .collect()
    }

    fn install(
        &mut self,
        definition: ComponentDefinition,
        component: CompiledComponent,
    ) -> Result<Installation, ApiError> {
        let placement = Placement::for_definition(&definition);
        let name = definition.name.clone();
        let event = self.register(definition, component)?;
        let RegistryEvent::Registered { id, replaced } = event else {
            return Err(ApiError::InvalidDefinition(
                "registration produced no registered event".to_string(),
            ));
        };
        let instance_id = self.layout.attach_instance(&id, placement);
        Ok(Installation {
            component_id: id,
            name,
            instance_id,
            replaced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::InMemoryLayoutRepository;
    use crate::pipeline::{compile_definition, CompileOutcome};
    use crate::registry::InMemoryComponentRepository;
    use serde_json::json;

    const COUNTER: &str = r#"```json
{"widget": {"id": "counter", "name": "Counter",
 "configSchema": {"label": {"type": "string", "default": "Count"}}}}
```
```jsx
function Widget({ config, onConfigChange }) {
  const [n, setN] = useState(0);
  return (
    <div>
      <span>{config.label}: {n}</span>
      <button onClick={() => setN(n + 1)}>plus</button>
      <button onClick={() => onConfigChange({ label: "Total" })}>rename</button>
    </div>
  );
}
```"#;

    fn dashboard() -> (Dashboard, Arc<InMemoryComponentRepository>, Arc<InMemoryLayoutRepository>) {
        let components = Arc::new(InMemoryComponentRepository::new());
        let layout = Arc::new(InMemoryLayoutRepository::new());
        let dash = Dashboard::with_repositories(components.clone(), layout.clone(), &Compiler::default());
        (dash, components, layout)
    }

    fn install_counter(dash: &mut Dashboard) -> Installation {
        let CompileOutcome::Success { definition, component } = compile_definition(COUNTER) else {
            panic!("counter should compile");
        };
        dash.install(definition, component).unwrap()
    }

    #[test]
    fn install_registers_persists_and_places() {
        let (mut dash, components, layout) = dashboard();
        let installed = install_counter(&mut dash);
        assert_eq!(installed.component_id, "counter");
        assert!(!installed.replaced);
        assert_eq!(components.records().len(), 1);
        assert_eq!(layout.items().len(), 1);
        assert_eq!(layout.items()[0].config["label"], json!("Count"));
        assert!(dash.summaries().iter().any(|s| s.id == "counter" && !s.builtin));
    }

    #[test]
    fn clicks_update_state_and_config() {
        let (mut dash, _, _) = dashboard();
        let installed = install_counter(&mut dash);

        let Rendered::Tree(tree) = dash
            .render_instance(&installed.instance_id, &["plus".into(), "plus".into()])
            .unwrap()
        else {
            panic!("custom component should render a tree");
        };
        assert!(tree.text_content().contains("Count: 2"));

        let Rendered::Tree(tree) = dash
            .render_instance(&installed.instance_id, &["rename".into()])
            .unwrap()
        else {
            panic!("custom component should render a tree");
        };
        assert!(tree.text_content().contains("Total: 0"));
        let item = dash.layout().get(&installed.instance_id).unwrap();
        assert_eq!(item.config["label"], json!("Total"));

        let err = dash
            .render_instance(&installed.instance_id, &["missing".into()])
            .unwrap_err();
        assert!(matches!(err, ApiError::RenderFailed(_)));
    }

    #[test]
    fn layout_write_failures_do_not_undo_an_install() {
        let components = Arc::new(InMemoryComponentRepository::new());
        let mut dash = Dashboard::with_repositories(
            components.clone(),
            Arc::new(InMemoryLayoutRepository::failing("disk full")),
            &Compiler::default(),
        );
        let installed = install_counter(&mut dash);
        assert_eq!(components.records().len(), 1);
        assert!(dash.layout().get(&installed.instance_id).is_some());

        let removal = dash.remove_component("counter").unwrap();
        assert_eq!(removal.instances.len(), 1);
        assert!(components.records().is_empty());
        assert!(dash.layout().is_empty());
    }

    #[test]
    fn builtin_instances_render_as_placeholders() {
        let (mut dash, _, _) = dashboard();
        let id = dash.add_instance("clock").unwrap();
        assert!(matches!(
            dash.render_instance(&id, &[]).unwrap(),
            Rendered::Builtin(def) if def.id == "clock"
        ));
        assert!(matches!(
            dash.add_instance("nope"),
            Err(ApiError::ComponentNotFound(_))
        ));
    }

    #[test]
    fn removing_a_component_takes_its_instances() {
        let (mut dash, components, layout) = dashboard();
        let installed = install_counter(&mut dash);
        dash.add_instance("counter").unwrap();
        dash.add_instance("clock").unwrap();

        let removal = dash.remove_component("counter").unwrap();
        assert_eq!(removal.instances.len(), 2);
        assert!(removal.instances.iter().any(|i| i.instance_id == installed.instance_id));
        assert!(components.records().is_empty());
        assert_eq!(layout.items().len(), 1);

        assert!(matches!(
            dash.remove_component("clock"),
            Err(ApiError::ProtectedComponent(_))
        ));
        assert!(matches!(
            dash.remove_component("counter"),
            Err(ApiError::ComponentNotFound(_))
        ));
    }
}

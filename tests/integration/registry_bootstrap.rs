use crate::integration::support::{dashboard_in, CLOCK2};
use panelkit::component::is_builtin_id;
use panelkit::dashboard::Rendered;
use panelkit::error::ApiError;
use panelkit::orchestrator::ComponentHost;
use panelkit::pipeline::{compile_definition, CompileOutcome};
use serde_json::{json, Value};
use tempfile::TempDir;

fn stored(id: &str, source: &str) -> Value {
    json!({
        "id": id,
        "name": id,
        "description": "",
        "icon": "🧩",
        "category": "custom",
        "defaultSize": {"w": 4, "h": 3},
        "minSize": {"w": 2, "h": 2},
        "configSchema": {},
        "source": source,
    })
}

#[test]
fn corrupted_source_is_dropped_at_load() {
    let temp = TempDir::new().unwrap();
    let components = json!({
        "good": stored("good", "function Widget() { return <div>ok</div> }"),
        "broken": stored("broken", "function Widget() { return <div>ok</span> }"),
        "clock": stored("clock", "function Widget() { return <div>fake clock</div> }"),
    });
    std::fs::write(
        temp.path().join("components.json"),
        serde_json::to_string_pretty(&components).unwrap(),
    )
    .unwrap();

    let dashboard = dashboard_in(temp.path());
    let registry = dashboard.registry();
    assert!(registry.contains("good"));
    assert!(!registry.contains("broken"));
    assert!(registry.list_all().iter().all(|d| d.id != "broken"));
    assert!(registry.is_builtin("clock"));
    assert!(registry.definition("clock").unwrap().source.is_empty());

    let report = dashboard.bootstrap_report();
    assert_eq!(report.loaded, vec!["good".to_string()]);
    let dropped: Vec<&str> = report.dropped.iter().map(|d| d.id.as_str()).collect();
    assert!(dropped.contains(&"broken"));
    assert!(dropped.contains(&"clock"));
}

#[test]
fn unreadable_store_starts_with_builtins_only() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("components.json"), "{ not json").unwrap();

    let dashboard = dashboard_in(temp.path());
    assert!(dashboard.bootstrap_report().store_error.is_some());
    assert!(dashboard.registry().list_all().iter().all(|d| is_builtin_id(&d.id)));
}

#[test]
fn sources_and_layout_survive_a_restart() {
    let temp = TempDir::new().unwrap();
    let instance_id = {
        let mut dashboard = dashboard_in(temp.path());
        let CompileOutcome::Success {
            definition,
            component,
        } = compile_definition(CLOCK2)
        else {
            panic!("clock2 should compile");
        };
        dashboard.install(definition, component).unwrap().instance_id
    };

    let raw: Value =
        serde_json::from_str(&std::fs::read_to_string(temp.path().join("components.json")).unwrap())
            .unwrap();
    let record = raw["clock2"].as_object().unwrap();
    assert!(record["source"].as_str().unwrap().contains("function Widget"));
    assert!(!record.contains_key("origin"));

    let mut reopened = dashboard_in(temp.path());
    assert_eq!(reopened.bootstrap_report().loaded, vec!["clock2".to_string()]);
    assert!(matches!(
        reopened.render_instance(&instance_id, &[]).unwrap(),
        Rendered::Tree(_)
    ));
}

#[test]
fn builtin_ids_cannot_be_taken_or_removed() {
    let temp = TempDir::new().unwrap();
    let mut dashboard = dashboard_in(temp.path());
    let before = dashboard.registry().definition("clock").cloned().unwrap();

    let text = "```json\n{\"id\": \"clock\", \"name\": \"My Clock\"}\n```\n```jsx\nfunction Widget() { return <div>mine</div> }\n```";
    let CompileOutcome::Success {
        definition,
        component,
    } = compile_definition(text)
    else {
        panic!("source should compile");
    };
    let err = dashboard.install(definition, component).unwrap_err();
    assert!(matches!(err, ApiError::ProtectedComponent(_)));
    assert!(matches!(
        dashboard.remove_component("clock"),
        Err(ApiError::ProtectedComponent(_))
    ));
    assert_eq!(dashboard.registry().definition("clock"), Some(&before));
    assert!(dashboard.layout().is_empty());
}

use crate::integration::support::{dashboard_in, misspelled_reply, CLOCK2, MISSPELLED_SOURCE};
use panelkit::compiler::{compile, RenderProps};
use panelkit::component::Origin;
use panelkit::dashboard::Rendered;
use panelkit::orchestrator::ComponentHost;
use panelkit::pipeline::{compile_definition, CompileOutcome, FailureReason};
use panelkit::types::Size;
use proptest::prelude::*;
use serde_json::Map;
use tempfile::TempDir;

#[test]
fn metadata_and_source_register_as_custom() {
    let temp = TempDir::new().unwrap();
    let mut dashboard = dashboard_in(temp.path());

    let CompileOutcome::Success {
        definition,
        component,
    } = compile_definition(CLOCK2)
    else {
        panic!("clock2 should compile");
    };
    let installation = dashboard.install(definition, component).unwrap();
    assert_eq!(installation.component_id, "clock2");
    assert!(!installation.replaced);

    let stored = dashboard.registry().definition("clock2").unwrap();
    assert_eq!(stored.origin, Origin::Custom);
    assert_eq!(stored.name, "Clock 2");

    match dashboard
        .render_instance(&installation.instance_id, &[])
        .unwrap()
    {
        Rendered::Tree(node) => assert_eq!(node.text_content(), "4x3"),
        Rendered::Builtin(_) => panic!("custom component rendered as builtin"),
    }
}

#[test]
fn misspelled_entry_point_keeps_pasted_source() {
    match compile_definition(&misspelled_reply()) {
        CompileOutcome::Failure {
            reason: FailureReason::Compile(diagnostic),
            proposed: Some(proposed),
        } => {
            assert!(diagnostic.contains("entry point"), "{}", diagnostic);
            assert_eq!(proposed.source.as_deref(), Some(MISSPELLED_SOURCE));
        }
        other => panic!("expected a compile failure, got {:?}", other),
    }
}

#[test]
fn compiling_twice_gives_independent_components() {
    let source = "let renders = 0;\nfunction Widget() {\n  renders = renders + 1;\n  return <span>{renders}</span>;\n}";
    let first = compile(source).unwrap();
    let second = compile(source).unwrap();
    let props = RenderProps::new(Map::new(), Size::new(2, 2));

    let a = first.render_once(&props).unwrap();
    let b = second.render_once(&props).unwrap();
    assert_eq!(a.to_json(), b.to_json());
    assert_eq!(a.text_content(), "1");
}

#[test]
fn prose_only_reply_is_not_a_definition() {
    let outcome = compile_definition("Sure, what data should the widget show?");
    assert_eq!(outcome.failure_reason(), Some(&FailureReason::NoDefinition));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pipeline_never_panics_on_fenced_noise(prefix in ".{0,40}", body in ".{0,120}") {
        let text = format!("{}\n```jsx\n{}\n```", prefix, body);
        let outcome = compile_definition(&text);
        if let CompileOutcome::Failure { reason, .. } = outcome {
            prop_assert!(!reason.to_string().is_empty());
        }
    }
}

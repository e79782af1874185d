use crate::integration::support::{
    dashboard_in, fixed_reply, misspelled_reply, GatedAgent, CLOCK2,
};
use panelkit::agent::{AgentClient, EntryKind, Role, ScriptedAgent};
use panelkit::dashboard::Dashboard;
use panelkit::compiler::Compiler;
use panelkit::error::ApiError;
use panelkit::layout::InMemoryLayoutRepository;
use panelkit::orchestrator::{Completion, Orchestrator, State};
use panelkit::pipeline::DefinitionPipeline;
use panelkit::registry::XdgComponentRepository;
use std::sync::Arc;
use tempfile::TempDir;

fn orchestrator(agent: Arc<dyn AgentClient>, temp: &TempDir) -> Orchestrator<Dashboard> {
    Orchestrator::new(
        agent,
        DefinitionPipeline::default(),
        dashboard_in(temp.path()),
        "anthropic/claude-haiku-4-5",
    )
}

#[tokio::test]
async fn corrective_reply_adds_exactly_two_turns() {
    let temp = TempDir::new().unwrap();
    let agent = Arc::new(ScriptedAgent::with_replies([misspelled_reply(), fixed_reply()]));
    let orch = orchestrator(agent.clone(), &temp);

    let report = orch.submit("make me a greeting widget").await.unwrap();
    assert_eq!(
        report.state,
        State::Done(Completion::Registered {
            repaired: true,
            local: false
        })
    );

    // user request + failed reply, then corrective request + fixed reply
    let history = orch.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history.turns()[2].role, Role::User);
    assert!(history.turns()[2].text.contains("entry point"));
    assert_eq!(history.turns()[3].role, Role::Assistant);
    assert!(history.turns()[3].text.starts_with("Fixed the name."));
    drop(history);

    let requests = agent.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1]
        .latest_user_text()
        .is_some_and(|t| t.contains("Compilation failed")));

    let installation = report.installation.unwrap();
    let host = orch.host();
    assert!(host.registry().contains(&installation.component_id));
    assert!(host.layout().get(&installation.instance_id).is_some());
}

#[tokio::test]
async fn second_failure_gives_up_after_one_correction() {
    let temp = TempDir::new().unwrap();
    let agent = Arc::new(ScriptedAgent::with_replies([
        misspelled_reply(),
        misspelled_reply(),
        fixed_reply(),
    ]));
    let orch = orchestrator(agent.clone(), &temp);

    let report = orch.submit("make me a greeting widget").await.unwrap();
    assert!(matches!(report.state, State::GaveUp { .. }));
    assert!(report.installation.is_none());
    assert_eq!(agent.request_count(), 2);
    assert_eq!(orch.host().layout().len(), 0);
    assert_eq!(
        orch.transcript().last().map(|e| e.kind),
        Some(EntryKind::Error)
    );
}

#[tokio::test]
async fn unreachable_agent_compiles_pasted_source_locally() {
    let temp = TempDir::new().unwrap();
    let orch = orchestrator(Arc::new(ScriptedAgent::unreachable()), &temp);

    let report = orch.submit(CLOCK2).await.unwrap();
    assert_eq!(
        report.state,
        State::Done(Completion::Registered {
            repaired: false,
            local: true
        })
    );
    assert!(orch.host().registry().contains("clock2"));
}

#[tokio::test]
async fn unreachable_agent_without_source_reports_error() {
    let temp = TempDir::new().unwrap();
    let orch = orchestrator(Arc::new(ScriptedAgent::unreachable()), &temp);

    let report = orch.submit("a weather widget please").await.unwrap();
    assert!(matches!(
        report.state,
        State::Done(Completion::Unreachable { .. })
    ));
    assert!(report.installation.is_none());
}

#[tokio::test]
async fn second_submit_while_busy_is_rejected() {
    let temp = TempDir::new().unwrap();
    let agent = Arc::new(GatedAgent::new(CLOCK2));
    let orch = orchestrator(agent.clone(), &temp);

    let (first, second) = tokio::join!(orch.submit("a second clock"), async {
        let rejected = orch.submit("another one").await;
        agent.open();
        rejected
    });

    assert!(matches!(second, Err(ApiError::Busy)));
    assert!(first.unwrap().installation.is_some());
    assert_eq!(agent.calls(), 1);
    assert!(!orch.is_busy());
}

#[tokio::test]
async fn dismissed_request_is_discarded() {
    let temp = TempDir::new().unwrap();
    let agent = Arc::new(GatedAgent::new(CLOCK2));
    let orch = orchestrator(agent.clone(), &temp);
    let transcript_before = orch.transcript().len();

    let (report, ()) = tokio::join!(orch.submit("a second clock"), async {
        orch.dismiss();
        agent.open();
    });

    let report = report.unwrap();
    assert!(report.discarded);
    assert!(report.installation.is_none());
    assert!(orch.history().is_empty());
    assert_eq!(orch.transcript().len(), transcript_before);
    assert!(!orch.host().registry().contains("clock2"));

    // The next request goes through normally.
    agent.open();
    let next = orch.submit("a second clock").await.unwrap();
    assert!(next.installation.is_some());
}

#[tokio::test]
async fn replacing_a_custom_component_keeps_one_entry() {
    let temp = TempDir::new().unwrap();
    let agent = Arc::new(ScriptedAgent::with_replies([CLOCK2, CLOCK2]));
    let orch = orchestrator(agent, &temp);

    orch.submit("a second clock").await.unwrap();
    let again = orch.submit("again").await.unwrap();
    assert!(again.installation.unwrap().replaced);

    let host = orch.host();
    let custom: Vec<_> = host.registry().custom_definitions().collect();
    assert_eq!(custom.len(), 1);
    assert_eq!(host.layout().instances_of("clock2").count(), 2);
}

#[tokio::test]
async fn layout_write_failure_still_registers() {
    let temp = TempDir::new().unwrap();
    let dashboard = Dashboard::with_repositories(
        Arc::new(XdgComponentRepository::new(temp.path().join("components.json"))),
        Arc::new(InMemoryLayoutRepository::failing("disk full")),
        &Compiler::default(),
    );
    let orch = Orchestrator::new(
        Arc::new(ScriptedAgent::with_replies([CLOCK2])),
        DefinitionPipeline::default(),
        dashboard,
        "anthropic/claude-haiku-4-5",
    );

    let report = orch.submit("a second clock").await.unwrap();
    assert_eq!(
        report.state,
        State::Done(Completion::Registered {
            repaired: false,
            local: false
        })
    );
    let installation = report.installation.unwrap();
    assert_eq!(orch.history().len(), 2);
    assert!(orch.host().layout().get(&installation.instance_id).is_some());

    let reopened = dashboard_in(temp.path());
    assert!(reopened.registry().contains("clock2"));
}

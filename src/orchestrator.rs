//! Fix-Retry Orchestrator
//!
//! Drives one request at a time from user text to an installed component. A
//! reply that fails to compile earns exactly one corrective round-trip; a
//! second failure gives up. When the agent is unreachable and the user pasted
//! source, that source is compiled locally instead.
//!
//! The state machine lives in [`state`]; this module is the async driver that
//! performs the I/O each transition asks for.

pub mod state;

pub use state::{transition, Action, Completion, Event, State};

use crate::agent::{
    system_preamble, AgentClient, AgentRequest, ComponentSummary, Conversation, EntryKind,
    Transcript, Turn,
};
use crate::compiler::CompiledComponent;
use crate::component::ComponentDefinition;
use crate::error::ApiError;
use crate::extract::contains_source_fence;
use crate::pipeline::{CompileOutcome, DefinitionPipeline};
use crate::types::{ComponentId, InstanceId};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where compiled components go. Implemented by the dashboard.
pub trait ComponentHost {
    /// Components the agent should know about.
    fn summaries(&self) -> Vec<ComponentSummary>;

    /// Register the component and attach one layout instance of it.
    fn install(
        &mut self,
        definition: ComponentDefinition,
        component: CompiledComponent,
    ) -> Result<Installation, ApiError>;
}

impl<H: ComponentHost + ?Sized> ComponentHost for &mut H {
    fn summaries(&self) -> Vec<ComponentSummary> {
        (**self).summaries()
    }

    fn install(
        &mut self,
        definition: ComponentDefinition,
        component: CompiledComponent,
    ) -> Result<Installation, ApiError> {
        (**self).install(definition, component)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Installation {
    pub component_id: ComponentId,
    pub name: String,
    pub instance_id: InstanceId,
    /// An existing custom component with the same id was replaced.
    pub replaced: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub state: State,
    pub installation: Option<Installation>,
    /// The request was dismissed while in flight and its result dropped.
    pub discarded: bool,
}

struct BusyGuard<'a>(&'a Cell<bool>);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct Orchestrator<H: ComponentHost> {
    client: Arc<dyn AgentClient>,
    pipeline: DefinitionPipeline,
    host: RefCell<H>,
    model_id: RefCell<String>,
    conversation: RefCell<Conversation>,
    transcript: RefCell<Transcript>,
    busy: Cell<bool>,
    epoch: Cell<u64>,
}

impl<H: ComponentHost> Orchestrator<H> {
    pub fn new(
        client: Arc<dyn AgentClient>,
        pipeline: DefinitionPipeline,
        host: H,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            pipeline,
            host: RefCell::new(host),
            model_id: RefCell::new(model_id.into()),
            conversation: RefCell::new(Conversation::new()),
            transcript: RefCell::new(Transcript::with_welcome()),
            busy: Cell::new(false),
            epoch: Cell::new(0),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Invalidate the in-flight request, if any. Its result will be dropped.
    pub fn dismiss(&self) {
        self.epoch.set(self.epoch.get() + 1);
        debug!(epoch = self.epoch.get(), "in-flight request dismissed");
    }

    pub fn model_id(&self) -> String {
        self.model_id.borrow().clone()
    }

    pub fn set_model(&self, model_id: impl Into<String>) {
        *self.model_id.borrow_mut() = model_id.into();
    }

    pub fn history(&self) -> Ref<'_, Conversation> {
        self.conversation.borrow()
    }

    pub fn transcript(&self) -> Ref<'_, Transcript> {
        self.transcript.borrow()
    }

    pub fn host(&self) -> Ref<'_, H> {
        self.host.borrow()
    }

    /// Mutable host access between requests.
    pub fn host_mut(&self) -> Result<RefMut<'_, H>, ApiError> {
        if self.is_busy() {
            return Err(ApiError::Busy);
        }
        Ok(self.host.borrow_mut())
    }

    /// Forget the conversation; the transcript is kept.
    pub fn reset_conversation(&self) {
        self.conversation.borrow_mut().clear();
        self.note(EntryKind::Notice, "Conversation cleared.");
    }

    fn note(&self, kind: EntryKind, text: impl Into<String>) {
        self.transcript.borrow_mut().push(kind, text);
    }

    fn remember(&self, turn: Turn) {
        self.conversation.borrow_mut().push(turn);
    }

    fn request_with(&self, extra: &[Turn]) -> AgentRequest {
        let summaries = self.host.borrow().summaries();
        let mut turns = self.conversation.borrow().turns().to_vec();
        turns.extend_from_slice(extra);
        AgentRequest {
            turns,
            model_id: self.model_id(),
            preamble: system_preamble(&summaries),
        }
    }

    fn classify(&self, text: &str) -> (Event, CompileOutcome) {
        let outcome = self.pipeline.compile(text);
        let event = match outcome.failure_reason() {
            None => Event::Compiled,
            Some(reason) => Event::Failed(reason.clone()),
        };
        (event, outcome)
    }

    /// Process one user message to completion.
    ///
    /// Fails only with [`ApiError::Busy`]; every other problem ends in a
    /// terminal [`State`] and a transcript entry.
    pub async fn submit(&self, text: &str) -> Result<RunReport, ApiError> {
        if self.busy.get() {
            return Err(ApiError::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Ok(RunReport {
                state: State::Idle,
                installation: None,
                discarded: false,
            });
        }
        self.busy.set(true);
        let _guard = BusyGuard(&self.busy);

        let epoch = self.epoch.get();
        let history_mark = self.conversation.borrow().len();
        let transcript_mark = self.transcript.borrow().len();
        let has_source = contains_source_fence(text);
        self.note(EntryKind::User, text);
        self.remember(Turn::user(text));

        let mut state = State::Idle;
        let mut event = Event::Submitted;
        let mut outcome: Option<CompileOutcome> = None;
        let mut reply: Option<String> = None;
        let mut correction: Option<String> = None;
        let mut installation = None;

        loop {
            let (next, action) = transition(&state, event);
            debug!(from = ?state, to = ?next, "orchestrator transition");
            state = next;

            event = match action {
                Action::SendRequest => {
                    let request = self.request_with(&[]);
                    let result = self.client.send(&request).await;
                    if self.epoch.get() != epoch {
                        return Ok(self.discard(state, history_mark, transcript_mark));
                    }
                    match result {
                        Ok(text) => {
                            let (event, compiled) = self.classify(&text);
                            reply = Some(text);
                            outcome = Some(compiled);
                            event
                        }
                        Err(e) => {
                            warn!("Agent request failed: {}", e);
                            Event::TransportFailed {
                                error: e.to_string(),
                                has_source,
                            }
                        }
                    }
                }
                Action::SendCorrection { prompt } => {
                    if let Some(failed) = reply.take() {
                        self.note(EntryKind::Agent, failed.clone());
                        self.remember(Turn::assistant(failed));
                    }
                    if let State::Fixing { diagnostic } = &state {
                        info!(diagnostic = %diagnostic, "requesting one corrective reply");
                        self.note(
                            EntryKind::Notice,
                            format!("🔧 {}. Asking the agent for a fix.", diagnostic),
                        );
                    }
                    let request = self.request_with(&[Turn::user(prompt.clone())]);
                    let result = self.client.send(&request).await;
                    if self.epoch.get() != epoch {
                        return Ok(self.discard(state, history_mark, transcript_mark));
                    }
                    match result {
                        Ok(text) => {
                            let (event, compiled) = self.classify(&text);
                            correction = Some(prompt);
                            reply = Some(text);
                            outcome = Some(compiled);
                            event
                        }
                        Err(e) => {
                            warn!("Corrective request failed: {}", e);
                            Event::TransportFailed {
                                error: e.to_string(),
                                has_source,
                            }
                        }
                    }
                }
                Action::CompileLocally => {
                    self.note(
                        EntryKind::Notice,
                        "Agent unreachable; compiling the pasted source locally.",
                    );
                    let (event, compiled) = self.classify(text);
                    outcome = Some(compiled);
                    event
                }
                Action::Install => {
                    let Some(CompileOutcome::Success {
                        definition,
                        component,
                    }) = outcome.take()
                    else {
                        warn!("install requested without a compiled component");
                        break;
                    };
                    let result = self.host.borrow_mut().install(definition, component);
                    match result {
                        Ok(installed) => {
                            self.show_reply(&mut reply, &mut correction);
                            let replaced = if installed.replaced { " (replaced)" } else { "" };
                            self.note(
                                EntryKind::Notice,
                                format!("✅ Component \"{}\" registered{}", installed.name, replaced),
                            );
                            self.note(
                                EntryKind::Notice,
                                format!("📌 Added \"{}\" to the layout", installed.name),
                            );
                            installation = Some(installed);
                            break;
                        }
                        Err(e) => Event::InstallRejected {
                            reason: e.to_string(),
                        },
                    }
                }
                Action::ShowReply => {
                    self.show_reply(&mut reply, &mut correction);
                    break;
                }
                Action::Notify(notice) => {
                    self.show_reply(&mut reply, &mut correction);
                    self.note(EntryKind::Notice, notice);
                    break;
                }
                Action::ShowError(message) => {
                    if let Some(failed) = reply.take() {
                        self.note(EntryKind::Agent, failed);
                    }
                    // No reply reached the history; keep user and assistant turns paired.
                    if matches!(
                        state,
                        State::Done(Completion::Unreachable { .. } | Completion::LocalFailed { .. })
                    ) {
                        self.conversation.borrow_mut().truncate(history_mark);
                    }
                    self.note(EntryKind::Error, message);
                    break;
                }
                Action::None => break,
            };
        }

        info!(state = ?state, "request finished");
        Ok(RunReport {
            state,
            installation,
            discarded: false,
        })
    }

    /// Put a successful reply on the transcript and into the history, preceded
    /// by the corrective turn that produced it.
    fn show_reply(&self, reply: &mut Option<String>, correction: &mut Option<String>) {
        let Some(text) = reply.take() else {
            return;
        };
        if let Some(prompt) = correction.take() {
            self.remember(Turn::user(prompt));
        }
        self.note(EntryKind::Agent, text.clone());
        self.remember(Turn::assistant(text));
    }

    /// Roll the history and the transcript back to where the request began.
    fn discard(&self, state: State, history_mark: usize, transcript_mark: usize) -> RunReport {
        info!(state = ?state, "dismissed request finished; result discarded");
        self.conversation.borrow_mut().truncate(history_mark);
        self.transcript.borrow_mut().truncate(transcript_mark);
        RunReport {
            state,
            installation: None,
            discarded: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ScriptedAgent;
    use crate::types::generate_instance_id;

    /// Host that records installs and can refuse one id.
    #[derive(Default)]
    struct RecordingHost {
        installed: Vec<ComponentDefinition>,
        refuse: Option<String>,
    }

    impl ComponentHost for RecordingHost {
        fn summaries(&self) -> Vec<ComponentSummary> {
            self.installed
                .iter()
                .map(|d| ComponentSummary {
                    id: d.id.clone(),
                    name: d.name.clone(),
                    builtin: false,
                })
                .collect()
        }

        fn install(
            &mut self,
            definition: ComponentDefinition,
            _component: CompiledComponent,
        ) -> Result<Installation, ApiError> {
            if self.refuse.as_deref() == Some(definition.id.as_str()) {
                return Err(ApiError::ProtectedComponent(definition.id));
            }
            let installation = Installation {
                component_id: definition.id.clone(),
                name: definition.name.clone(),
                instance_id: generate_instance_id(),
                replaced: false,
            };
            self.installed.push(definition);
            Ok(installation)
        }
    }

    const GOOD: &str = "```json\n{\"widget\": {\"id\": \"hello\", \"name\": \"Hello\"}}\n```\n```jsx\nfunction Widget() { return <div>hello</div> }\n```";
    const BROKEN: &str = "```json\n{\"widget\": {\"id\": \"hello\", \"name\": \"Hello\"}}\n```\n```jsx\nfunction Widget() { return <div>hello</span> }\n```";

    fn orchestrator(agent: Arc<ScriptedAgent>) -> Orchestrator<RecordingHost> {
        Orchestrator::new(
            agent,
            DefinitionPipeline::default(),
            RecordingHost::default(),
            "test-model",
        )
    }

    #[tokio::test]
    async fn success_registers_and_records_two_notices() {
        let agent = Arc::new(ScriptedAgent::with_replies([GOOD]));
        let orch = orchestrator(agent.clone());
        let report = orch.submit("make a hello widget").await.unwrap();

        assert!(matches!(
            report.state,
            State::Done(Completion::Registered { repaired: false, .. })
        ));
        assert_eq!(report.installation.unwrap().component_id, "hello");
        assert_eq!(orch.history().len(), 2);
        let kinds: Vec<EntryKind> = orch.transcript().since(1).iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EntryKind::User, EntryKind::Agent, EntryKind::Notice, EntryKind::Notice]
        );
        let request = &agent.requests()[0];
        assert_eq!(request.model_id, "test-model");
        assert!(request.preamble.contains("Widget"));
        assert!(!orch.is_busy());
    }

    #[tokio::test]
    async fn repaired_reply_adds_correction_and_fix_to_history() {
        let agent = Arc::new(ScriptedAgent::with_replies([BROKEN, GOOD]));
        let orch = orchestrator(agent.clone());
        let report = orch.submit("make a hello widget").await.unwrap();

        assert_eq!(
            report.state,
            State::Done(Completion::Registered {
                repaired: true,
                local: false
            })
        );
        assert_eq!(agent.request_count(), 2);
        let correction = &agent.requests()[1];
        let last = correction.turns.last().unwrap();
        assert!(last.text.contains("Compilation failed: SyntaxError"));
        assert_eq!(correction.turns[correction.turns.len() - 2].text, BROKEN);

        let history = orch.history();
        let texts: Vec<&str> = history.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts.len(), 4);
        assert_eq!(texts[1], BROKEN);
        assert_eq!(texts[3], GOOD);
    }

    #[tokio::test]
    async fn second_failure_gives_up_without_touching_history() {
        let agent = Arc::new(ScriptedAgent::with_replies([BROKEN, BROKEN, GOOD]));
        let orch = orchestrator(agent.clone());
        let report = orch.submit("make a hello widget").await.unwrap();

        assert!(matches!(report.state, State::GaveUp { .. }));
        assert_eq!(agent.request_count(), 2);
        assert!(orch.host().installed.is_empty());
        assert_eq!(orch.history().len(), 2);
        assert_eq!(orch.transcript().last().unwrap().kind, EntryKind::Error);
    }

    #[tokio::test]
    async fn conversational_and_missing_source_replies() {
        let agent = Arc::new(ScriptedAgent::with_replies([
            "What should the widget show?",
            "```json\n{\"widget\": {\"id\": \"x\", \"name\": \"X\"}}\n```",
        ]));
        let orch = orchestrator(agent.clone());
        let report = orch.submit("a widget please").await.unwrap();
        assert_eq!(report.state, State::Done(Completion::Conversational));
        assert_eq!(orch.history().len(), 2);

        let report = orch.submit("stock prices").await.unwrap();
        assert_eq!(report.state, State::Done(Completion::MissingSource));
        assert_eq!(agent.request_count(), 2);
        assert_eq!(agent.requests()[1].turns.len(), 3);
    }

    #[tokio::test]
    async fn unreachable_agent_uses_local_mode_for_pasted_source() {
        let agent = Arc::new(ScriptedAgent::unreachable());
        let orch = orchestrator(agent.clone());

        let report = orch.submit("make a clock").await.unwrap();
        assert!(matches!(
            report.state,
            State::Done(Completion::Unreachable { .. })
        ));

        let report = orch.submit(GOOD).await.unwrap();
        assert_eq!(
            report.state,
            State::Done(Completion::Registered {
                repaired: false,
                local: true
            })
        );
        assert_eq!(agent.request_count(), 2);

        let report = orch.submit(BROKEN).await.unwrap();
        assert!(matches!(
            report.state,
            State::Done(Completion::LocalFailed { .. })
        ));
        assert_eq!(agent.request_count(), 3);
    }

    #[tokio::test]
    async fn failed_requests_leave_no_unanswered_user_turn() {
        let agent = Arc::new(ScriptedAgent::unreachable());
        let orch = orchestrator(agent.clone());

        orch.submit("make a clock").await.unwrap();
        assert!(orch.history().is_empty());
        let report = orch.submit(BROKEN).await.unwrap();
        assert!(matches!(
            report.state,
            State::Done(Completion::LocalFailed { .. })
        ));
        assert!(orch.history().is_empty());

        orch.submit("make a clock again").await.unwrap();
        let last = &agent.requests()[2];
        assert_eq!(last.turns.len(), 1);
        assert_eq!(last.turns[0].text, "make a clock again");
        // The transcript still shows every attempt.
        let users = orch
            .transcript()
            .entries()
            .iter()
            .filter(|e| e.kind == EntryKind::User)
            .count();
        assert_eq!(users, 3);
    }

    #[tokio::test]
    async fn host_rejection_is_terminal() {
        let agent = Arc::new(ScriptedAgent::with_replies([GOOD]));
        let orch = Orchestrator::new(
            agent,
            DefinitionPipeline::default(),
            RecordingHost {
                installed: Vec::new(),
                refuse: Some("hello".into()),
            },
            "m",
        );
        let report = orch.submit("hello").await.unwrap();
        assert!(matches!(
            report.state,
            State::Done(Completion::Rejected { ref reason }) if reason.contains("reserved")
        ));
        assert!(report.installation.is_none());
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let agent = Arc::new(ScriptedAgent::new());
        let orch = orchestrator(agent.clone());
        let report = orch.submit("   ").await.unwrap();
        assert_eq!(report.state, State::Idle);
        assert_eq!(agent.request_count(), 0);
    }
}

//! Orchestrator states and the pure transition function.
//!
//! `transition` performs no I/O. The async driver in the parent module carries
//! out each returned [`Action`] and feeds the result back as the next [`Event`].

use crate::agent::corrective_prompt;
use crate::pipeline::FailureReason;

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Idle,
    /// The user's request is with the agent.
    Sent,
    /// The first reply failed to compile; the corrective turn is with the agent.
    Fixing { diagnostic: String },
    /// The agent was unreachable and the user's own text is being compiled.
    Local,
    Done(Completion),
    /// The corrective reply failed too. Terminal; never retried.
    GaveUp { diagnostic: String },
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Done(_) | State::GaveUp { .. })
    }
}

/// How a finished request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Registered { repaired: bool, local: bool },
    /// The reply held no definition; it is ordinary conversation.
    Conversational,
    MissingSource,
    /// The host refused the component, e.g. a builtin id collision.
    Rejected { reason: String },
    LocalFailed { reason: String },
    Unreachable { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Submitted,
    /// The pipeline produced a component.
    Compiled,
    Failed(FailureReason),
    TransportFailed { error: String, has_source: bool },
    InstallRejected { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SendRequest,
    SendCorrection { prompt: String },
    CompileLocally,
    Install,
    ShowReply,
    Notify(String),
    ShowError(String),
    None,
}

pub const MISSING_SOURCE_NOTICE: &str =
    "⚠️ The reply described a component but included no source. Ask for the full component code.";

fn give_up_message(reason: &FailureReason) -> String {
    format!(
        "{}. The automatic fix did not work either; try a simpler description.",
        reason
    )
}

fn unreachable_message(error: &str) -> String {
    format!(
        "⚠️ Could not reach the agent gateway ({}). Check agent.endpoint in the config, \
         or paste a ```jsx block to compile it locally.",
        error
    )
}

/// Next state and the action that leads out of it. Events that do not apply
/// to `state` leave it unchanged with [`Action::None`].
pub fn transition(state: &State, event: Event) -> (State, Action) {
    match (state, event) {
        (State::Idle, Event::Submitted) => (State::Sent, Action::SendRequest),

        (State::Sent, Event::Compiled) => (
            State::Done(Completion::Registered {
                repaired: false,
                local: false,
            }),
            Action::Install,
        ),
        (State::Sent, Event::Failed(reason)) => match reason {
            FailureReason::Compile(_) => {
                let diagnostic = reason.to_string();
                let prompt = corrective_prompt(&diagnostic);
                (State::Fixing { diagnostic }, Action::SendCorrection { prompt })
            }
            FailureReason::NoDefinition => {
                (State::Done(Completion::Conversational), Action::ShowReply)
            }
            FailureReason::MissingSource => (
                State::Done(Completion::MissingSource),
                Action::Notify(MISSING_SOURCE_NOTICE.to_string()),
            ),
        },

        (State::Fixing { .. }, Event::Compiled) => (
            State::Done(Completion::Registered {
                repaired: true,
                local: false,
            }),
            Action::Install,
        ),
        (State::Fixing { .. }, Event::Failed(reason)) => (
            State::GaveUp {
                diagnostic: reason.to_string(),
            },
            Action::ShowError(give_up_message(&reason)),
        ),

        (State::Sent | State::Fixing { .. }, Event::TransportFailed { error, has_source }) => {
            if has_source {
                (State::Local, Action::CompileLocally)
            } else {
                let message = unreachable_message(&error);
                (
                    State::Done(Completion::Unreachable { error }),
                    Action::ShowError(message),
                )
            }
        }

        (State::Local, Event::Compiled) => (
            State::Done(Completion::Registered {
                repaired: false,
                local: true,
            }),
            Action::Install,
        ),
        (State::Local, Event::Failed(reason)) => {
            let message = reason.to_string();
            (
                State::Done(Completion::LocalFailed { reason: message.clone() }),
                Action::ShowError(message),
            )
        }

        (State::Done(Completion::Registered { .. }), Event::InstallRejected { reason }) => {
            let notice = format!("⚠️ {}", reason);
            (
                State::Done(Completion::Rejected { reason }),
                Action::Notify(notice),
            )
        }

        (state, _) => (state.clone(), Action::None),
    }
}

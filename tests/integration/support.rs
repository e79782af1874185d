use async_trait::async_trait;
use panelkit::agent::{AgentClient, AgentRequest};
use panelkit::compiler::Compiler;
use panelkit::dashboard::Dashboard;
use panelkit::error::ApiError;
use panelkit::layout::XdgLayoutRepository;
use panelkit::registry::XdgComponentRepository;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Notify;

pub const CLOCK2: &str = "Here is a second clock.\n\n```json\n{\"id\": \"clock2\", \"name\": \"Clock 2\"}\n```\n\n```jsx\nfunction Widget({ config, size }) {\n  return <div className=\"clock\">{size.w}x{size.h}</div>;\n}\n```";

/// Source-only reply whose entry point is misspelled.
pub const MISSPELLED_SOURCE: &str = "function Widgte() {\n  return <div>hi</div>;\n}";

pub fn misspelled_reply() -> String {
    format!("Try this:\n```jsx\n{}\n```", MISSPELLED_SOURCE)
}

pub fn fixed_reply() -> String {
    "Fixed the name.\n```jsx\nfunction Widget() {\n  return <div>hi</div>;\n}\n```".to_string()
}

/// A dashboard persisted under `dir`.
pub fn dashboard_in(dir: &Path) -> Dashboard {
    Dashboard::with_repositories(
        Arc::new(XdgComponentRepository::new(dir.join("components.json"))),
        Arc::new(XdgLayoutRepository::new(dir.join("layout.json"))),
        &Compiler::default(),
    )
}

/// Agent that holds each call until the test opens the gate.
pub struct GatedAgent {
    gate: Notify,
    reply: String,
    calls: Mutex<usize>,
}

impl GatedAgent {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            gate: Notify::new(),
            reply: reply.into(),
            calls: Mutex::new(0),
        }
    }

    pub fn open(&self) {
        self.gate.notify_one();
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl AgentClient for GatedAgent {
    async fn send(&self, _request: &AgentRequest) -> Result<String, ApiError> {
        *self.calls.lock() += 1;
        self.gate.notified().await;
        Ok(self.reply.clone())
    }

    async fn check_status(&self) -> Result<bool, ApiError> {
        Ok(true)
    }
}

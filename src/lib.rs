//! Panelkit: agent-authored dashboard components
//!
//! Turns free-form agent replies into compiled, executable UI components,
//! retries once with a corrective prompt when compilation fails, and keeps the
//! resulting component sources and layout across sessions.

pub mod agent;
pub mod compiler;
pub mod component;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod extract;
pub mod layout;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;
pub mod storage;
pub mod tooling;
pub mod types;

//! Agent
//!
//! Everything on the agent side of the conversation: the call contract and its
//! HTTP gateway implementation, the conversation and transcript types, and the
//! fixed prompt text sent with every request.

pub mod client;
pub mod conversation;
pub mod gateway;
pub mod profile;
pub mod prompt;
pub mod scripted;

pub use client::{AgentClient, AgentRequest};
pub use conversation::{Conversation, EntryKind, Role, Transcript, TranscriptEntry, Turn};
pub use gateway::GatewayClient;
pub use profile::{GatewayConfig, ModelOption};
pub use prompt::{corrective_prompt, system_preamble, ComponentSummary, THEME_VARIABLES};
pub use scripted::ScriptedAgent;

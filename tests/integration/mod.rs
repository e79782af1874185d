//! End-to-end tests across the pipeline, orchestrator, registry and layout.

mod orchestrator_flow;
mod pipeline_scenarios;
mod registry_bootstrap;
mod support;

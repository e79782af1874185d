//! Definition Pipeline
//!
//! Extractor and compiler behind one call. Both the first agent reply and the
//! corrective reply go through [`DefinitionPipeline::compile`].

use crate::compiler::{CompiledComponent, Compiler};
use crate::component::{ComponentDefinition, ProposedDefinition};
use crate::extract::extract_definition;
use std::fmt;
use tracing::{debug, info};

/// Why a pipeline run produced no component.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The text held neither a metadata block nor a source block.
    NoDefinition,
    /// Metadata was found but no source accompanied it.
    MissingSource,
    /// Source was found and failed to compile; the payload is the diagnostic.
    Compile(String),
}

impl FailureReason {
    /// Only genuine compile errors are eligible for a corrective round-trip.
    pub fn is_compile_error(&self) -> bool {
        matches!(self, FailureReason::Compile(_))
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NoDefinition => f.write_str("No component definition found in response"),
            FailureReason::MissingSource => f.write_str("Component definition has no source"),
            FailureReason::Compile(diagnostic) => write!(f, "Compilation failed: {}", diagnostic),
        }
    }
}

#[derive(Debug)]
pub enum CompileOutcome {
    Success {
        definition: ComponentDefinition,
        component: CompiledComponent,
    },
    Failure {
        reason: FailureReason,
        /// Present only for [`FailureReason::Compile`].
        proposed: Option<ProposedDefinition>,
    },
}

impl CompileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CompileOutcome::Success { .. })
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            CompileOutcome::Failure { reason, .. } => Some(reason),
            CompileOutcome::Success { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DefinitionPipeline {
    compiler: Compiler,
}

impl DefinitionPipeline {
    pub fn new(compiler: Compiler) -> Self {
        Self { compiler }
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Text in, outcome out. Never panics on agent input.
    pub fn compile(&self, text: &str) -> CompileOutcome {
        let Some(proposed) = extract_definition(text) else {
            debug!("no component blocks in agent text");
            return CompileOutcome::Failure {
                reason: FailureReason::NoDefinition,
                proposed: None,
            };
        };
        let Some(source) = proposed.source.as_deref() else {
            debug!(id = %proposed.id, "definition arrived without source");
            return CompileOutcome::Failure {
                reason: FailureReason::MissingSource,
                proposed: None,
            };
        };

        match self.compiler.compile(source) {
            Ok(component) => match proposed.into_definition() {
                Some(definition) => {
                    info!(id = %definition.id, name = %definition.name, "component compiled");
                    CompileOutcome::Success {
                        definition,
                        component,
                    }
                }
                None => CompileOutcome::Failure {
                    reason: FailureReason::MissingSource,
                    proposed: None,
                },
            },
            Err(err) => {
                info!(id = %proposed.id, error = %err, "component failed to compile");
                CompileOutcome::Failure {
                    reason: FailureReason::Compile(err.to_string()),
                    proposed: Some(proposed),
                }
            }
        }
    }
}

/// Run text through a default pipeline.
pub fn compile_definition(text: &str) -> CompileOutcome {
    DefinitionPipeline::default().compile(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Origin;

    const METADATA: &str = r#"```json
{"widget": {"id": "counter", "name": "Counter", "defaultSize": {"w": 3, "h": 2},
 "configSchema": {"step": {"type": "string", "default": "1"}}}}
```"#;

    #[test]
    fn success_carries_definition_with_defaults() {
        let text = format!(
            "Here you go.\n{}\n```jsx\nfunction Widget() {{ return <div>ok</div> }}\n```",
            METADATA
        );
        match compile_definition(&text) {
            CompileOutcome::Success {
                definition,
                component,
            } => {
                assert_eq!(definition.id, "counter");
                assert_eq!(definition.origin, Origin::Custom);
                assert_eq!(definition.icon, "🧩");
                assert!(definition.source.contains("function Widget"));
                assert!(component.instantiate().hook_count() == 0);
            }
            other => panic!("expected success, got {:?}", other.failure_reason()),
        }
    }

    #[test]
    fn failure_reasons() {
        let outcome = compile_definition("Sure! What should it show?");
        assert_eq!(outcome.failure_reason(), Some(&FailureReason::NoDefinition));

        let outcome = compile_definition(METADATA);
        assert_eq!(outcome.failure_reason(), Some(&FailureReason::MissingSource));
        assert_eq!(
            outcome.failure_reason().map(ToString::to_string).as_deref(),
            Some("Component definition has no source")
        );

        let text = "```jsx\nfunction Widget() { return <div>oops</span> }\n```";
        match compile_definition(text) {
            CompileOutcome::Failure {
                reason: FailureReason::Compile(diagnostic),
                proposed: Some(proposed),
            } => {
                assert!(diagnostic.starts_with("SyntaxError"));
                assert!(proposed.has_source());
            }
            other => panic!("expected compile failure, got {:?}", other),
        }
    }

    #[test]
    fn compile_reason_is_prefixed() {
        let reason = FailureReason::Compile("SyntaxError: x (line 1, column 2)".into());
        assert_eq!(
            reason.to_string(),
            "Compilation failed: SyntaxError: x (line 1, column 2)"
        );
        assert!(reason.is_compile_error());
        assert!(!FailureReason::MissingSource.is_compile_error());
    }
}

//! Component Compiler
//!
//! Turns one component source string into a [`CompiledComponent`]: the source
//! is normalized, parsed (JSX is lowered to `React.createElement` calls while
//! parsing) and its top-level statements are evaluated in a fresh module scope
//! whose only parent is a fresh capability scope. The entry point `Widget` is
//! then read back and checked.
//!
//! Nothing is cached. Every compile parses and evaluates anew, so two compiles
//! of the same source yield independent, behaviorally identical factories.

pub mod ast;
pub mod capabilities;
pub mod error;
pub mod hooks;
pub mod instance;
pub mod interpreter;
pub mod intrinsics;
pub mod lexer;
pub mod methods;
pub mod parser;
pub mod scope;
pub mod transform;
pub mod tree;
pub mod value;

pub use error::{CompileError, RuntimeError};
pub use instance::{ComponentInstance, RenderProps};
pub use tree::{ElementNode, Node};
pub use value::Value;

use interpreter::{Interpreter, Interrupt};
use scope::Scope;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Name of the function every component must define.
pub const ENTRY_POINT: &str = "Widget";

/// Remaining stack below which recursive parsing and evaluation move to a
/// freshly allocated segment.
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024;
pub(crate) const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Execution limits applied to compile-time evaluation and to every render,
/// effect pass and handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Statements, loop iterations and calls allowed per entry into authored code.
    pub step_budget: u64,
    pub max_call_depth: usize,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            step_budget: 1_000_000,
            max_call_depth: 128,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Compiler {
    settings: CompilerSettings,
}

impl Compiler {
    pub fn new(settings: CompilerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    pub fn compile(&self, source: &str) -> Result<CompiledComponent, CompileError> {
        let normalized = transform::normalize_source(source);
        if normalized.trim().is_empty() {
            return Err(CompileError::EmptySource);
        }
        let program = parser::parse_program(&normalized).inspect_err(|err| {
            debug!(error = %err, "component source failed to parse");
        })?;

        let globals = Scope::root();
        intrinsics::install(&globals);
        capabilities::install(&globals);
        let module = Scope::child(&globals, true);

        let mut interp = Interpreter::new(&self.settings);
        interp
            .run_program(&program, &module)
            .map_err(|interrupt| CompileError::Evaluation(interrupt.into_runtime_error()))?;

        let entry = match module.lookup(ENTRY_POINT) {
            Some(entry) if entry.is_function() => entry,
            _ => {
                warn!("compiled source does not define a callable {}", ENTRY_POINT);
                return Err(CompileError::MissingEntryPoint);
            }
        };
        debug!(
            bytes = normalized.len(),
            statements = program.body.len(),
            steps = interp.steps(),
            "component compiled"
        );
        Ok(CompiledComponent {
            entry,
            settings: self.settings.clone(),
        })
    }
}

/// Compile with default settings.
pub fn compile(source: &str) -> Result<CompiledComponent, CompileError> {
    Compiler::default().compile(source)
}

/// Executable factory for one component. Never serialized and not `Send`.
pub struct CompiledComponent {
    entry: Value,
    settings: CompilerSettings,
}

impl CompiledComponent {
    /// A fresh instance with its own hook state.
    pub fn instantiate(&self) -> ComponentInstance {
        ComponentInstance::new(self.entry.clone(), self.settings.clone())
    }

    /// Render a throwaway instance once (effects included) and unmount it.
    pub fn render_once(&self, props: &RenderProps) -> Result<Node, RuntimeError> {
        let mut instance = self.instantiate();
        let node = instance.render(props)?;
        instance.unmount()?;
        Ok(node)
    }
}

impl fmt::Debug for CompiledComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledComponent")
            .field("entry", &self.entry)
            .field("settings", &self.settings)
            .finish()
    }
}

impl From<Interrupt> for RuntimeError {
    fn from(interrupt: Interrupt) -> Self {
        interrupt.into_runtime_error()
    }
}

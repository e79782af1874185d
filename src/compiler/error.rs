//! Compiler and runtime diagnostics.
//!
//! Every failure renders as a single line; nothing here carries a host
//! backtrace.

use thiserror::Error;

/// Why a source string could not be turned into a component factory.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("source is empty")]
    EmptySource,

    #[error("SyntaxError: {message} (line {line}, column {column})")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    /// Top-level statements threw while the module was evaluated.
    #[error("{0}")]
    Evaluation(RuntimeError),

    #[error("entry point `Widget` not found or not callable")]
    MissingEntryPoint,
}

impl CompileError {
    pub(crate) fn syntax(src: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = line_column(src, offset);
        CompileError::Syntax {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Failures while executing authored code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// A value was thrown and never caught. The payload is its display form,
    /// e.g. `ReferenceError: window is not defined`.
    #[error("{0}")]
    Uncaught(String),

    #[error("RangeError: execution step budget of {0} exceeded")]
    StepBudgetExceeded(u64),

    #[error("RangeError: maximum call depth of {0} exceeded")]
    CallDepthExceeded(usize),

    #[error("Error: {0} can only be called while a component is rendering")]
    HookOutsideRender(&'static str),

    #[error("Error: hook order changed between renders at hook #{index} ({detail})")]
    HookOrderChanged { index: usize, detail: String },

    #[error("Error: component rendered an invalid value: {0}")]
    InvalidRender(String),

    #[error("Error: component instance has been unmounted")]
    Unmounted,
}

/// One-based line and column of a byte offset.
pub(crate) fn line_column(src: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(src.len());
    let before = &src[..floor_char_boundary(src, offset)];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

fn floor_char_boundary(src: &str, mut offset: usize) -> usize {
    while offset > 0 && !src.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_reports_position() {
        let src = "const a = 1;\nconst b = ;";
        let err = CompileError::syntax(src, 23, "Unexpected token ';'");
        assert_eq!(
            err.to_string(),
            "SyntaxError: Unexpected token ';' (line 2, column 11)"
        );
    }

    #[test]
    fn entry_point_message_is_fixed() {
        assert_eq!(
            CompileError::MissingEntryPoint.to_string(),
            "entry point `Widget` not found or not callable"
        );
    }
}

//! Fixed prompt text: the system preamble sent with every request and the
//! corrective turn sent after a compile failure.

use crate::compiler::ENTRY_POINT;
use std::fmt::Write;

/// Names bound in a component's evaluation scope, besides language intrinsics.
pub const CAPABILITIES: [&str; 8] = [
    "React.createElement",
    "React.Fragment",
    "h",
    "useState",
    "useEffect",
    "useRef",
    "useCallback",
    "useMemo",
];

/// CSS variables the dashboard theme defines.
pub const THEME_VARIABLES: [&str; 12] = [
    "--bg-secondary",
    "--bg-card",
    "--bg-card-hover",
    "--text-primary",
    "--text-secondary",
    "--text-muted",
    "--border-color",
    "--accent",
    "--accent-dim",
    "--success",
    "--warning",
    "--danger",
];

/// Id and display name of a registered component, listed in the preamble so
/// the agent can avoid clashes or update an existing component on purpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSummary {
    pub id: String,
    pub name: String,
    pub builtin: bool,
}

fn contract_lines(out: &mut String) {
    let _ = writeln!(
        out,
        "- Define exactly one function named `{}` taking a single props object \
         `{{ config, onConfigChange, size }}` and returning JSX.",
        ENTRY_POINT
    );
    let _ = writeln!(
        out,
        "- No import or require statements. Only these are in scope: {}, plus \
         Math, JSON, Object, Array, String, Number, Boolean, parseInt, parseFloat, \
         isNaN, isFinite and console.",
        CAPABILITIES.join(", ")
    );
    let _ = writeln!(
        out,
        "- There is no window, document, fetch, Date or timers. Keep state in useState."
    );
}

/// The system preamble: contract, response shape and theme names.
pub fn system_preamble(existing: &[ComponentSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "You build dashboard widgets. Reply with one ```json metadata block and one \
         ```jsx source block."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Metadata shape:");
    let _ = writeln!(
        out,
        "{{\"widget\": {{\"id\": \"kebab-case-id\", \"name\": \"...\", \"description\": \"...\", \
         \"icon\": \"<emoji>\", \"category\": \"general\", \"defaultSize\": {{\"w\": 4, \"h\": 3}}, \
         \"minSize\": {{\"w\": 2, \"h\": 2}}, \"configSchema\": {{\"key\": {{\"type\": \
         \"string|boolean|text|json\", \"default\": \"\", \"label\": \"...\"}}}}}}}}"
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Source rules:");
    contract_lines(&mut out);
    let _ = writeln!(
        out,
        "- Style with inline styles using only these theme variables: {}.",
        THEME_VARIABLES.map(|v| format!("var({})", v)).join(", ")
    );

    if !existing.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Existing components (reuse an id only to replace a custom component; builtin ids are reserved):"
        );
        for summary in existing {
            let marker = if summary.builtin { " [builtin]" } else { "" };
            let _ = writeln!(out, "- {} ({}){}", summary.id, summary.name, marker);
        }
    }
    out
}

/// The single corrective turn: the literal diagnostic plus the contract.
pub fn corrective_prompt(diagnostic: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "The component you sent failed to compile:");
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", diagnostic);
    let _ = writeln!(out);
    let _ = writeln!(out, "Fix it while keeping to the contract:");
    contract_lines(&mut out);
    let _ = writeln!(out);
    let _ = write!(
        out,
        "Reply with only the corrected ```json metadata block and ```jsx source block, no other text."
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_lists_contract_and_components() {
        let existing = vec![
            ComponentSummary {
                id: "clock".into(),
                name: "Clock".into(),
                builtin: true,
            },
            ComponentSummary {
                id: "stocks".into(),
                name: "Stocks".into(),
                builtin: false,
            },
        ];
        let preamble = system_preamble(&existing);
        assert!(preamble.contains("function named `Widget`"));
        assert!(preamble.contains("useCallback"));
        assert!(preamble.contains("var(--accent-dim)"));
        assert!(preamble.contains("- clock (Clock) [builtin]"));
        assert!(preamble.contains("- stocks (Stocks)\n"));
        assert!(!system_preamble(&[]).contains("Existing components"));
    }

    #[test]
    fn corrective_prompt_embeds_the_literal_diagnostic() {
        let diagnostic = "Compilation failed: ReferenceError: useStat is not defined";
        let prompt = corrective_prompt(diagnostic);
        assert!(prompt.contains(diagnostic));
        assert!(prompt.contains("No import"));
        assert!(prompt.contains("useState"));
        assert!(prompt.ends_with("no other text."));
    }
}

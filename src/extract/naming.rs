//! Entry-point detection and display-name inference from surrounding prose.

use crate::compiler::ENTRY_POINT;
use regex::Regex;
use std::sync::OnceLock;

const MAX_NAME_CHARS: usize = 48;

fn entry_point_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let name = regex::escape(ENTRY_POINT);
        Regex::new(&format!(
            r"\bfunction\s+{name}\b|\b(?:const|let|var)\s+{name}\s*=|\b{name}\s*\("
        ))
        .expect("entry point pattern is valid")
    })
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:create|build|make|here's|here is).*?(?:\ba |\ban |\bthe )(.+?)(?:widget|component)")
            .expect("name pattern is valid")
    })
}

/// True when the text declares (or calls) the entry-point symbol.
pub fn declares_entry_point(source: &str) -> bool {
    entry_point_pattern().is_match(source)
}

/// Best-effort display name from phrases like "Here's a pomodoro timer widget".
pub fn infer_display_name(prose: &str) -> Option<String> {
    let captured = name_pattern().captures(prose)?.get(1)?.as_str();
    let words: Vec<&str> = captured.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    let joined: String = words.join(" ").chars().take(MAX_NAME_CHARS).collect();
    let joined = joined.trim_end_matches(|c: char| !c.is_alphanumeric());
    let mut chars = joined.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_entry_point_forms() {
        assert!(declares_entry_point("function Widget({ config }) {}"));
        assert!(declares_entry_point("const Widget = ({ size }) => null"));
        assert!(declares_entry_point("export default Widget(props)"));
        assert!(!declares_entry_point("function Widgets() {}"));
        assert!(!declares_entry_point("function MyWidget() {}"));
    }

    #[test]
    fn infers_name_from_prose() {
        assert_eq!(
            infer_display_name("Sure! Here's a pomodoro timer widget for you."),
            Some("Pomodoro timer".to_string())
        );
        assert_eq!(
            infer_display_name("I'll build the stock ticker component now"),
            Some("Stock ticker".to_string())
        );
        assert_eq!(infer_display_name("Done."), None);
    }
}

//! Source normalization and JSX lowering.

use super::ast::{Arg, Expr, MemberProp, Name, ObjectProp, PropKey};
use super::ENTRY_POINT;
use regex::Regex;
use std::sync::OnceLock;

const DECLARATION_STARTS: &[&str] = &[
    "function", "const", "let", "var", "export", "import", "class", "async", "//", "/*", "'use",
    "\"use",
];

fn export_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^([ \t]*)export[ \t]+(?:default[ \t]+)?").expect("export pattern is valid")
    })
}

/// Trim, drop any leading chatter before the entry-point function, and strip
/// top-level `export default` / `export` markers.
pub fn normalize_source(source: &str) -> String {
    let mut text = source.trim();
    if !DECLARATION_STARTS.iter().any(|start| text.starts_with(start)) {
        let marker = format!("function {}", ENTRY_POINT);
        if let Some(at) = text.find(&marker) {
            text = &text[at..];
        }
    }
    export_marker().replace_all(text, "$1").into_owned()
}

/// JSX element as parsed, before lowering.
#[derive(Debug, Clone)]
pub struct JsxElement {
    /// `None` for a fragment (`<>...</>`).
    pub name: Option<String>,
    pub attrs: Vec<JsxAttr>,
    pub children: Vec<JsxChild>,
}

#[derive(Debug, Clone)]
pub enum JsxAttr {
    Named(String, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum JsxChild {
    Text(String),
    Expr(Expr),
    Spread(Expr),
    Element(JsxElement),
}

fn react_member(name: &str) -> Expr {
    Expr::Member {
        object: Box::new(Expr::Ident("React".into())),
        property: MemberProp::Named(name.into()),
        optional: false,
    }
}

/// Intrinsic tags are lowercase or contain a dash; anything else names a
/// binding (possibly dotted, like `UI.Row`).
fn element_type(name: &str) -> Expr {
    let intrinsic = name.starts_with(|c: char| c.is_ascii_lowercase()) || name.contains('-');
    if intrinsic {
        return Expr::Str(name.into());
    }
    let mut parts = name.split('.');
    let head: Name = parts.next().unwrap_or(name).into();
    parts.fold(Expr::Ident(head), |object, part| Expr::Member {
        object: Box::new(object),
        property: MemberProp::Named(part.into()),
        optional: false,
    })
}

/// Lower an element to `React.createElement(type, props, ...children)`.
pub fn lower_element(element: JsxElement) -> Expr {
    let element_type = match &element.name {
        Some(name) => element_type(name),
        None => react_member("Fragment"),
    };

    let props = if element.attrs.is_empty() {
        Expr::Null
    } else {
        Expr::Object(
            element
                .attrs
                .into_iter()
                .map(|attr| match attr {
                    JsxAttr::Named(key, value) => {
                        ObjectProp::KeyValue(PropKey::Named(key.into()), value)
                    }
                    JsxAttr::Spread(expr) => ObjectProp::Spread(expr),
                })
                .collect(),
        )
    };

    let mut args = vec![Arg::Item(element_type), Arg::Item(props)];
    for child in element.children {
        args.push(match child {
            JsxChild::Text(text) => Arg::Item(Expr::Str(text.into())),
            JsxChild::Expr(expr) => Arg::Item(expr),
            JsxChild::Spread(expr) => Arg::Spread(expr),
            JsxChild::Element(inner) => Arg::Item(lower_element(inner)),
        });
    }

    Expr::Call {
        callee: Box::new(react_member("createElement")),
        args,
        optional: false,
    }
}

/// Collapse JSX text whitespace: lines are trimmed, blank lines dropped, the
/// rest joined with single spaces. Whitespace within a line is kept.
pub fn jsx_text(raw: &str) -> Option<String> {
    let lines: Vec<&str> = raw.split('\n').collect();
    let last = lines.len() - 1;
    let mut parts = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let line = line.trim_end_matches('\r');
        let mut piece = line;
        if i != 0 {
            piece = piece.trim_start();
        }
        if i != last {
            piece = piece.trim_end();
        }
        if !piece.is_empty() {
            parts.push(piece);
        }
    }
    if parts.is_empty() {
        return None;
    }
    let joined = parts.join(" ");
    if lines.len() > 1 && joined.trim().is_empty() {
        return None;
    }
    Some(super::lexer::decode_entities(&joined))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_exports_and_leading_chatter() {
        assert_eq!(
            normalize_source("  export default function Widget() {}\n"),
            "function Widget() {}"
        );
        assert_eq!(
            normalize_source("Here is the code:\nfunction Widget() { return null }"),
            "function Widget() { return null }"
        );
        assert_eq!(
            normalize_source("const A = 1;\nexport const B = 2;\nexport default Widget;"),
            "const A = 1;\nconst B = 2;\nWidget;"
        );
    }

    #[test]
    fn jsx_text_whitespace_rules() {
        assert_eq!(jsx_text("\n    Hello\n    world  \n  "), Some("Hello world".into()));
        assert_eq!(jsx_text(" Count: "), Some(" Count: ".into()));
        assert_eq!(jsx_text("\n   \n  "), None);
        assert_eq!(jsx_text("a &amp; b"), Some("a & b".into()));
    }

    #[test]
    fn component_names_become_references() {
        assert!(matches!(element_type("div"), Expr::Str(_)));
        assert!(matches!(element_type("my-el"), Expr::Str(_)));
        assert!(matches!(element_type("Row"), Expr::Ident(_)));
        assert!(matches!(element_type("UI.Row"), Expr::Member { .. }));
    }
}

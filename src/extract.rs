//! Definition Extractor
//!
//! Scans free-form agent text for a metadata block and component source blocks,
//! picks the best candidate of each and merges them into one
//! [`ProposedDefinition`]. Tolerates replies that carry only code, only
//! metadata with embedded code, or noisy prose around either.

pub mod fence;
pub mod naming;

use crate::component::ProposedDefinition;
use fence::{classify_block, fenced_blocks, prose, BlockKind, FencedBlock};
use naming::{declares_entry_point, infer_display_name};
use serde_json::{Map, Value};
use tracing::debug;

/// Keys under which agents nest the definition object.
pub const WRAPPER_KEYS: [&str; 2] = ["widget", "component"];

/// True when `text` carries at least one component source block, i.e. looks
/// like pasted source rather than a request.
pub fn contains_source_fence(text: &str) -> bool {
    fenced_blocks(text)
        .iter()
        .any(|block| classify_block(block) == BlockKind::Source)
}

/// Extract a proposed definition, or `None` when the text holds neither a
/// metadata block nor a source block.
pub fn extract_definition(text: &str) -> Option<ProposedDefinition> {
    let blocks = fenced_blocks(text);
    let mut metadata_blocks = Vec::new();
    let mut source_blocks = Vec::new();
    for block in &blocks {
        match classify_block(block) {
            BlockKind::Metadata => metadata_blocks.push(block),
            BlockKind::Source => source_blocks.push(block),
            BlockKind::Other => {}
        }
    }
    debug!(
        blocks = blocks.len(),
        metadata = metadata_blocks.len(),
        source = source_blocks.len(),
        "Scanned agent text for component blocks"
    );

    let metadata = select_metadata(&metadata_blocks);
    let source = select_source(&source_blocks).map(|b| b.content.trim().to_string());

    match (metadata, source) {
        (Some(object), source) => {
            let mut proposed = ProposedDefinition::from_metadata(&object);
            if !proposed.has_source() {
                proposed.source = source;
                proposed.normalize();
            }
            Some(proposed)
        }
        (None, Some(source)) => {
            let name = infer_display_name(&prose(text, &blocks));
            Some(ProposedDefinition::synthesized(source, name))
        }
        (None, None) => None,
    }
}

/// First block that parses to a definition-shaped object.
fn select_metadata(blocks: &[&FencedBlock]) -> Option<Map<String, Value>> {
    for block in blocks {
        let parsed: Value = match serde_json::from_str(block.content.trim()) {
            Ok(value) => value,
            Err(e) => {
                debug!("Skipping metadata block that is not valid JSON: {}", e);
                continue;
            }
        };
        let Value::Object(object) = parsed else {
            continue;
        };
        for key in WRAPPER_KEYS {
            if let Some(Value::Object(inner)) = object.get(key) {
                return Some(inner.clone());
            }
        }
        if object.contains_key("id") && object.contains_key("name") {
            return Some(object);
        }
    }
    None
}

/// First block declaring the entry point, else the last source block.
fn select_source<'a>(blocks: &[&'a FencedBlock]) -> Option<&'a FencedBlock> {
    blocks
        .iter()
        .find(|b| declares_entry_point(&b.content))
        .or_else(|| blocks.last())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::definition::{DEFAULT_CATEGORY, DEFAULT_ICON, DEFAULT_NAME};
    use proptest::prelude::*;

    const META: &str = "```json\n{\"widget\": {\"id\": \"clock2\", \"name\": \"Clock 2\"}}\n```";
    const CODE: &str = "```jsx\nfunction Widget({ config }) {\n  return <div>Hi</div>\n}\n```";

    #[test]
    fn source_fence_detection() {
        assert!(contains_source_fence(CODE));
        assert!(!contains_source_fence(META));
        assert!(!contains_source_fence("make me a clock widget"));
    }

    #[test]
    fn metadata_and_source_in_either_order() {
        for text in [
            format!("Here it is\n{}\n\n{}\n", META, CODE),
            format!("{}\nsome words\n{}", CODE, META),
        ] {
            let proposed = extract_definition(&text).unwrap();
            assert_eq!(proposed.id, "clock2");
            assert_eq!(proposed.name, "Clock 2");
            assert!(proposed.source.as_deref().unwrap().starts_with("function Widget"));
        }
    }

    #[test]
    fn source_only_synthesizes_metadata() {
        let text = format!("Here's a focus timer widget:\n{}", CODE);
        let proposed = extract_definition(&text).unwrap();
        assert!(proposed.id.starts_with("custom-"));
        assert_eq!(proposed.name, "Focus timer");
        assert_eq!(proposed.icon, DEFAULT_ICON);
        assert_eq!(proposed.category, DEFAULT_CATEGORY);

        let bare = extract_definition(CODE).unwrap();
        assert_eq!(bare.name, DEFAULT_NAME);
    }

    #[test]
    fn neither_block_yields_none() {
        assert!(extract_definition("Just chatting, no code here.").is_none());
        assert!(extract_definition("```bash\nls -la\n```").is_none());
    }

    #[test]
    fn metadata_without_identity_is_skipped() {
        let text = "```json\n[1, 2, 3]\n```\n```json\n{\"items\": 2}\n```\n```json\n{\"id\": \"real\", \"name\": \"Real\"}\n```\n```json\nnot json\n```";
        let proposed = extract_definition(text).unwrap();
        assert_eq!(proposed.id, "real");
        assert!(proposed.source.is_none());
    }

    #[test]
    fn prefers_block_declaring_entry_point() {
        let text = "```js\nconst helper = 1\n```\n```jsx\nfunction Widget() { return null }\n```\n```js\nconsole.log('usage')\n```";
        let proposed = extract_definition(text).unwrap();
        assert_eq!(
            proposed.source.as_deref(),
            Some("function Widget() { return null }")
        );
    }

    #[test]
    fn falls_back_to_last_source_block() {
        let text = "```js\nconst a = 1\n```\n```jsx\nfunction Panel() { return null }\n```";
        let proposed = extract_definition(text).unwrap();
        assert_eq!(
            proposed.source.as_deref(),
            Some("function Panel() { return null }")
        );
    }

    #[test]
    fn embedded_source_wins_over_separate_block() {
        let text = "```json\n{\"id\": \"e\", \"name\": \"E\", \"code\": \"function Widget(){ return 1 }\"}\n```\n```jsx\nfunction Widget(){ return 2 }\n```";
        let proposed = extract_definition(text).unwrap();
        assert_eq!(
            proposed.source.as_deref(),
            Some("function Widget(){ return 1 }")
        );
    }

    proptest! {
        #[test]
        fn prose_without_fences_never_yields_definition(text in "[^`]{0,200}") {
            prop_assert!(extract_definition(&text).is_none());
        }

        #[test]
        fn any_source_block_yields_id_and_source(
            before in "[a-zA-Z .,!]{0,60}",
            body in "[a-zA-Z0-9 (){};=]{1,80}",
        ) {
            let text = format!("{}\n```jsx\nfunction Widget() {{ {} }}\n```", before, body);
            let proposed = extract_definition(&text).unwrap();
            prop_assert!(!proposed.id.is_empty());
            prop_assert!(proposed.source.as_deref().unwrap().starts_with("function Widget"));
        }
    }
}

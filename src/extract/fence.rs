//! Fenced block scanning and classification.

use super::naming::declares_entry_point;
use std::ops::Range;

const FENCE: &str = "```";

/// One fenced block found in agent text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// Info-string tag right after the opening fence, if any.
    pub language: Option<String>,
    pub content: String,
    /// Byte range of the whole block, fences included.
    pub span: Range<usize>,
}

/// What a block is a candidate for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Metadata,
    Source,
    Other,
}

/// Find every fenced block, in order of appearance.
///
/// The tag may be followed by content on the same line (`` ```json {"id":1}``` ``).
/// An unterminated final block runs to the end of the text.
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(FENCE) {
        let open = cursor + found;
        let after_fence = open + FENCE.len();
        let tag_len = text[after_fence..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-' | '.')))
            .unwrap_or(text.len() - after_fence);
        let tag = &text[after_fence..after_fence + tag_len];

        let mut body_start = after_fence + tag_len;
        let line_end = text[body_start..]
            .find('\n')
            .map(|i| body_start + i)
            .unwrap_or(text.len());
        if text[body_start..line_end].trim().is_empty() {
            body_start = (line_end + 1).min(text.len());
        }

        let (body_end, block_end) = match text[body_start..].find(FENCE) {
            Some(close) => (body_start + close, body_start + close + FENCE.len()),
            None => (text.len(), text.len()),
        };

        let content = text[body_start..body_end]
            .trim_end_matches(|c| c == '\n' || c == '\r')
            .to_string();
        blocks.push(FencedBlock {
            language: if tag.is_empty() {
                None
            } else {
                Some(tag.to_string())
            },
            content,
            span: open..block_end,
        });
        cursor = block_end;
        if cursor >= text.len() {
            break;
        }
    }

    blocks
}

/// Classify a block by tag, falling back to its content when untagged.
pub fn classify_block(block: &FencedBlock) -> BlockKind {
    if let Some(lang) = block.language.as_deref() {
        return match lang.to_ascii_lowercase().as_str() {
            "json" | "jsonc" | "json5" => BlockKind::Metadata,
            "jsx" | "js" | "tsx" | "ts" | "javascript" | "typescript" | "react" => {
                BlockKind::Source
            }
            _ => BlockKind::Other,
        };
    }

    let trimmed = block.content.trim_start();
    if trimmed.starts_with('{') {
        return BlockKind::Metadata;
    }
    if declares_entry_point(&block.content) {
        return BlockKind::Source;
    }
    BlockKind::Other
}

/// The text outside every fenced block.
pub fn prose(text: &str, blocks: &[FencedBlock]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for block in blocks {
        if block.span.start > cursor {
            out.push_str(&text[cursor..block.span.start]);
            out.push('\n');
        }
        cursor = cursor.max(block.span.end);
    }
    if cursor < text.len() {
        out.push_str(&text[cursor..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_tagged_blocks_in_order() {
        let text = "Here you go:\n```json\n{\"id\": \"a\"}\n```\nand\n```jsx\nfunction Widget() {}\n```\n";
        let blocks = fenced_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].language.as_deref(), Some("json"));
        assert_eq!(blocks[0].content, "{\"id\": \"a\"}");
        assert_eq!(blocks[1].language.as_deref(), Some("jsx"));
        assert_eq!(blocks[1].content, "function Widget() {}");
        assert_eq!(classify_block(&blocks[0]), BlockKind::Metadata);
        assert_eq!(classify_block(&blocks[1]), BlockKind::Source);
    }

    #[test]
    fn inline_and_unterminated_blocks() {
        let text = "```json {\"id\":\"x\",\"name\":\"X\"}``` then\n```js\nconst Widget = () => null";
        let blocks = fenced_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].content.trim(), "{\"id\":\"x\",\"name\":\"X\"}");
        assert_eq!(blocks[1].content, "const Widget = () => null");
        assert_eq!(blocks[1].span.end, text.len());
    }

    #[test]
    fn untagged_blocks_classified_by_content() {
        let meta = FencedBlock {
            language: None,
            content: "{ \"id\": \"x\" }".into(),
            span: 0..0,
        };
        let code = FencedBlock {
            language: None,
            content: "function Widget() { return null }".into(),
            span: 0..0,
        };
        let shell = FencedBlock {
            language: Some("bash".into()),
            content: "npm install".into(),
            span: 0..0,
        };
        assert_eq!(classify_block(&meta), BlockKind::Metadata);
        assert_eq!(classify_block(&code), BlockKind::Source);
        assert_eq!(classify_block(&shell), BlockKind::Other);
    }

    #[test]
    fn prose_excludes_block_text() {
        let text = "Intro line\n```jsx\nsecret()\n```\nOutro";
        let blocks = fenced_blocks(text);
        let p = prose(text, &blocks);
        assert!(p.contains("Intro line"));
        assert!(p.contains("Outro"));
        assert!(!p.contains("secret"));
    }
}

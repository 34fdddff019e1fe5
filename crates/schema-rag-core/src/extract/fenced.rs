//! Fenced code block scanning.
//!
//! A fence opens with three backticks, optionally followed by a language
//! tag, and closes at the next three backticks. The body may start on the
//! opening line (```` ```json {"a":1}``` ````). A fence left open at the
//! end of the text runs to the end of the text.

use super::{accepts_json, Candidate, CodeBlock, Origin, SegmentKind, Strategy};

const FENCE: &str = "```";

/// A fenced region with its byte range in the source text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fence {
    pub start: usize,
    pub end: usize,
    pub language: String,
    pub body: String,
}

/// Scan `text` for fenced regions, in order of appearance.
///
/// Blocks with an empty body are skipped.
pub(crate) fn scan(text: &str) -> Vec<Fence> {
    let mut fences = Vec::new();
    let mut pos = 0;

    while let Some(rel) = text[pos..].find(FENCE) {
        let start = pos + rel;
        let after_open = start + FENCE.len();

        let tag_len = text[after_open..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-' | '.' | '#')))
            .unwrap_or(text.len() - after_open);
        let tag = &text[after_open..after_open + tag_len];
        let body_start = after_open + tag_len;

        let (body_end, end) = match text[body_start..].find(FENCE) {
            Some(rel_close) => (body_start + rel_close, body_start + rel_close + FENCE.len()),
            None => (text.len(), text.len()),
        };

        let body = text[body_start..body_end].trim();
        if !body.is_empty() {
            fences.push(Fence {
                start,
                end,
                language: if tag.is_empty() {
                    "unknown".to_string()
                } else {
                    tag.to_ascii_lowercase()
                },
                body: body.to_string(),
            });
        }
        pos = end;
    }

    fences
}

/// All fenced blocks in `text`, in order of appearance.
pub fn code_blocks(text: &str) -> Vec<CodeBlock> {
    scan(text)
        .into_iter()
        .map(|f| CodeBlock {
            language: f.language,
            code: f.body,
            offset: f.start,
        })
        .collect()
}

/// Picks the first fenced block whose tag belongs to the requested family.
///
/// JSON-family blocks that neither parse nor look like JSON are skipped as
/// false positives.
pub struct FencedStrategy;

impl Strategy for FencedStrategy {
    fn name(&self) -> &'static str {
        "fenced"
    }

    fn find(&self, text: &str, kind: SegmentKind) -> Option<Candidate> {
        scan(text)
            .into_iter()
            .filter(|f| kind.matches_language(&f.language))
            .find(|f| kind != SegmentKind::Json || accepts_json(&f.body))
            .map(|f| Candidate {
                language: f.language,
                body: f.body,
                offset: f.start,
                origin: Origin::Fenced,
            })
    }
}

//! Structured extraction from generated text.
//!
//! Model output mixes prose with machine-readable segments: a JSON schema
//! proposal and a block of SQL DDL. The [`Extractor`] pulls them out with an
//! ordered chain of [`Strategy`] implementations. For each segment kind the
//! first strategy that reports a hit provides the authoritative segment:
//!
//! | Priority | Strategy | Recognizes |
//! |----------|----------|------------|
//! | 1 | [`FencedStrategy`] | ```` ```json ```` / ```` ```sql ```` fenced blocks (and aliases) |
//! | 2 | [`MarkerStrategy`] | `# SCHEMA CHANGES` … `# END SCHEMA CHANGES` style sections |
//!
//! Supporting another format means appending a strategy with
//! [`Extractor::with_strategy`].
//!
//! Extraction never fails. A missing segment is `None` (and an empty string
//! in [`crate::models::AgentResponse`]); JSON that does not parse is kept
//! with [`JsonSegment::error`] set.

mod fenced;
mod marker;
mod sql;

use serde::Serialize;
use serde_json::Value;

pub use fenced::{code_blocks, FencedStrategy};
pub use marker::{MarkerPair, MarkerSet, MarkerStrategy};
pub use sql::SqlKind;

/// Fence tags treated as JSON.
pub const JSON_LANGUAGES: &[&str] = &["json", "javascript", "js"];
/// Fence tags treated as SQL.
pub const SQL_LANGUAGES: &[&str] = &["sql", "mysql", "postgresql", "postgres", "sqlite", "plsql"];

/// The kinds of segment the extractor looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Json,
    Sql,
}

impl SegmentKind {
    pub fn languages(&self) -> &'static [&'static str] {
        match self {
            SegmentKind::Json => JSON_LANGUAGES,
            SegmentKind::Sql => SQL_LANGUAGES,
        }
    }

    /// Whether a fence tag belongs to this kind's alias family.
    pub fn matches_language(&self, language: &str) -> bool {
        self.languages()
            .iter()
            .any(|l| l.eq_ignore_ascii_case(language))
    }

    fn canonical_language(&self) -> &'static str {
        self.languages()[0]
    }
}

/// Which strategy produced a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Fenced,
    Marker,
}

/// One fenced code block, whatever its language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
    /// Byte offset of the opening fence in the source text.
    pub offset: usize,
}

/// A JSON segment, parsed when possible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonSegment {
    pub language: String,
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub origin: Origin,
}

impl JsonSegment {
    fn from_candidate(c: Candidate) -> Self {
        let (parsed, error) = match serde_json::from_str::<Value>(&c.body) {
            Ok(v) => (Some(v), None),
            Err(e) => (None, Some(format!("invalid JSON syntax: {}", e))),
        };
        Self {
            language: c.language,
            raw: c.body,
            parsed,
            error,
            origin: c.origin,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// A SQL segment with its statement kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlSegment {
    pub language: String,
    pub code: String,
    pub kind: SqlKind,
    pub origin: Origin,
}

impl SqlSegment {
    fn from_candidate(c: Candidate) -> Self {
        Self {
            kind: SqlKind::classify(&c.body),
            language: c.language,
            code: c.body,
            origin: c.origin,
        }
    }
}

/// A typed segment, as yielded by [`ExtractedSegments::segments`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExtractedSegment {
    Json(JsonSegment),
    Sql(SqlSegment),
    Generic(CodeBlock),
}

/// Everything one extraction pass found.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedSegments {
    /// Authoritative JSON segment (first strategy hit).
    pub primary_json: Option<JsonSegment>,
    /// Authoritative SQL segment (first strategy hit).
    pub primary_sql: Option<SqlSegment>,
    /// Every fenced JSON-family block that was kept, in text order.
    pub json_blocks: Vec<JsonSegment>,
    /// Every fenced SQL-family block, in text order.
    pub sql_blocks: Vec<SqlSegment>,
    /// Every fenced block, in text order.
    pub all_blocks: Vec<CodeBlock>,
}

impl ExtractedSegments {
    /// Raw text of the primary JSON segment, or `""`.
    pub fn json_text(&self) -> &str {
        self.primary_json.as_ref().map(|s| s.raw.as_str()).unwrap_or("")
    }

    /// Text of the primary SQL segment, or `""`.
    pub fn sql_text(&self) -> &str {
        self.primary_sql.as_ref().map(|s| s.code.as_str()).unwrap_or("")
    }

    /// All fenced blocks as typed segments, in text order.
    ///
    /// JSON-family blocks rejected as false positives come back as
    /// [`ExtractedSegment::Generic`].
    pub fn segments(&self) -> Vec<ExtractedSegment> {
        self.all_blocks
            .iter()
            .map(|b| {
                if SegmentKind::Json.matches_language(&b.language) && accepts_json(&b.code) {
                    ExtractedSegment::Json(JsonSegment::from_candidate(Candidate::fenced(b)))
                } else if SegmentKind::Sql.matches_language(&b.language) {
                    ExtractedSegment::Sql(SqlSegment::from_candidate(Candidate::fenced(b)))
                } else {
                    ExtractedSegment::Generic(b.clone())
                }
            })
            .collect()
    }
}

/// A located segment body, before typing.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub language: String,
    pub body: String,
    pub offset: usize,
    pub origin: Origin,
}

impl Candidate {
    fn fenced(block: &CodeBlock) -> Self {
        Self {
            language: block.language.clone(),
            body: block.code.clone(),
            offset: block.offset,
            origin: Origin::Fenced,
        }
    }
}

/// One way of locating a segment in generated text.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// The first segment of `kind` this strategy recognizes, if any.
    fn find(&self, text: &str, kind: SegmentKind) -> Option<Candidate>;
}

/// Ordered chain of extraction strategies.
pub struct Extractor {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(MarkerSet::default())
    }
}

impl Extractor {
    /// Fenced blocks first, then the given section markers.
    pub fn new(markers: MarkerSet) -> Self {
        Self {
            strategies: vec![
                Box::new(FencedStrategy),
                Box::new(MarkerStrategy::new(markers)),
            ],
        }
    }

    /// Append a lower-priority strategy.
    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// First hit for `kind`, trying strategies in priority order.
    pub fn locate(&self, text: &str, kind: SegmentKind) -> Option<Candidate> {
        self.strategies.iter().find_map(|s| s.find(text, kind))
    }

    pub fn extract(&self, text: &str) -> ExtractedSegments {
        let all_blocks = code_blocks(text);

        let json_blocks = all_blocks
            .iter()
            .filter(|b| SegmentKind::Json.matches_language(&b.language))
            .filter(|b| accepts_json(&b.code))
            .map(|b| JsonSegment::from_candidate(Candidate::fenced(b)))
            .collect();
        let sql_blocks = all_blocks
            .iter()
            .filter(|b| SegmentKind::Sql.matches_language(&b.language))
            .map(|b| SqlSegment::from_candidate(Candidate::fenced(b)))
            .collect();

        ExtractedSegments {
            primary_json: self
                .locate(text, SegmentKind::Json)
                .map(JsonSegment::from_candidate),
            primary_sql: self
                .locate(text, SegmentKind::Sql)
                .map(SqlSegment::from_candidate),
            json_blocks,
            sql_blocks,
            all_blocks,
        }
    }
}

/// Whether a JSON-tagged body is kept: it parses, or it opens like an
/// object or array (so a parse failure is worth reporting).
pub(crate) fn accepts_json(body: &str) -> bool {
    serde_json::from_str::<Value>(body).is_ok() || looks_like_json(body)
}

/// Opening bracket only. A truncated or malformed body such as `{bad json`
/// has no matching close but must still surface as a JSON segment with a
/// parse error, so the closing bracket is not required.
fn looks_like_json(body: &str) -> bool {
    let body = body.trim_start();
    body.starts_with('{') || body.starts_with('[')
}

/// Remove fence markers (and their language tags) from text.
///
/// Used for conversational answers, where fences are only formatting noise.
pub fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find("```") {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 3..];
        let tag_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-')))
            .unwrap_or(after.len());
        rest = &after[tag_len..];
    }
    out.push_str(rest);
    out
}

/// Inline code spans (`` `like this` ``) outside fenced blocks.
pub fn extract_inline_code(text: &str) -> Vec<String> {
    let mut outside = String::with_capacity(text.len());
    let mut last = 0;
    for fence in fenced::scan(text) {
        outside.push_str(&text[last..fence.start]);
        outside.push('\n');
        last = fence.end;
    }
    outside.push_str(&text[last..]);

    outside
        .split('`')
        .enumerate()
        .filter(|(i, _)| i % 2 == 1)
        .map(|(_, span)| span)
        .filter(|span| !span.is_empty() && !span.contains('\n'))
        .map(str::to_string)
        .collect()
}

/// Keep only blocks whose language is in `languages` (case-insensitive).
pub fn filter_by_language(blocks: &[CodeBlock], languages: &[&str]) -> Vec<CodeBlock> {
    blocks
        .iter()
        .filter(|b| languages.iter().any(|l| l.eq_ignore_ascii_case(&b.language)))
        .cloned()
        .collect()
}

/// Re-indent a JSON string with two spaces.
pub fn pretty_json(raw: &str) -> serde_json::Result<String> {
    let value: Value = serde_json::from_str(raw)?;
    serde_json::to_string_pretty(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_well_formed_json_block() {
        let seg = Extractor::default().extract("```json\n{\"a\":1}\n```");
        assert_eq!(seg.json_blocks.len(), 1);
        let primary = seg.primary_json.unwrap();
        assert_eq!(primary.parsed, Some(json!({"a": 1})));
        assert!(primary.error.is_none());
        assert_eq!(primary.origin, Origin::Fenced);
    }

    #[test]
    fn test_malformed_json_is_kept_with_error() {
        let seg = Extractor::default().extract("```json\n{bad json\n```");
        assert_eq!(seg.json_blocks.len(), 1);
        let primary = seg.primary_json.unwrap();
        assert_eq!(primary.raw, "{bad json");
        assert!(primary.parsed.is_none());
        assert!(primary.error.unwrap().starts_with("invalid JSON syntax"));
    }

    #[test]
    fn test_no_sql_block_is_empty() {
        let seg = Extractor::default().extract("Just prose, no code.");
        assert!(seg.primary_sql.is_none());
        assert_eq!(seg.sql_text(), "");
        assert_eq!(seg.json_text(), "");
        assert!(seg.all_blocks.is_empty());
    }

    #[test]
    fn test_first_block_wins() {
        let text = "```sql\nCREATE TABLE a (id int);\n```\nand\n```mysql\nDROP TABLE b;\n```";
        let seg = Extractor::default().extract(text);
        assert_eq!(seg.sql_text(), "CREATE TABLE a (id int);");
        assert_eq!(seg.primary_sql.as_ref().unwrap().kind, SqlKind::Create);
        assert_eq!(seg.sql_blocks.len(), 2);
        assert_eq!(seg.sql_blocks[1].kind, SqlKind::Drop);
    }

    #[test]
    fn test_fenced_takes_precedence_over_markers() {
        let text = "# SCHEMA DDL\nDROP TABLE marker_version;\n# END SCHEMA DDL\n\n```sql\nCREATE TABLE fenced_version (id int);\n```";
        let seg = Extractor::default().extract(text);
        let sql = seg.primary_sql.unwrap();
        assert_eq!(sql.code, "CREATE TABLE fenced_version (id int);");
        assert_eq!(sql.origin, Origin::Fenced);
    }

    #[test]
    fn test_markers_used_without_fences() {
        let text = "Plan below.\n# SCHEMA CHANGES\n{\"TABLES\": {\"members\": {}}}\n# END SCHEMA CHANGES\n# SCHEMA DDL\nCREATE TABLE members (id serial primary key);\n";
        let seg = Extractor::default().extract(text);
        let json = seg.primary_json.unwrap();
        assert_eq!(json.origin, Origin::Marker);
        assert_eq!(json.parsed, Some(json!({"TABLES": {"members": {}}})));
        let sql = seg.primary_sql.unwrap();
        assert_eq!(sql.origin, Origin::Marker);
        assert_eq!(sql.kind, SqlKind::Create);
        assert!(seg.all_blocks.is_empty());
    }

    #[test]
    fn test_marker_json_that_fails_to_parse_is_flagged() {
        let text = "# SCHEMA CHANGES\nTABLES: members\n# END SCHEMA CHANGES";
        let json = Extractor::default().extract(text).primary_json.unwrap();
        assert_eq!(json.raw, "TABLES: members");
        assert!(!json.is_valid());
    }

    #[test]
    fn test_false_positive_javascript_dropped() {
        let seg = Extractor::default().extract("```javascript\nconst x = 1;\n```");
        assert!(seg.json_blocks.is_empty());
        assert!(seg.primary_json.is_none());
        assert_eq!(seg.all_blocks.len(), 1);
        assert!(matches!(seg.segments()[0], ExtractedSegment::Generic(_)));
    }

    #[test]
    fn test_segments_in_text_order() {
        let text = "```sql\nSELECT 1;\n```\n```rust\nfn main() {}\n```\n```json\n[1]\n```";
        let kinds: Vec<&str> = Extractor::default()
            .extract(text)
            .segments()
            .iter()
            .map(|s| match s {
                ExtractedSegment::Json(_) => "json",
                ExtractedSegment::Sql(_) => "sql",
                ExtractedSegment::Generic(_) => "generic",
            })
            .collect();
        assert_eq!(kinds, vec!["sql", "generic", "json"]);
    }

    #[test]
    fn test_appended_strategy_is_last_resort() {
        struct YamlTable;
        impl Strategy for YamlTable {
            fn name(&self) -> &'static str {
                "yaml"
            }
            fn find(&self, text: &str, kind: SegmentKind) -> Option<Candidate> {
                if kind != SegmentKind::Json {
                    return None;
                }
                text.find("tables:").map(|offset| Candidate {
                    language: "yaml".into(),
                    body: text[offset..].to_string(),
                    offset,
                    origin: Origin::Marker,
                })
            }
        }

        let extractor = Extractor::default().with_strategy(Box::new(YamlTable));
        assert_eq!(extractor.strategy_names(), vec!["fenced", "marker", "yaml"]);
        let found = extractor.locate("tables: []", SegmentKind::Json).unwrap();
        assert_eq!(found.language, "yaml");
        let found = extractor
            .locate("```json\n{}\n```\ntables: []", SegmentKind::Json)
            .unwrap();
        assert_eq!(found.language, "json");
    }

    #[test]
    fn test_strip_code_fences() {
        let text = "Use this:\n```sql\nSELECT 1;\n```\nor ```json {}```.";
        assert_eq!(strip_code_fences(text), "Use this:\n\nSELECT 1;\n\nor  {}.");
        assert_eq!(strip_code_fences("no fences"), "no fences");
    }

    #[test]
    fn test_inline_code_outside_fences() {
        let text = "Run `VACUUM` then `ANALYZE`.\n```sql\nSELECT `x`;\n```";
        assert_eq!(extract_inline_code(text), vec!["VACUUM", "ANALYZE"]);
    }

    #[test]
    fn test_filter_by_language() {
        let blocks = code_blocks("```SQL\nSELECT 1;\n```\n```rust\nfn f() {}\n```");
        let sql = filter_by_language(&blocks, &["sql"]);
        assert_eq!(sql.len(), 1);
        assert_eq!(sql[0].code, "SELECT 1;");
    }

    #[test]
    fn test_pretty_json() {
        assert_eq!(pretty_json("{\"a\":1}").unwrap(), "{\n  \"a\": 1\n}");
        assert!(pretty_json("{nope").is_err());
    }
}

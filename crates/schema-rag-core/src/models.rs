//! Core data models that flow through the retrieval and generation pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::extract::{ExtractedSegments, SqlKind};
use crate::schema::Schema;

/// Metadata key holding the document locator (a URL).
pub const LOCATOR_KEY: &str = "source_url";
/// Metadata key holding inline document text, when the index stores it.
pub const CONTENT_KEY: &str = "content";

/// Separator line written between documents in an aggregated context.
pub const CONTEXT_SEPARATOR: &str = "--------------------------------";

/// A candidate document reference returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub id: String,
    /// Similarity score; higher is more relevant.
    pub score: f32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ScoredMatch {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            metadata: Map::new(),
        }
    }

    /// Builder-style helper used by tests and adapters.
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// The document locator, trimmed of quotes and surrounding whitespace.
    ///
    /// Returns `None` when the key is absent or the trimmed value is empty.
    pub fn locator(&self) -> Option<String> {
        self.meta_text(LOCATOR_KEY)
    }

    /// Inline document text stored alongside the vector, if any.
    pub fn inline_content(&self) -> Option<String> {
        self.meta_text(CONTENT_KEY)
    }

    fn meta_text(&self, key: &str) -> Option<String> {
        let raw = match self.metadata.get(key)? {
            Value::String(s) => s.clone(),
            Value::Null => return None,
            other => other.to_string(),
        };
        let trimmed = raw.trim_matches(|c: char| c == '"' || c == '\n' || c == ' ' || c == '\t');
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// The body of one successfully retrieved document.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    pub locator: String,
    pub body: String,
    pub score: f32,
    /// True when the body came from match metadata rather than a fetch.
    pub from_inline: bool,
}

/// Documents admitted by the aggregator, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct AggregationResult {
    pub documents: Vec<RetrievedDocument>,
    /// Candidates for which a task was launched.
    pub attempted: usize,
    /// Candidates whose fetch failed before aggregation returned.
    pub failed: usize,
    /// True when the overall deadline cut aggregation short.
    pub deadline_hit: bool,
}

impl AggregationResult {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Locators of the admitted documents, in arrival order.
    pub fn locators(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.locator.as_str()).collect()
    }

    /// Render the admitted bodies as one prompt section.
    ///
    /// Each body is preceded by a separator line and the section is closed
    /// by one more, so an empty result renders as a lone separator.
    pub fn to_context(&self) -> String {
        let mut out = String::new();
        for doc in &self.documents {
            out.push_str(CONTEXT_SEPARATOR);
            out.push('\n');
            out.push_str(&doc.body);
            out.push('\n');
        }
        out.push_str(CONTEXT_SEPARATOR);
        out.push('\n');
        out
    }
}

/// Result of an agent-mode request.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    /// Full generated text.
    pub response: String,
    /// Authoritative JSON segment (proposed schema), or `""`.
    pub schema_changes: String,
    /// Authoritative SQL segment (DDL), or `""`.
    pub schema_ddl: String,
    /// Parse error of the JSON segment, when it was kept despite failing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_changes_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ddl_kind: Option<SqlKind>,
    /// Every segment found in the response.
    pub segments: ExtractedSegments,
}

impl AgentResponse {
    /// Build the envelope from generated text and its extraction.
    pub fn from_extraction(response: String, segments: ExtractedSegments) -> Self {
        let (schema_changes, schema_changes_error) = match &segments.primary_json {
            Some(seg) => (seg.raw.clone(), seg.error.clone()),
            None => (String::new(), None),
        };
        let (schema_ddl, ddl_kind) = match &segments.primary_sql {
            Some(seg) => (seg.code.clone(), Some(seg.kind)),
            None => (String::new(), None),
        };
        Self {
            response,
            schema_changes,
            schema_ddl,
            schema_changes_error,
            ddl_kind,
            segments,
        }
    }

    /// Decode the proposed schema into the typed [`Schema`] shape.
    ///
    /// Returns `None` when there is no JSON segment or it does not match.
    pub fn proposed_schema(&self) -> Option<Schema> {
        let parsed = self.segments.primary_json.as_ref()?.parsed.as_ref()?;
        serde_json::from_value(parsed.clone()).ok()
    }
}

/// Result of a chat-mode request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

//! Request pipeline for the agent, chat, and report modes.
//!
//! [`Pipeline`] owns handles to the four external services and sequences
//! them for each request:
//!
//! | Mode | Steps |
//! |------|-------|
//! | agent | embed → search → aggregate (fetch) → prompt → generate → extract JSON + SQL |
//! | chat | embed → search → aggregate (inline or fetch) → prompt → generate → strip fences |
//! | report | prompt → generate |
//!
//! Embedding, search, and generation failures abort the request as
//! [`RagError`]. Everything else degrades: failed fetches shrink the
//! context, and a chat request with nothing to cite returns a fixed
//! fallback message without calling the generator.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::aggregate::{aggregate, AggregateOptions, LatePolicy, DEFAULT_FETCH_OVERHEAD};
use crate::error::RagError;
use crate::extract::{strip_code_fences, Extractor, MarkerSet};
use crate::models::{AgentResponse, AggregationResult, ChatResponse, ScoredMatch};
use crate::prompt;
use crate::services::{Embedder, Fetcher, Generator, VectorIndex};

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_CHAT_NAMESPACE: &str = "database-articles";
pub const CHAT_FALLBACK_MESSAGE: &str =
    "I'm sorry, I couldn't find any information related to your question in the knowledge base.";

/// Pipeline tuning, normally built from the application config.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Used when a caller passes `top_k == 0`.
    pub default_top_k: usize,
    /// Extra matches requested from search and examined by the aggregator.
    pub fetch_overhead: usize,
    pub fetch_timeout: Duration,
    pub fetch_deadline: Duration,
    pub late_policy: LatePolicy,
    pub chat_namespace: String,
    pub chat_fallback: String,
    pub markers: MarkerSet,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            default_top_k: DEFAULT_TOP_K,
            fetch_overhead: DEFAULT_FETCH_OVERHEAD,
            fetch_timeout: crate::aggregate::DEFAULT_FETCH_TIMEOUT,
            fetch_deadline: crate::aggregate::DEFAULT_DEADLINE,
            late_policy: LatePolicy::Abort,
            chat_namespace: DEFAULT_CHAT_NAMESPACE.to_string(),
            chat_fallback: CHAT_FALLBACK_MESSAGE.to_string(),
            markers: MarkerSet::default(),
        }
    }
}

/// Sequences the external services for each request mode.
pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Extractor,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
        fetcher: Arc<dyn Fetcher>,
        settings: PipelineSettings,
    ) -> Self {
        let extractor = Extractor::new(settings.markers.clone());
        Self {
            embedder,
            index,
            generator,
            fetcher,
            extractor,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Propose schema changes for `user_request` against `current_schema`.
    ///
    /// Reference documents come from `namespace`. The response carries the
    /// raw text plus the first JSON segment (proposed schema) and the first
    /// SQL segment (DDL); either is empty when the model did not produce it.
    pub async fn run_agent(
        &self,
        namespace: &str,
        current_schema: &str,
        user_request: &str,
        top_k: usize,
    ) -> Result<AgentResponse, RagError> {
        let top_k = self.effective_top_k(top_k);
        let matches = self.retrieve(namespace, user_request, top_k).await?;

        let started = Instant::now();
        let docs = aggregate(
            self.fetcher.clone(),
            &matches,
            &self.aggregate_options(top_k, false),
        )
        .await;
        info!(
            "fetching {} resources took {:.3}s ({} failed)",
            docs.len(),
            started.elapsed().as_secs_f64(),
            docs.failed
        );

        let prompt = prompt::agent_prompt(
            &docs.to_context(),
            current_schema,
            user_request,
            &self.settings.markers,
        );
        let text = self.generate(&prompt).await?;

        let segments = self.extractor.extract(&text);
        debug!(
            json = segments.primary_json.is_some(),
            sql = segments.primary_sql.is_some(),
            blocks = segments.all_blocks.len(),
            "extracted segments"
        );
        Ok(AgentResponse::from_extraction(text, segments))
    }

    /// Answer a free-form database question with cited sources.
    pub async fn run_chat(&self, user_query: &str, top_k: usize) -> Result<ChatResponse, RagError> {
        let top_k = self.effective_top_k(top_k);
        info!("processing chat query: {}", user_query);

        let matches = self
            .retrieve(&self.settings.chat_namespace, user_query, top_k)
            .await?;
        if matches.is_empty() {
            info!("no matches found, returning fallback response");
            return Ok(self.fallback());
        }

        let candidates = chat_candidates(&matches);
        let docs = aggregate(
            self.fetcher.clone(),
            &candidates,
            &self.aggregate_options(top_k, true),
        )
        .await;
        if docs.is_empty() {
            info!("no documents retrieved, returning fallback response");
            return Ok(self.fallback());
        }

        let sources = cited_sources(&candidates, &docs);
        let prompt = prompt::chat_prompt(&prompt::chat_context(&docs.documents), user_query);
        let text = self.generate(&prompt).await?;

        Ok(ChatResponse {
            response: strip_code_fences(&text).trim().to_string(),
            sources,
        })
    }

    /// Write a markdown report from analytics and schema data. No retrieval.
    pub async fn run_report(&self, analytics: &str, schema: &str) -> Result<String, RagError> {
        let prompt = prompt::report_prompt(analytics, schema);
        self.generate(&prompt).await
    }

    fn effective_top_k(&self, top_k: usize) -> usize {
        if top_k == 0 {
            self.settings.default_top_k.max(1)
        } else {
            top_k
        }
    }

    fn aggregate_options(&self, target: usize, prefer_inline: bool) -> AggregateOptions {
        AggregateOptions {
            target,
            overhead: self.settings.fetch_overhead,
            per_fetch_timeout: self.settings.fetch_timeout,
            overall_deadline: self.settings.fetch_deadline,
            prefer_inline,
            late_policy: self.settings.late_policy,
        }
    }

    fn fallback(&self) -> ChatResponse {
        ChatResponse {
            response: self.settings.chat_fallback.clone(),
            sources: Vec::new(),
        }
    }

    /// Embed `query` and search `namespace`, padding the count by the
    /// fetch overhead.
    async fn retrieve(
        &self,
        namespace: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredMatch>, RagError> {
        let started = Instant::now();
        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(RagError::embedding)?;
        info!(
            "embedding the query took {:.3}s",
            started.elapsed().as_secs_f64()
        );

        let started = Instant::now();
        let count = top_k.saturating_add(self.settings.fetch_overhead);
        let matches = self
            .index
            .search(namespace, &vector, count)
            .await
            .map_err(RagError::search)?;
        info!(
            namespace,
            matches = matches.len(),
            "querying the vector store took {:.3}s",
            started.elapsed().as_secs_f64()
        );
        Ok(matches)
    }

    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let started = Instant::now();
        let text = self
            .generator
            .generate(prompt)
            .await
            .map_err(RagError::generation)?;
        info!(
            "generating the response took {:.3}s",
            started.elapsed().as_secs_f64()
        );
        Ok(text)
    }
}

/// Ranked chat candidates. Every match carrying inline content is kept, so
/// several chunks of one article all reach the prompt; a match that would
/// need fetching is dropped when its locator was already seen.
pub fn chat_candidates(matches: &[ScoredMatch]) -> Vec<ScoredMatch> {
    let ranked = crate::aggregate::rank_candidates(matches, matches.len());
    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .filter(|m| {
            let first = m.locator().map_or(true, |loc| seen.insert(loc));
            first || m.inline_content().is_some()
        })
        .collect()
}

/// Locators of admitted documents, ordered by first appearance in `ranked`.
fn cited_sources(ranked: &[ScoredMatch], docs: &AggregationResult) -> Vec<String> {
    let admitted: HashSet<&str> = docs.locators().into_iter().collect();
    let mut seen = HashSet::new();
    ranked
        .iter()
        .filter_map(|m| m.locator())
        .filter(|loc| admitted.contains(loc.as_str()))
        .filter(|loc| seen.insert(loc.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CONTENT_KEY, LOCATOR_KEY};

    #[test]
    fn test_chat_candidates_drop_repeat_fetches_only() {
        let matches = vec![
            ScoredMatch::new("a", 0.5).with_meta(LOCATOR_KEY, "https://kb/x"),
            ScoredMatch::new("b", 0.9).with_meta(LOCATOR_KEY, "https://kb/x"),
            ScoredMatch::new("c", 0.7).with_meta(LOCATOR_KEY, "https://kb/y"),
            ScoredMatch::new("d", 0.1).with_meta(CONTENT_KEY, "no locator"),
            ScoredMatch::new("e", 0.6)
                .with_meta(LOCATOR_KEY, "https://kb/y")
                .with_meta(CONTENT_KEY, "second chunk"),
        ];
        let ids: Vec<String> = chat_candidates(&matches).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["b", "c", "e", "d"]);
    }

    #[test]
    fn test_cited_sources_only_lists_admitted_documents() {
        let ranked = vec![
            ScoredMatch::new("a", 0.9).with_meta(LOCATOR_KEY, "https://kb/a"),
            ScoredMatch::new("b", 0.8).with_meta(LOCATOR_KEY, "https://kb/b"),
            ScoredMatch::new("c", 0.7).with_meta(LOCATOR_KEY, "https://kb/c"),
        ];
        let docs = AggregationResult {
            documents: vec![
                crate::models::RetrievedDocument {
                    locator: "https://kb/c".into(),
                    body: "c".into(),
                    score: 0.7,
                    from_inline: true,
                },
                crate::models::RetrievedDocument {
                    locator: "https://kb/a".into(),
                    body: "a".into(),
                    score: 0.9,
                    from_inline: true,
                },
            ],
            ..Default::default()
        };
        assert_eq!(cited_sources(&ranked, &docs), vec!["https://kb/a", "https://kb/c"]);
    }
}

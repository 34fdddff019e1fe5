//! Wiring from [`Config`] to a ready [`Pipeline`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use schema_rag_core::models::ScoredMatch;
use schema_rag_core::pipeline::Pipeline;
use schema_rag_core::services::VectorIndex;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::fetch::HttpFetcher;
use crate::gemini::{GeminiClient, GeminiEmbedder, GeminiGenerator};
use crate::vector::PineconeIndex;

/// Build the pipeline with the Gemini, Pinecone, and HTTP clients.
///
/// Fails when either API key is missing.
pub fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let index = PineconeIndex::new(&config.pinecone).context("Pinecone client")?;
    assemble(config, Arc::new(index))
}

/// Build a pipeline that only requires the Gemini key.
///
/// Report mode never searches, so a missing Pinecone key is tolerated: the
/// index is replaced by one that fails every search with a clear error.
pub fn build_report_pipeline(config: &Config) -> Result<Pipeline> {
    let index: Arc<dyn VectorIndex> = if config.pinecone.has_api_key() {
        Arc::new(PineconeIndex::new(&config.pinecone).context("Pinecone client")?)
    } else {
        tracing::warn!("PINECONE_API_KEY not set; agent and chat requests will fail");
        Arc::new(UnconfiguredIndex)
    };
    assemble(config, index)
}

fn assemble(config: &Config, index: Arc<dyn VectorIndex>) -> Result<Pipeline> {
    let gemini = GeminiClient::new(&config.gemini).context("Gemini client")?;
    let fetcher = HttpFetcher::new(Duration::from_secs(
        config.retrieval.fetch_timeout_secs.saturating_add(1),
    ))?;

    Ok(Pipeline::new(
        Arc::new(GeminiEmbedder::new(
            gemini.clone(),
            config.gemini.embedding_model.clone(),
        )),
        index,
        Arc::new(GeminiGenerator::new(gemini, config.gemini.model.clone())),
        Arc::new(fetcher),
        config.pipeline_settings(),
    ))
}

/// Stands in for the vector index when no Pinecone key is configured.
struct UnconfiguredIndex;

#[async_trait]
impl VectorIndex for UnconfiguredIndex {
    async fn search(&self, _namespace: &str, _vector: &[f32], _count: usize) -> Result<Vec<ScoredMatch>> {
        bail!("PINECONE_API_KEY not set")
    }
}

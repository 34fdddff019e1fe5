//! Traits for the external collaborators the pipeline consumes.
//!
//! Concrete implementations (Gemini, Pinecone, reqwest) live in the
//! `schema-rag` app crate. Tests drive the pipeline with in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::ScoredMatch;

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Top-K similarity search inside one namespace of a vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Returns at most `count` matches, highest score first.
    async fn search(&self, namespace: &str, vector: &[f32], count: usize)
        -> Result<Vec<ScoredMatch>>;
}

/// Executes a prompt and returns a single text response.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Retrieves the raw text behind a document locator.
///
/// Implementations report non-success statuses and transport failures as
/// [`FetchError`]; the aggregator adds its own per-fetch timeout on top.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> std::result::Result<String, FetchError>;
}

//! Gemini REST clients for embedding and generation.
//!
//! Both clients talk to the Generative Language API
//! (`{base_url}/v1beta/models/{model}:{method}?key=…`) through a shared
//! [`GeminiClient`], which retries rate-limit (429), server (5xx), and
//! network errors with exponential backoff. Other client errors fail
//! immediately.
//!
//! | Type | Trait | Method |
//! |------|-------|--------|
//! | [`GeminiEmbedder`] | [`Embedder`] | `embedContent` |
//! | [`GeminiGenerator`] | [`Generator`] | `generateContent` |

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use schema_rag_core::services::{Embedder, Generator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GeminiConfig;

/// HTTP plumbing shared by the Gemini clients.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    backoff_base: Duration,
}

impl GeminiClient {
    /// Build a client from config. Fails when no API key is configured.
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY not set"))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
            backoff_base: Duration::from_secs(1),
        })
    }

    /// Override the first retry delay (doubled on every further attempt).
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    async fn call<B, R>(&self, model: &str, method: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/v1beta/models/{}:{}", self.base_url, model, method);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: base, 2x, 4x, ... capped at 32x
                let delay = self.backoff_base * (1u32 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying Gemini {}", method);
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json::<R>()
                            .await
                            .with_context(|| format!("Invalid Gemini {} response", method));
                    }

                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        warn!("Gemini {} returned {}, will retry", method, status);
                        last_err = Some(anyhow::anyhow!(
                            "Gemini API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Gemini API error {}: {}", status, body_text);
                }
                Err(e) => {
                    warn!("Gemini {} request failed: {}", method, e);
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Gemini {} failed after retries", method)))
    }
}

// ============ Wire types ============

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Value>,
}

// ============ Embedder ============

/// Query embeddings via `embedContent`.
pub struct GeminiEmbedder {
    client: GeminiClient,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: format!("models/{}", self.model),
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
        };
        let resp: EmbedResponse = self
            .client
            .call(&self.model, "embedContent", &request)
            .await?;
        if resp.embedding.values.is_empty() {
            bail!("Gemini returned an empty embedding");
        }
        Ok(resp.embedding.values)
    }
}

// ============ Generator ============

/// Single-turn text generation via `generateContent`.
pub struct GeminiGenerator {
    client: GeminiClient,
    model: String,
}

impl GeminiGenerator {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
        };
        let resp: GenerateResponse = self
            .client
            .call(&self.model, "generateContent", &request)
            .await?;
        response_text(resp)
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(resp: GenerateResponse) -> Result<String> {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        bail!("Gemini returned no candidates");
    };
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        bail!(
            "Gemini returned no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        );
    }
    Ok(text)
}

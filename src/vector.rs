//! Pinecone similarity search.
//!
//! [`PineconeIndex`] implements [`VectorIndex`] over Pinecone's data-plane
//! REST API. When no host is configured it asks the control plane for the
//! index's host on first use and caches the answer.
//!
//! | Call | Request |
//! |------|---------|
//! | search | `POST https://{host}/query` |
//! | stats | `POST https://{host}/describe_index_stats` |
//! | host lookup | `GET {control_plane}/indexes/{name}` |

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use schema_rag_core::models::ScoredMatch;
use schema_rag_core::services::VectorIndex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::PineconeConfig;

pub struct PineconeIndex {
    http: reqwest::Client,
    api_key: String,
    api_version: String,
    index_name: String,
    control_plane_url: String,
    host: OnceCell<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    namespace: &'a str,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

/// Vector counts reported by `describe_index_stats`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(default)]
    pub dimension: usize,
    #[serde(default)]
    pub total_vector_count: u64,
    #[serde(default)]
    pub namespaces: BTreeMap<String, NamespaceStats>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStats {
    #[serde(default)]
    pub vector_count: u64,
}

impl PineconeIndex {
    /// Build a client from config. Fails when no API key is configured.
    pub fn new(config: &PineconeConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("PINECONE_API_KEY not set"))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let host = OnceCell::new();
        if let Some(h) = config.host.as_deref().filter(|h| !h.trim().is_empty()) {
            // Only fails if already set, which it is not.
            let _ = host.set(normalize_host(h));
        }

        Ok(Self {
            http,
            api_key,
            api_version: config.api_version.clone(),
            index_name: config.index_name.clone(),
            control_plane_url: config.control_plane_url.trim_end_matches('/').to_string(),
            host,
        })
    }

    /// Data-plane base URL, resolved once.
    pub async fn host(&self) -> Result<&str> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let url = format!("{}/indexes/{}", self.control_plane_url, self.index_name);
                let resp = self
                    .http
                    .get(&url)
                    .header("Api-Key", &self.api_key)
                    .header("X-Pinecone-API-Version", &self.api_version)
                    .send()
                    .await
                    .with_context(|| format!("Failed to describe index '{}'", self.index_name))?;
                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    bail!(
                        "Pinecone describe index '{}' failed {}: {}",
                        self.index_name,
                        status,
                        body
                    );
                }
                let described: DescribeIndexResponse = resp
                    .json()
                    .await
                    .context("Invalid Pinecone describe index response")?;
                info!(index = %self.index_name, host = %described.host, "resolved index host");
                Ok(normalize_host(&described.host))
            })
            .await?;
        Ok(host.as_str())
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}", self.host().await?, path);
        let resp = self
            .http
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Pinecone request to {} failed", path))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Pinecone API error {}: {}", status, body);
        }
        resp.json()
            .await
            .with_context(|| format!("Invalid Pinecone {} response", path))
    }

    /// Vector counts for the whole index and per namespace.
    pub async fn describe_index_stats(&self) -> Result<IndexStats> {
        self.post("describe_index_stats", &serde_json::json!({}))
            .await
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn search(
        &self,
        namespace: &str,
        vector: &[f32],
        count: usize,
    ) -> Result<Vec<ScoredMatch>> {
        let request = QueryRequest {
            vector,
            top_k: count,
            namespace,
            include_metadata: true,
            include_values: false,
        };
        let resp: QueryResponse = self.post("query", &request).await?;
        debug!(namespace, matches = resp.matches.len(), "pinecone query");

        Ok(resp
            .matches
            .into_iter()
            .map(|m| ScoredMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }
}

/// Hosts come back without a scheme; tests point at plain `http://`.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

//! Gemini, Pinecone, and document fetch clients against mock HTTP servers.

use schema_rag::config::{GeminiConfig, PineconeConfig};
use schema_rag::fetch::HttpFetcher;
use schema_rag::gemini::{GeminiClient, GeminiEmbedder, GeminiGenerator};
use schema_rag::vector::PineconeIndex;
use schema_rag_core::error::FetchError;
use schema_rag_core::services::{Embedder, Fetcher, Generator, VectorIndex};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn gemini_client(server: &MockServer) -> GeminiClient {
    let config = GeminiConfig {
        api_key: Some("test-key".to_string()),
        base_url: server.uri(),
        max_retries: 2,
        ..Default::default()
    };
    GeminiClient::new(&config)
        .unwrap()
        .with_backoff(Duration::from_millis(10))
}

fn pinecone_config(server: &MockServer, host: Option<String>) -> PineconeConfig {
    PineconeConfig {
        api_key: Some("pc-key".to_string()),
        index_name: "knowledge-index".to_string(),
        host,
        control_plane_url: server.uri(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_gemini_embed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/text-embedding-004:embedContent"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "model": "models/text-embedding-004",
            "content": {"parts": [{"text": "add a members table"}]}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embedding": {"values": [0.25, -0.5]}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let embedder = GeminiEmbedder::new(gemini_client(&server), "text-embedding-004");
    let vector = embedder.embed("add a members table").await.unwrap();
    assert_eq!(vector, vec![0.25, -0.5]);
}

#[tokio::test]
async fn test_gemini_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Use an index."}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = GeminiGenerator::new(gemini_client(&server), "gemini-2.0-flash");
    assert_eq!(generator.generate("prompt").await.unwrap(), "Use an index.");
}

#[tokio::test]
async fn test_gemini_does_not_retry_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad prompt"))
        .expect(1)
        .mount(&server)
        .await;

    let generator = GeminiGenerator::new(gemini_client(&server), "gemini-2.0-flash");
    let err = generator.generate("prompt").await.unwrap_err();
    assert!(err.to_string().contains("400"));
}

#[tokio::test]
async fn test_gemini_gives_up_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
        .expect(3)
        .mount(&server)
        .await;

    let embedder = GeminiEmbedder::new(gemini_client(&server), "text-embedding-004");
    let err = embedder.embed("x").await.unwrap_err();
    assert!(err.to_string().contains("429"));
}

#[tokio::test]
async fn test_pinecone_query_with_configured_host() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(header("Api-Key", "pc-key"))
        .and(body_partial_json(json!({
            "topK": 8,
            "namespace": "schemas-json",
            "includeMetadata": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                {"id": "doc-1", "score": 0.91, "metadata": {"source_url": "https://kb.test/1\n"}},
                {"id": "doc-2", "score": 0.75}
            ],
            "namespace": "schemas-json"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let index = PineconeIndex::new(&pinecone_config(&server, Some(server.uri()))).unwrap();
    let matches = index.search("schemas-json", &[0.1, 0.2], 8).await.unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "doc-1");
    assert_eq!(matches[0].locator().as_deref(), Some("https://kb.test/1"));
    assert!(matches[1].metadata.is_empty());
}

#[tokio::test]
async fn test_pinecone_resolves_host_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indexes/knowledge-index"))
        .and(header("Api-Key", "pc-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "knowledge-index",
            "host": server.uri(),
            "dimension": 768
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"matches": []})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/describe_index_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dimension": 768,
            "totalVectorCount": 40,
            "namespaces": {"schemas-json": {"vectorCount": 30}, "database-articles": {"vectorCount": 10}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let index = PineconeIndex::new(&pinecone_config(&server, None)).unwrap();
    assert!(index.search("schemas-json", &[0.1], 3).await.unwrap().is_empty());
    assert!(index.search("database-articles", &[0.1], 3).await.unwrap().is_empty());

    let stats = index.describe_index_stats().await.unwrap();
    assert_eq!(stats.dimension, 768);
    assert_eq!(stats.namespaces["schemas-json"].vector_count, 30);
}

#[tokio::test]
async fn test_pinecone_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let index = PineconeIndex::new(&pinecone_config(&server, Some(server.uri()))).unwrap();
    let err = index.search("ns", &[0.1], 1).await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_fetcher_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("CREATE TABLE docs (...)"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blank"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  \n"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
    let base = server.uri();

    let body = fetcher.fetch(&format!("{}/ok", base)).await.unwrap();
    assert_eq!(body, "CREATE TABLE docs (...)");

    let err = fetcher.fetch(&format!("{}/missing", base)).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));

    let err = fetcher.fetch(&format!("{}/blank", base)).await.unwrap_err();
    assert!(matches!(err, FetchError::EmptyBody { .. }));
}

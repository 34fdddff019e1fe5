//! Full pipeline built from config, with every service behind one mock server.

use schema_rag::config::Config;
use schema_rag::services::{build_pipeline, build_report_pipeline};
use schema_rag_core::extract::SqlKind;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const ANSWER: &str = "Add a members table.\n\n# SCHEMA CHANGES\n{\"TABLES\": {\"members\": {\"COLUMNS\": {}}}}\n# END SCHEMA CHANGES\n\n# SCHEMA DDL\nCREATE TABLE members (id serial PRIMARY KEY);\n# END SCHEMA DDL\n";

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::minimal();
    config.gemini.api_key = Some("test-key".to_string());
    config.gemini.base_url = server.uri();
    config.gemini.max_retries = 0;
    config.pinecone.api_key = Some("pc-key".to_string());
    config.pinecone.host = Some(server.uri());
    config.retrieval.fetch_timeout_secs = 1;
    config.retrieval.fetch_deadline_secs = 5;
    config
}

async fn mount_services(server: &MockServer, matches: Value, answer: &str) {
    Mock::given(method("POST"))
        .and(path("/v1beta/models/text-embedding-004:embedContent"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embedding": {"values": [0.1, 0.2]}})),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "matches": matches })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": answer}]}}]
        })))
        .mount(server)
        .await;
}

async fn generation_prompt(server: &MockServer) -> String {
    let requests = server.received_requests().await.unwrap_or_default();
    let req = requests
        .iter()
        .find(|r| r.url.path().ends_with(":generateContent"))
        .expect("generation was called");
    let body: Value = serde_json::from_slice(&req.body).unwrap();
    body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_agent_over_http_tolerates_failed_fetches() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_services(
        &server,
        json!([
            {"id": "a", "score": 0.9, "metadata": {"source_url": format!("{}/docs/a", base)}},
            {"id": "b", "score": 0.8, "metadata": {"source_url": format!("{}/docs/missing", base)}},
            {"id": "c", "score": 0.7, "metadata": {"source_url": format!("{}/docs/slow", base)}},
            {"id": "d", "score": 0.6, "metadata": {}},
            {"id": "e", "score": 0.5, "metadata": {"source_url": format!("{}/docs/e", base)}}
        ]),
        ANSWER,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/docs/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("guide on normalization"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late to matter")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/e"))
        .respond_with(ResponseTemplate::new(200).set_body_string("guide on indexes"))
        .mount(&server)
        .await;

    let pipeline = build_pipeline(&config_for(&server)).unwrap();
    let resp = pipeline
        .run_agent("schemas-json", "{\"TABLES\": {}}", "add members", 5)
        .await
        .unwrap();

    assert_eq!(resp.schema_changes, "{\"TABLES\": {\"members\": {\"COLUMNS\": {}}}}");
    assert!(resp.schema_changes_error.is_none());
    assert_eq!(resp.schema_ddl, "CREATE TABLE members (id serial PRIMARY KEY);");
    assert_eq!(resp.ddl_kind, Some(SqlKind::Create));

    let prompt = generation_prompt(&server).await;
    assert!(prompt.contains("guide on normalization"));
    assert!(prompt.contains("guide on indexes"));
    assert!(!prompt.contains("too late to matter"));
}

#[tokio::test]
async fn test_chat_over_http_cites_inline_sources() {
    let server = MockServer::start().await;
    mount_services(
        &server,
        json!([
            {"id": "1", "score": 0.9, "metadata": {"source_url": "https://kb.test/joins", "content": "Joins combine rows."}},
            {"id": "2", "score": 0.8, "metadata": {"source_url": "https://kb.test/joins", "content": "Joins, part two."}},
            {"id": "3", "score": 0.7, "metadata": {"source_url": "https://kb.test/keys", "content": "Keys identify rows."}}
        ]),
        "```\nA join combines rows from two tables.\n```",
    )
    .await;

    let pipeline = build_pipeline(&config_for(&server)).unwrap();
    let resp = pipeline.run_chat("what is a join?", 3).await.unwrap();

    assert_eq!(resp.response, "A join combines rows from two tables.");
    assert_eq!(resp.sources, vec!["https://kb.test/joins", "https://kb.test/keys"]);

    let prompt = generation_prompt(&server).await;
    assert!(prompt.contains("Source: https://kb.test/keys"));
    assert!(prompt.contains("Joins combine rows."));
    assert!(prompt.contains("Joins, part two."));
    assert!(prompt.contains("User query: what is a join?"));
}

#[tokio::test]
async fn test_build_pipeline_requires_keys() {
    let err = build_pipeline(&Config::minimal()).err().unwrap();
    assert!(format!("{:#}", err).contains("GEMINI_API_KEY"));
}

#[tokio::test]
async fn test_report_pipeline_needs_no_index_key() {
    let server = MockServer::start().await;
    mount_services(&server, json!([]), "# Usage report").await;

    let mut config = config_for(&server);
    config.pinecone.api_key = None;
    assert!(build_pipeline(&config).is_err());

    let pipeline = build_report_pipeline(&config).unwrap();
    let report = pipeline.run_report("{}", "{\"TABLES\": {}}").await.unwrap();
    assert_eq!(report, "# Usage report");

    let err = pipeline.run_chat("anything", 3).await.unwrap_err();
    assert_eq!(err.code(), "search_error");
    assert!(err.to_string().contains("PINECONE_API_KEY"));
}

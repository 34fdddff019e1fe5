//! HTTP server for the three request modes.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/agent` | Propose schema changes (returns `AgentResponse`) |
//! | `POST` | `/chat` | Answer a question with sources (returns `ChatResponse`) |
//! | `POST` | `/report` | Markdown report from analytics + schema |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "request must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `embedding_error` (502),
//! `search_error` (502), `generation_error` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use schema_rag_core::error::RagError;
use schema_rag_core::models::{AgentResponse, ChatResponse};
use schema_rag_core::pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::services::build_report_pipeline;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    agent_namespace: String,
    chat_top_k: usize,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, config: &Config) -> Self {
        Self {
            pipeline,
            agent_namespace: config.retrieval.agent_namespace.clone(),
            chat_top_k: config.retrieval.chat_top_k,
        }
    }
}

/// Build the router. Separate from [`run_server`] so tests can serve it on
/// an ephemeral port.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/agent", post(handle_agent))
        .route("/chat", post(handle_chat))
        .route("/report", post(handle_report))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(build_report_pipeline(config)?);
    let app = router(AppState::new(pipeline, config));

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("schema-rag server listening on http://{}", bind_addr);
    println!("schema-rag server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Upstream service failures map to 502 with the error's own code.
impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        warn!("request failed: {}", err);
        AppError {
            status: StatusCode::BAD_GATEWAY,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /agent ============

#[derive(Deserialize)]
struct AgentRequest {
    request: String,
    /// Current schema, either as JSON or as a string.
    #[serde(default)]
    schema: Option<Value>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    top_k: Option<usize>,
}

async fn handle_agent(
    State(state): State<AppState>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    if req.request.trim().is_empty() {
        return Err(bad_request("request must not be empty"));
    }
    let namespace = req
        .namespace
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| state.agent_namespace.clone());
    let schema = req.schema.map(|v| value_text(&v)).unwrap_or_default();

    let resp = state
        .pipeline
        .run_agent(&namespace, &schema, &req.request, req.top_k.unwrap_or(0))
        .await?;
    Ok(Json(resp))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let top_k = req.top_k.unwrap_or(state.chat_top_k);
    let resp = state.pipeline.run_chat(&req.query, top_k).await?;
    Ok(Json(resp))
}

// ============ POST /report ============

#[derive(Deserialize)]
struct ReportRequest {
    analytics: Value,
    schema: Value,
}

#[derive(Serialize)]
struct ReportResponse {
    report: String,
}

async fn handle_report(
    State(state): State<AppState>,
    Json(req): Json<ReportRequest>,
) -> Result<Json<ReportResponse>, AppError> {
    let analytics = value_text(&req.analytics);
    let schema = value_text(&req.schema);
    if analytics.trim().is_empty() || schema.trim().is_empty() {
        return Err(bad_request("analytics and schema must not be empty"));
    }
    let report = state.pipeline.run_report(&analytics, &schema).await?;
    Ok(Json(ReportResponse { report }))
}

/// Strings pass through; any other JSON value is pretty-printed.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/chat` | Retrieve, then answer from cache or the model |
//! | `POST` | `/retrieve` | Rendered retrieval context only |
//! | `POST` | `/agent/chat` | Run the reasoning loop |
//! | `GET`  | `/agent/tools` | List agent tools |
//! | `GET`  | `/cache/stats` | Answer cache state |
//! | `DELETE` | `/cache` | Drop every cached answer |
//! | `POST` | `/cache/delete` | Drop one cached answer |
//! | `GET`  | `/stats` | Indexed chunk count |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `collaborator_unavailable` (503),
//! `internal` (500).

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use quarry_core::agent::MAX_ITERATIONS;
use quarry_core::answer::Answer;
use quarry_core::cache::CacheStats;
use quarry_core::index::IndexStats;
use quarry_core::models::{AgentResult, ToolInfo};
use quarry_core::retriever::is_no_context;
use quarry_core::{Collaborator, CoreError};

use crate::config::Config;
use crate::services::Services;

type AppState = Arc<Services>;

/// Build services from config and serve on `[server].bind` until killed.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Arc::new(Services::from_config(config).await?);
    let listener = TcpListener::bind(&config.server.bind).await?;
    println!("Quarry server listening on http://{}", listener.local_addr()?);
    serve(services, listener).await
}

/// Serve the API on an already-bound listener.
pub async fn serve(services: Arc<Services>, listener: TcpListener) -> anyhow::Result<()> {
    axum::serve(listener, router(services)).await?;
    Ok(())
}

pub fn router(services: Arc<Services>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/chat", post(handle_chat))
        .route("/retrieve", post(handle_retrieve))
        .route("/agent/chat", post(handle_agent_chat))
        .route("/agent/tools", get(handle_agent_tools))
        .route("/cache/stats", get(handle_cache_stats))
        .route("/cache", delete(handle_cache_clear))
        .route("/cache/delete", post(handle_cache_delete))
        .route("/stats", get(handle_stats))
        .layer(cors)
        .with_state(services)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
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

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::CollaboratorUnavailable { .. } => AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "collaborator_unavailable".to_string(),
                message: err.to_string(),
            },
            other => internal(other.to_string()),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

fn require_question(question: &str) -> Result<&str, AppError> {
    let q = question.trim();
    if q.is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    Ok(q)
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

// ============ POST /chat, POST /retrieve ============

#[derive(Deserialize)]
struct ChatRequest {
    question: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    use_hybrid: Option<bool>,
    /// Skip the answer cache for this request.
    #[serde(default)]
    no_cache: bool,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Answer>, AppError> {
    let question = require_question(&req.question)?;
    let opts = state.answer_options(req.top_k, req.use_hybrid, req.no_cache);
    let answer = state.answerer.ask(question, opts).await.map_err(|e| {
        error!(error = %e, "chat failed");
        AppError::from(e)
    })?;
    info!(cached = answer.cached, found = answer.found, "chat answered");
    Ok(Json(answer))
}

#[derive(Serialize)]
struct RetrieveResponse {
    context: String,
    found: bool,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<RetrieveResponse>, AppError> {
    let question = require_question(&req.question)?;
    let opts = state.answer_options(req.top_k, req.use_hybrid, true);
    let context = state
        .retriever
        .retrieve_context(question, opts.top_k, opts.use_hybrid)
        .await?;
    Ok(Json(RetrieveResponse {
        found: !is_no_context(&context),
        context,
    }))
}

// ============ POST /agent/chat, GET /agent/tools ============

#[derive(Deserialize)]
struct AgentRequest {
    question: String,
    #[serde(default)]
    max_iterations: Option<usize>,
}

async fn handle_agent_chat(
    State(state): State<AppState>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<AgentResult>, AppError> {
    let question = require_question(&req.question)?;
    if let Some(n) = req.max_iterations {
        if !(1..=MAX_ITERATIONS).contains(&n) {
            return Err(bad_request(format!(
                "max_iterations must be between 1 and {}",
                MAX_ITERATIONS
            )));
        }
    }
    Ok(Json(state.agent.run(question, req.max_iterations).await))
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
    count: usize,
}

async fn handle_agent_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state.tools.list_tools();
    Json(ToolListResponse {
        count: tools.len(),
        tools,
    })
}

// ============ Cache ============

async fn handle_cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats().await)
}

#[derive(Serialize)]
struct ClearResponse {
    count: usize,
}

async fn handle_cache_clear(State(state): State<AppState>) -> Json<ClearResponse> {
    Json(ClearResponse {
        count: state.cache.clear().await,
    })
}

#[derive(Deserialize)]
struct CacheDeleteRequest {
    question: String,
    /// Context the answer was cached under. When absent, it is
    /// reconstructed by running retrieval with the configured defaults.
    #[serde(default)]
    context: Option<String>,
}

#[derive(Serialize)]
struct CacheDeleteResponse {
    deleted: bool,
}

async fn handle_cache_delete(
    State(state): State<AppState>,
    Json(req): Json<CacheDeleteRequest>,
) -> Result<Json<CacheDeleteResponse>, AppError> {
    let question = require_question(&req.question)?;
    let context = match req.context {
        Some(c) => c,
        None => {
            let opts = state.answer_options(None, None, true);
            state
                .retriever
                .retrieve_context(question, opts.top_k, opts.use_hybrid)
                .await?
        }
    };
    Ok(Json(CacheDeleteResponse {
        deleted: state.cache.delete(question, &context).await,
    }))
}

// ============ GET /stats ============

#[derive(Serialize)]
struct StatsResponse {
    row_count: u64,
}

async fn handle_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let row_count = state
        .stats
        .row_count()
        .await
        .map_err(|e| AppError::from(CoreError::unavailable(Collaborator::IndexStats, e)))?;
    Ok(Json(StatsResponse { row_count }))
}

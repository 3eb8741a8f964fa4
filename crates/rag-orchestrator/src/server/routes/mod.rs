//! API routes for the orchestrator server

pub mod ingest;
pub mod instances;
pub mod research;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::server::state::AppState;

/// Acknowledgement for a newly created instance
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub id: Uuid,
    pub status: &'static str,
}

impl QueuedResponse {
    pub fn new(id: Uuid, status: &'static str) -> Self {
        Self { id, status }
    }
}

/// Response for GET /api/stats
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub documents: usize,
    pub chunks: usize,
    pub vectors: usize,
    pub queue_depth: usize,
}

/// Build all API routes
pub fn api_routes(max_body_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/ingest",
            post(ingest::ingest).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route("/research", post(research::research))
        .route("/status", get(instances::status_by_query))
        .route("/status/:id", get(instances::status_by_path))
        .route("/instances", get(instances::list_instances))
        .route("/stats", get(stats))
        .route("/info", get(info))
}

/// GET /api/stats - Store and queue counters
async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let (documents, chunks, vectors) = tokio::try_join!(
        state.store().count_documents(),
        state.store().count_chunks(),
        state.index().len(),
    )?;

    Ok(Json(StatsResponse {
        documents,
        chunks,
        vectors,
        queue_depth: state.engine().queue_depth(),
    }))
}

/// GET /api/info - Service description
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "rag-orchestrator",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Replay-safe ingestion and research pipelines with cited answers",
        "providers": {
            "embeddings": state.embeddings().name(),
            "llm": state.llm().name(),
            "model": state.llm().model(),
            "vectorIndex": state.index().name(),
            "store": state.store().name(),
        },
        "endpoints": {
            "POST /api/ingest": "Queue a document for ingestion",
            "POST /api/research": "Queue a research question",
            "GET /api/status?id=": "Poll an instance",
            "GET /api/status/:id": "Poll an instance",
            "GET /api/instances": "Recent instances",
            "GET /api/stats": "Document, chunk and vector counts"
        }
    }))
}

//! Ingestion endpoint

use axum::{extract::State, http::StatusCode, Json};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{IngestParams, WorkflowEvent};

use super::QueuedResponse;

/// POST /api/ingest - Queue a document for ingestion
pub async fn ingest(
    State(state): State<AppState>,
    Json(params): Json<IngestParams>,
) -> Result<(StatusCode, Json<QueuedResponse>)> {
    tracing::info!(
        "Ingest request: {} chars from {}",
        params.content.chars().count(),
        params.source_url.as_deref().unwrap_or("<no source>")
    );

    let id = state
        .engine()
        .create_instance(WorkflowEvent::Ingest(params))
        .await?;

    Ok((StatusCode::ACCEPTED, Json(QueuedResponse::new(id, "queued"))))
}

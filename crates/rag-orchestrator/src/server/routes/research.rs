//! Research endpoint

use axum::{extract::State, http::StatusCode, Json};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{ResearchParams, WorkflowEvent};

use super::QueuedResponse;

/// POST /api/research - Queue a research question
pub async fn research(
    State(state): State<AppState>,
    Json(params): Json<ResearchParams>,
) -> Result<(StatusCode, Json<QueuedResponse>)> {
    if params.query.trim().is_empty() {
        return Err(Error::invalid_request("Query cannot be empty"));
    }

    tracing::info!("Research request: {}", params.query);

    let id = state
        .engine()
        .create_instance(WorkflowEvent::Research(params))
        .await?;

    Ok((StatusCode::ACCEPTED, Json(QueuedResponse::new(id, "thinking"))))
}

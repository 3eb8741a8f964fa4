//! Instance status endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::workflow::InstanceStatus;

/// Query parameters for GET /api/status
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub id: Option<String>,
}

/// Query parameters for GET /api/instances
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for GET /api/instances
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceListResponse {
    pub instances: Vec<InstanceStatus>,
    pub total: usize,
    pub queue_depth: usize,
}

/// GET /api/status?id= - Poll an instance
pub async fn status_by_query(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<InstanceStatus>> {
    let id = query
        .id
        .ok_or_else(|| Error::invalid_request("Missing id parameter"))?;

    lookup(&state, &id).await
}

/// GET /api/status/:id - Poll an instance
pub async fn status_by_path(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InstanceStatus>> {
    lookup(&state, &id).await
}

/// GET /api/instances - Recent instances, newest first
pub async fn list_instances(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<InstanceListResponse>> {
    let instances = state.engine().list_instances(query.limit.min(500)).await?;

    Ok(Json(InstanceListResponse {
        total: instances.len(),
        instances,
        queue_depth: state.engine().queue_depth(),
    }))
}

async fn lookup(state: &AppState, id: &str) -> Result<Json<InstanceStatus>> {
    // An id that is not a UUID cannot name an instance
    let id = Uuid::parse_str(id.trim())
        .map_err(|_| Error::NotFound(format!("Instance {} not found", id)))?;

    let status = state.engine().get_status(id).await?;
    Ok(Json(status))
}

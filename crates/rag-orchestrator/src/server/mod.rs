//! HTTP server for the orchestrator

pub mod routes;
pub mod state;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Build the router with all routes
pub fn router(state: AppState) -> Router {
    let server = state.config().server.clone();

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .nest("/api", routes::api_routes(server.max_body_size))
        .with_state(state)
        // Applied bottom to top
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if server.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Orchestrator HTTP server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a new server with Ollama providers and local storage
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Create a server around prepared state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = router(self.state);

        tracing::info!("Starting orchestrator on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, EmbeddingConfig, WorkflowConfig};
    use crate::providers::LocalVectorIndex;
    use crate::storage::SqliteStore;
    use crate::testing::{LetterEmbedder, ScriptedLlm, LETTER_DIMENSIONS};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    const PLAN: &str = r#"{"subQueries": ["aaa"], "thoughtProcess": "look for a"}"#;

    async fn test_state() -> AppState {
        let config = RagConfig {
            chunking: ChunkingConfig {
                chunk_size: 500,
                chunk_overlap: 0,
            },
            embeddings: EmbeddingConfig {
                batch_size: 20,
                dimensions: LETTER_DIMENSIONS,
            },
            workflow: WorkflowConfig {
                worker_count: 2,
                max_attempts: 2,
                retry_backoff_ms: 1,
                resume_on_startup: false,
            },
            ..RagConfig::default()
        };
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        AppState::from_parts(
            config,
            Arc::new(LetterEmbedder::new()),
            Arc::new(ScriptedLlm::new(PLAN, "Mostly a [{first}].")),
            store.clone(),
            store,
            Arc::new(LocalVectorIndex::new(LETTER_DIMENSIONS)),
        )
        .await
        .unwrap()
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn poll_until_done(app: &Router, id: &str) -> Value {
        for _ in 0..200 {
            let (status, body) = send(app, Method::GET, &format!("/api/status?id={}", id), None).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] == "complete" || body["status"] == "failed" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("instance {} did not finish", id);
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let state = test_state().await;
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        state.set_ready(false);
        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_ingest_then_research_over_http() {
        let app = router(test_state().await);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/ingest",
            Some(json!({"content": "a".repeat(600), "sourceUrl": "https://example.com/a"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "queued");

        let done = poll_until_done(&app, body["id"].as_str().unwrap()).await;
        assert_eq!(done["status"], "complete");
        assert_eq!(done["output"]["chunksProcessed"], 2);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/research",
            Some(json!({"query": "what is a?"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "thinking");

        let done = poll_until_done(&app, body["id"].as_str().unwrap()).await;
        assert_eq!(done["status"], "complete");
        assert_eq!(done["output"]["sources"], json!(["https://example.com/a"]));
        assert!(!done["output"]["citations"].as_array().unwrap().is_empty());

        let (status, stats) = send(&app, Method::GET, "/api/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["documents"], 1);
        assert_eq!(stats["chunks"], 2);
        assert_eq!(stats["vectors"], 2);
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let app = router(test_state().await);

        let (status, body) = send(&app, Method::POST, "/api/research", Some(json!({"query": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request");
    }

    #[tokio::test]
    async fn test_status_lookup_errors() {
        let app = router(test_state().await);

        let (status, _) = send(&app, Method::GET, "/api/status", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/api/status?id=not-a-uuid", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/api/status/{}", Uuid::new_v4());
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "not_found");
    }

    #[tokio::test]
    async fn test_instances_listing() {
        let app = router(test_state().await);

        let (_, first) = send(&app, Method::POST, "/api/ingest", Some(json!({"content": ""}))).await;
        poll_until_done(&app, first["id"].as_str().unwrap()).await;

        let (status, body) = send(&app, Method::GET, "/api/instances?limit=10", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["instances"][0]["id"], first["id"]);
        assert_eq!(body["instances"][0]["output"]["status"], "empty");
    }
}

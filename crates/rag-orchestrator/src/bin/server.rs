//! Orchestrator server binary
//!
//! Run with: cargo run -p rag-orchestrator --bin rag-orchestrator-server
//!
//! Set `RAG_CONFIG` to a TOML file to override the defaults.

use rag_orchestrator::{config::RagConfig, providers::ollama::OllamaClient, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rag_orchestrator=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var("RAG_CONFIG") {
        Ok(path) => {
            tracing::info!("Loading configuration from {}", path);
            RagConfig::load(&path)?
        }
        Err(_) => RagConfig::default(),
    };
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.llm.embed_model);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Workers: {}", config.workflow.worker_count);

    tracing::info!("Checking Ollama at {}...", config.llm.base_url);
    match OllamaClient::new(&config.llm)?.health_check().await {
        Ok(true) => tracing::info!("Ollama is running"),
        _ => {
            tracing::warn!("Ollama not available at {}", config.llm.base_url);
            tracing::warn!(
                "Start it with `ollama serve` and pull {} and {}",
                config.llm.embed_model,
                config.llm.generate_model
            );
        }
    }

    let server = RagServer::new(config).await?;

    tracing::info!("  API: http://{}/api/info", server.address());
    tracing::info!("  Health: http://{}/health", server.address());

    server.start().await?;

    Ok(())
}

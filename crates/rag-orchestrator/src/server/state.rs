//! Application state for the HTTP server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::providers::{
    DocumentStore, EmbeddingProvider, LlmProvider, LocalVectorIndex, OllamaProvider, VectorIndex,
};
use crate::storage::SqliteStore;
use crate::workflow::{StepJournal, WorkflowEngine};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Durable workflow engine running the orchestrator
    engine: WorkflowEngine,
    /// Relational store (documents and chunks)
    store: Arc<dyn DocumentStore>,
    /// Vector index
    index: Arc<dyn VectorIndex>,
    /// Embedding provider
    embeddings: Arc<dyn EmbeddingProvider>,
    /// LLM provider
    llm: Arc<dyn LlmProvider>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Build state with Ollama providers, SQLite and the local vector index
    pub async fn new(config: RagConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!("Initializing orchestrator state...");

        let (embedder, llm) = OllamaProvider::new(&config.llm, &config.embeddings)?.split();
        tracing::info!(
            "Ollama providers initialized (embed: {}, generate: {})",
            config.llm.embed_model,
            config.llm.generate_model
        );

        let store = Arc::new(SqliteStore::new(&config.storage.database_path)?);
        tracing::info!("Database opened at {}", config.storage.database_path.display());

        let index = match &config.storage.vector_index_path {
            Some(path) => LocalVectorIndex::open(config.embeddings.dimensions, path.clone())?,
            None => LocalVectorIndex::new(config.embeddings.dimensions),
        };

        Self::from_parts(
            config,
            Arc::new(embedder),
            Arc::new(llm),
            store.clone(),
            store,
            Arc::new(index),
        )
        .await
    }

    /// Build state from explicit collaborators
    pub async fn from_parts(
        config: RagConfig,
        embeddings: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn DocumentStore>,
        journal: Arc<dyn StepJournal>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let orchestrator = Orchestrator::from_config(
            &config,
            Arc::clone(&embeddings),
            Arc::clone(&llm),
            Arc::clone(&store),
            Arc::clone(&index),
        )?;

        let engine = WorkflowEngine::new(config.workflow.clone(), journal, Arc::new(orchestrator));

        if config.workflow.resume_on_startup {
            engine.resume_incomplete().await?;
        }

        let state = Self {
            inner: Arc::new(AppStateInner {
                config,
                engine,
                store,
                index,
                embeddings,
                llm,
                ready: RwLock::new(false),
            }),
        };

        state.set_ready(true);
        tracing::info!("Orchestrator state initialized");

        Ok(state)
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.inner.engine
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.store
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.inner.index
    }

    pub fn embeddings(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embeddings
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}

//! Configuration for the orchestrator

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RagConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Ollama/LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Storage locations
    #[serde(default)]
    pub storage: StorageConfig,
    /// Durable workflow execution
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: RagConfig = toml::from_str(&raw).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Validate every section. Called before any pipeline runs.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.embeddings.validate()?;
        self.retrieval.validate()?;
        self.workflow.validate()?;
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size in bytes (default: 10MB)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingConfig {
    /// Overlap must leave room for forward progress.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than zero"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider batch-size ceiling (texts per embedding call)
    pub batch_size: usize,
    /// Embedding dimensions (768 for nomic-embed-text)
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            dimensions: 768,
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("embeddings.batch_size must be greater than zero"));
        }
        if self.dimensions == 0 {
            return Err(Error::config("embeddings.dimensions must be greater than zero"));
        }
        Ok(())
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name (planning and synthesis)
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "llama3.2:3b".to_string(),
            temperature: 0.2,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Nearest neighbours fetched per sub-query
    pub top_k: usize,
    /// Upper bound on planner sub-queries
    pub max_sub_queries: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_sub_queries: 3,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be greater than zero"));
        }
        if self.max_sub_queries == 0 {
            return Err(Error::config("retrieval.max_sub_queries must be greater than zero"));
        }
        Ok(())
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database holding documents, chunks and the step journal
    pub database_path: PathBuf,
    /// Append-only upsert log for the local vector index (in-memory only when unset)
    #[serde(default)]
    pub vector_index_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rag-orchestrator");

        Self {
            database_path: base.join("orchestrator.db"),
            vector_index_path: Some(base.join("vectors.jsonl")),
        }
    }
}

/// Durable workflow execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Instances executed concurrently
    pub worker_count: usize,
    /// Attempts per instance before it is marked failed
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on each subsequent attempt
    pub retry_backoff_ms: u64,
    /// Re-enqueue unfinished instances when the engine starts
    pub resume_on_startup: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().min(4),
            max_attempts: 3,
            retry_backoff_ms: 500,
            resume_on_startup: true,
        }
    }
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::config("workflow.worker_count must be greater than zero"));
        }
        if self.max_attempts == 0 {
            return Err(Error::config("workflow.max_attempts must be at least 1"));
        }
        Ok(())
    }

    /// Backoff before the given retry (1-based)
    pub fn backoff_for(&self, retry: u32) -> std::time::Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        std::time::Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        RagConfig::default().validate().unwrap();
    }

    #[test]
    fn test_overlap_not_smaller_than_size_is_rejected() {
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 150,
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let config = EmbeddingConfig {
            batch_size: 0,
            dimensions: 4,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rag.toml");
        std::fs::write(
            &path,
            r#"
            [chunking]
            chunk_size = 500
            chunk_overlap = 0

            [retrieval]
            top_k = 5
            max_sub_queries = 2
            "#,
        )
        .unwrap();

        let config = RagConfig::load(&path).unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 0);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.embeddings.batch_size, 20);
    }

    #[test]
    fn test_backoff_doubles() {
        let config = WorkflowConfig {
            retry_backoff_ms: 100,
            ..Default::default()
        };
        assert_eq!(config.backoff_for(1).as_millis(), 100);
        assert_eq!(config.backoff_for(2).as_millis(), 200);
        assert_eq!(config.backoff_for(3).as_millis(), 400);
    }
}

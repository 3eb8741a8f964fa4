//! Collaborator abstractions for embeddings, generation, vector search and
//! the relational store
//!
//! Pipelines receive these as trait objects at construction, so tests can
//! substitute fakes for any of them.

pub mod document_store;
pub mod embedding;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod vector_store;

pub use document_store::DocumentStore;
pub use embedding::EmbeddingProvider;
pub use llm::{GenerationRequest, LlmProvider};
pub use local::LocalVectorIndex;
pub use ollama::{OllamaEmbedder, OllamaLlm, OllamaProvider};
pub use vector_store::{VectorIndex, VectorMetadata, VectorRecord};

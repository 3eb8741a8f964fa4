//! Vector index trait for storing and searching chunk embeddings

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::VectorMatch;

/// Metadata attached to each stored vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VectorMetadata {
    pub document_id: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// One vector keyed by chunk id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `LocalVectorIndex`: in-process cosine index
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace vectors by id
    async fn upsert(&self, items: &[VectorRecord]) -> Result<()>;

    /// Nearest neighbours of `vector`, best first
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>>;

    /// Get total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if index is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Get provider name for logging
    fn name(&self) -> &str;
}

//! Retrieval result types

use serde::{Deserialize, Serialize};

/// Raw nearest-neighbour hit from the vector index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorMatch {
    /// Chunk id
    pub id: String,
    /// Similarity, higher is better
    pub score: f32,
}

impl VectorMatch {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Ranked, hydrated passage handed to the synthesizer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Chunk id, unique within one research request
    pub id: String,
    pub content: String,
    pub score: f32,
    /// Inherited from the owning document
    pub source_url: Option<String>,
}

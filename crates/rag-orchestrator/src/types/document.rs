//! Document and chunk types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::providers::vector_store::{VectorMetadata, VectorRecord};

/// A document that has been ingested. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Opaque identifier, generated once per ingestion instance
    pub id: String,
    /// Origin reference supplied by the caller
    pub source_url: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Caller-supplied metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A contiguous slice of a document's text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// `{document_id}_{index}`
    pub id: String,
    /// Owning document
    pub document_id: String,
    /// Zero-based position within the document
    pub index: u32,
    /// Text content
    pub content: String,
}

impl Chunk {
    /// Create a chunk with its id derived from the owning document and position
    pub fn new(document_id: &str, index: u32, content: String) -> Self {
        Self {
            id: Self::derive_id(document_id, index),
            document_id: document_id.to_string(),
            index,
            content,
        }
    }

    /// Chunk ids are a pure function of document id and index so a replayed
    /// step reproduces them exactly.
    pub fn derive_id(document_id: &str, index: u32) -> String {
        format!("{}_{}", document_id, index)
    }

    /// Build the vector-index record for this chunk
    pub fn to_vector_record(&self, values: Vec<f32>, source: Option<&str>) -> VectorRecord {
        VectorRecord {
            id: self.id.clone(),
            values,
            metadata: VectorMetadata {
                document_id: self.document_id.clone(),
                source: source.map(str::to_string),
            },
        }
    }
}

/// Chunk content joined with its owning document's origin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HydratedChunk {
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub source_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_is_derived() {
        let chunk = Chunk::new("doc-1", 3, "text".to_string());
        assert_eq!(chunk.id, "doc-1_3");
        assert_eq!(chunk.id, Chunk::derive_id("doc-1", 3));
    }

    #[test]
    fn test_vector_record_carries_document() {
        let chunk = Chunk::new("doc-1", 0, "text".to_string());
        let record = chunk.to_vector_record(vec![1.0, 0.0], Some("https://example.com"));
        assert_eq!(record.id, "doc-1_0");
        assert_eq!(record.metadata.document_id, "doc-1");
        assert_eq!(record.metadata.source.as_deref(), Some("https://example.com"));
    }
}

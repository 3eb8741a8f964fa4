//! Relational store trait for document and chunk rows

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Chunk, Document, HydratedChunk};

/// Trait for the relational store holding documents and chunks
///
/// Writes use insert-or-replace semantics so a re-executed step converges on
/// the same rows instead of duplicating them.
///
/// Implementations:
/// - `SqliteStore`: local SQLite database
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace a document row
    async fn insert_document(&self, document: &Document) -> Result<()>;

    /// Insert or replace chunk rows atomically
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Batched lookup of chunks by id, joined with the owning document's
    /// `source_url`. Unknown ids are omitted.
    async fn get_chunks(&self, ids: &[String]) -> Result<Vec<HydratedChunk>>;

    /// Fetch a document by id
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// Number of document rows
    async fn count_documents(&self) -> Result<usize>;

    /// Number of chunk rows
    async fn count_chunks(&self) -> Result<usize>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

//! Ingestion pipeline: chunk, embed in batches, persist rows and vectors
//!
//! Step layout for one instance:
//!
//! | step | effect |
//! |---|---|
//! | `generate-document-id` | new document id and timestamp |
//! | `store-document` | document row (insert-or-replace) |
//! | `embed-batch-{i}` | one embedding call for group `i` |
//! | `persist-batch-{i}` | chunk rows and vectors for group `i`, together |
//!
//! Chunking runs outside any step; it is deterministic, so every attempt
//! reproduces the same chunk contents and, once the document id is replayed,
//! the same chunk ids.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::providers::{DocumentStore, VectorIndex, VectorRecord};
use crate::types::{Chunk, Document, IngestParams, IngestReport};
use crate::workflow::StepContext;

use super::chunker::Chunker;
use super::embedder::BatchEmbedder;

pub struct IngestionPipeline {
    chunker: Chunker,
    embedder: BatchEmbedder,
    store: Arc<dyn DocumentStore>,
    index: Arc<dyn VectorIndex>,
}

impl IngestionPipeline {
    pub fn new(
        chunker: Chunker,
        embedder: BatchEmbedder,
        store: Arc<dyn DocumentStore>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            store,
            index,
        }
    }

    pub async fn run(&self, ctx: &StepContext, params: &IngestParams) -> Result<IngestReport> {
        let contents = self.chunker.split(&params.content);
        if contents.is_empty() {
            tracing::info!(instance = %ctx.instance_id(), "Empty document; nothing to ingest");
            return Ok(IngestReport::empty());
        }

        let document: Document = ctx
            .run("generate-document-id", move || async move {
                Ok(Document {
                    id: Uuid::new_v4().to_string(),
                    source_url: params.source_url.clone(),
                    created_at: Utc::now(),
                    metadata: params.metadata.clone(),
                })
            })
            .await?;

        let store = &self.store;
        let index = &self.index;
        let embedder = &self.embedder;
        let doc = &document;

        ctx.run("store-document", move || async move {
            store.insert_document(doc).await
        })
        .await?;

        let chunks: Vec<Chunk> = contents
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk::new(&document.id, i as u32, content))
            .collect();

        tracing::info!(
            document = %document.id,
            "Chunked into {} chunks ({} batches)",
            chunks.len(),
            embedder.partition(&chunks).len()
        );

        let mut embedded_groups: Vec<Vec<Vec<f32>>> = Vec::new();
        for (i, group) in embedder.partition(&chunks).enumerate() {
            let texts: Vec<String> = group.iter().map(|c| c.content.clone()).collect();
            let texts = &texts;

            let vectors = ctx
                .run(&format!("embed-batch-{}", i), move || async move {
                    embedder.embed_group(texts).await
                })
                .await?;
            embedded_groups.push(vectors);
        }

        let source = document.source_url.as_deref();
        for (i, (group, vectors)) in embedder
            .partition(&chunks)
            .zip(&embedded_groups)
            .enumerate()
        {
            ctx.run(&format!("persist-batch-{}", i), move || async move {
                let records: Vec<VectorRecord> = group
                    .iter()
                    .zip(vectors)
                    .map(|(chunk, values)| chunk.to_vector_record(values.clone(), source))
                    .collect();

                tokio::try_join!(store.insert_chunks(group), index.upsert(&records))?;
                Ok(())
            })
            .await?;
        }

        tracing::info!(
            document = %document.id,
            "Ingested {} chunks",
            chunks.len()
        );

        Ok(IngestReport::ingested(document.id.clone(), chunks.len()))
    }
}

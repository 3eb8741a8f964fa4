//! Parallel vector search and chunk hydration

use futures_util::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::ingestion::BatchEmbedder;
use crate::providers::{DocumentStore, VectorIndex};
use crate::types::{SearchResult, VectorMatch};

/// Issues one nearest-neighbour query per sub-query and hydrates the
/// matches against the relational store
pub struct Retriever {
    embedder: BatchEmbedder,
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn DocumentStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: BatchEmbedder,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn DocumentStore>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
            top_k,
        }
    }

    /// Embed all sub-queries, search them concurrently and union the matches
    pub async fn gather(&self, sub_queries: &[String]) -> Result<Vec<VectorMatch>> {
        if sub_queries.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embedder.embed_all(sub_queries).await?;

        let searches = vectors
            .iter()
            .map(|vector| self.index.query(vector, self.top_k));
        let per_query = try_join_all(searches).await?;

        for (query, matches) in sub_queries.iter().zip(&per_query) {
            tracing::debug!("Sub-query {:?} matched {} chunks", query, matches.len());
        }

        Ok(per_query.into_iter().flatten().collect())
    }

    /// Load content and source for ranked matches with a single store lookup.
    ///
    /// Output follows the order of `ranked`; ids the store does not know are
    /// dropped.
    pub async fn hydrate(&self, ranked: &[VectorMatch]) -> Result<Vec<SearchResult>> {
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ranked.iter().map(|m| m.id.clone()).collect();
        let mut rows: HashMap<String, _> = self
            .store
            .get_chunks(&ids)
            .await?
            .into_iter()
            .map(|chunk| (chunk.id.clone(), chunk))
            .collect();

        let results: Vec<SearchResult> = ranked
            .iter()
            .filter_map(|m| {
                rows.remove(&m.id).map(|chunk| SearchResult {
                    id: chunk.id,
                    content: chunk.content,
                    score: m.score,
                    source_url: chunk.source_url,
                })
            })
            .collect();

        if results.len() < ranked.len() {
            tracing::warn!(
                "{} matched chunks missing from the store",
                ranked.len() - results.len()
            );
        }

        Ok(results)
    }
}

//! Batched embedding under a provider batch-size ceiling

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;

/// Calls the embedding provider in consecutive groups of at most
/// `batch_size` texts
#[derive(Clone)]
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl BatchEmbedder {
    /// The effective batch size is the smaller of the configured size and the
    /// provider's own ceiling.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Result<Self> {
        let batch_size = batch_size.min(provider.max_batch_size());
        if batch_size == 0 {
            return Err(Error::config(format!(
                "Embedding batch size must be greater than zero (provider {})",
                provider.name()
            )));
        }

        Ok(Self {
            provider,
            batch_size,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Consecutive groups of at most `batch_size` items
    pub fn partition<'a, T>(&self, items: &'a [T]) -> std::slice::Chunks<'a, T> {
        items.chunks(self.batch_size)
    }

    /// Embed one group with a single provider call
    pub async fn embed_group(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.len() > self.batch_size {
            return Err(Error::embedding(format!(
                "Group of {} texts exceeds batch size {}",
                texts.len(),
                self.batch_size
            )));
        }

        let vectors = self.provider.embed_batch(texts).await?;

        if vectors.len() != texts.len() {
            return Err(Error::embedding(format!(
                "Provider {} returned {} vectors for {} texts",
                self.provider.name(),
                vectors.len(),
                texts.len()
            )));
        }

        Ok(vectors)
    }

    /// Embed every text, one provider call per group, preserving input order
    pub async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (i, group) in self.partition(texts).enumerate() {
            tracing::debug!("Embedding group {} ({} texts)", i, group.len());
            vectors.extend(self.embed_group(group).await?);
        }

        Ok(vectors)
    }
}

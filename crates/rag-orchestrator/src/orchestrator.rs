//! Single entry point dispatching workflow events to their pipeline

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::{AnswerSynthesizer, Planner};
use crate::ingestion::{BatchEmbedder, Chunker, IngestionPipeline};
use crate::providers::{DocumentStore, EmbeddingProvider, LlmProvider, VectorIndex};
use crate::research::ResearchPipeline;
use crate::retrieval::Retriever;
use crate::types::{WorkflowEvent, WorkflowOutput};
use crate::workflow::{StepContext, Workflow};

/// Owns both pipelines; holds no state of its own
pub struct Orchestrator {
    ingestion: IngestionPipeline,
    research: ResearchPipeline,
}

impl Orchestrator {
    pub fn new(ingestion: IngestionPipeline, research: ResearchPipeline) -> Self {
        Self {
            ingestion,
            research,
        }
    }

    /// Wire both pipelines from configuration and injected collaborators.
    /// Invalid chunking or batching configuration is rejected here, before
    /// any instance runs.
    pub fn from_config(
        config: &RagConfig,
        embeddings: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn DocumentStore>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        config.validate()?;

        let embedder = BatchEmbedder::new(embeddings, config.embeddings.batch_size)?;

        let ingestion = IngestionPipeline::new(
            Chunker::new(&config.chunking)?,
            embedder.clone(),
            Arc::clone(&store),
            Arc::clone(&index),
        );

        let research = ResearchPipeline::new(
            Planner::new(Arc::clone(&llm), config.retrieval.max_sub_queries),
            Retriever::new(embedder, index, store, config.retrieval.top_k),
            AnswerSynthesizer::new(llm),
        );

        Ok(Self::new(ingestion, research))
    }
}

#[async_trait]
impl Workflow for Orchestrator {
    async fn run(&self, ctx: &StepContext, event: &WorkflowEvent) -> Result<WorkflowOutput> {
        match event {
            WorkflowEvent::Ingest(params) => self
                .ingestion
                .run(ctx, params)
                .await
                .map(WorkflowOutput::Ingest),
            WorkflowEvent::Research(params) => self
                .research
                .run(ctx, params)
                .await
                .map(WorkflowOutput::Research),
        }
    }
}

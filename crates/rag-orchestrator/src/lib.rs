//! rag-orchestrator: replay-safe ingestion and research pipelines for RAG
//!
//! Documents are chunked, embedded in bounded batches and written to a
//! relational store and a vector index. Questions are decomposed into
//! sub-queries, answered from ranked passages and returned with citations.
//! Every side-effecting step runs inside a durable workflow instance whose
//! step results are journaled, so a retried instance never repeats work
//! that already completed.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod orchestrator;
pub mod providers;
pub mod research;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
pub use types::{
    AgentPlan, Chunk, IngestParams, IngestReport, ResearchParams, ResearchReport, SearchResult,
    WorkflowEvent, WorkflowOutput,
};
pub use workflow::{InstanceStatus, WorkflowEngine};

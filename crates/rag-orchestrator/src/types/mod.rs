//! Core types for the orchestrator

pub mod document;
pub mod plan;
pub mod search;
pub mod workflow;

pub use document::{Chunk, Document, HydratedChunk};
pub use plan::AgentPlan;
pub use search::{SearchResult, VectorMatch};
pub use workflow::{
    IngestParams, IngestReport, IngestStatus, ResearchParams, ResearchReport, WorkflowEvent,
    WorkflowKind, WorkflowOutput,
};

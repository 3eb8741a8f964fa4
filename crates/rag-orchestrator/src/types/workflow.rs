//! Workflow payloads and pipeline reports

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::plan::AgentPlan;
use super::search::SearchResult;

/// Event accepted by the orchestrator, dispatched once on its variant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Ingest(IngestParams),
    Research(ResearchParams),
}

impl WorkflowEvent {
    pub fn kind(&self) -> WorkflowKind {
        match self {
            WorkflowEvent::Ingest(_) => WorkflowKind::Ingest,
            WorkflowEvent::Research(_) => WorkflowKind::Research,
        }
    }
}

/// Pipeline selected by an event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Ingest,
    Research,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Ingest => "ingest",
            WorkflowKind::Research => "research",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ingest" => Some(WorkflowKind::Ingest),
            "research" => Some(WorkflowKind::Research),
            _ => None,
        }
    }
}

/// Ingestion request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngestParams {
    /// Raw document text
    pub content: String,
    /// Origin reference
    #[serde(default)]
    pub source_url: Option<String>,
    /// Opaque key-value metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Research request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchParams {
    /// Natural-language question
    pub query: String,
}

/// Terminal outcome of an ingestion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Ingested,
    /// Document text produced no chunks; nothing was written
    Empty,
}

/// Output of the ingestion pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub status: IngestStatus,
    pub document_id: Option<String>,
    pub chunks_processed: usize,
}

impl IngestReport {
    pub fn ingested(document_id: String, chunks_processed: usize) -> Self {
        Self {
            status: IngestStatus::Ingested,
            document_id: Some(document_id),
            chunks_processed,
        }
    }

    pub fn empty() -> Self {
        Self {
            status: IngestStatus::Empty,
            document_id: None,
            chunks_processed: 0,
        }
    }
}

/// Output of the research pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchReport {
    pub plan: AgentPlan,
    pub answer: String,
    /// Distinct non-null source URLs in ranked order
    pub sources: Vec<String>,
    /// Chunk ids cited in the answer
    #[serde(default)]
    pub citations: Vec<String>,
    /// Ranked passages used as context
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// Output recorded for a finished instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WorkflowOutput {
    Ingest(IngestReport),
    Research(ResearchReport),
}

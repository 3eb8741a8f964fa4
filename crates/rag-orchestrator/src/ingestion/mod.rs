//! Document ingestion: chunking, batched embedding and persistence

mod chunker;
mod embedder;
mod pipeline;

pub use chunker::Chunker;
pub use embedder::BatchEmbedder;
pub use pipeline::IngestionPipeline;

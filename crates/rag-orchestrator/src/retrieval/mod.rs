//! Retrieval: parallel vector search, hydration, deduplication and ranking

mod ranking;
mod retriever;

pub use ranking::dedupe_and_rank;
pub use retriever::Retriever;

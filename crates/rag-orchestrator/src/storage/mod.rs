//! Storage module for persistent data storage
//!
//! Provides SQLite-based persistence for documents, chunks and the workflow
//! step journal.

mod database;

pub use database::{InstanceRecord, InstanceState, SqliteStore};

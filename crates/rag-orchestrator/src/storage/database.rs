//! SQLite database for documents, chunks and the workflow step journal
//!
//! One connection guarded by a mutex serves both the relational store
//! contract ([`DocumentStore`]) and the durable step journal ([`StepJournal`]).

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::providers::DocumentStore;
use crate::types::{Chunk, Document, HydratedChunk, WorkflowEvent, WorkflowKind};
use crate::workflow::StepJournal;

/// SQLite-backed store
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::database(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
        "#,
        )
        .map_err(|e| Error::database(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                source_url TEXT,
                created_at INTEGER,
                metadata TEXT
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT,
                chunk_index INTEGER,
                content TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id);

            CREATE TABLE IF NOT EXISTS workflow_instances (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                state TEXT NOT NULL,
                output TEXT,
                error TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_workflow_instances_state ON workflow_instances(state);

            CREATE TABLE IF NOT EXISTS workflow_steps (
                instance_id TEXT NOT NULL,
                name TEXT NOT NULL,
                output TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                PRIMARY KEY (instance_id, name)
            );
        "#,
        )
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Database migrations complete");
        Ok(())
    }
}

// ==================== Relational Store ====================

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_document(&self, document: &Document) -> Result<()> {
        let conn = self.conn.lock();
        let metadata = serde_json::to_string(&document.metadata)?;

        conn.execute(
            "INSERT OR REPLACE INTO documents (id, source_url, created_at, metadata) VALUES (?1, ?2, ?3, ?4)",
            params![
                document.id,
                document.source_url,
                document.created_at.timestamp_millis(),
                metadata,
            ],
        )
        .map_err(|e| Error::database(format!("Failed to insert document: {}", e)))?;

        Ok(())
    }

    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::database(format!("Failed to begin transaction: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO chunks (id, document_id, chunk_index, content) VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|e| Error::database(format!("Failed to prepare statement: {}", e)))?;

            for chunk in chunks {
                stmt.execute(params![chunk.id, chunk.document_id, chunk.index as i64, chunk.content])
                    .map_err(|e| Error::database(format!("Failed to insert chunk {}: {}", chunk.id, e)))?;
            }
        }

        tx.commit()
            .map_err(|e| Error::database(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn get_chunks(&self, ids: &[String]) -> Result<Vec<HydratedChunk>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            r#"
            SELECT c.id, c.document_id, c.content, d.source_url
            FROM chunks c
            LEFT JOIN documents d ON d.id = c.document_id
            WHERE c.id IN ({})
            "#,
            placeholders
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                Ok(HydratedChunk {
                    id: row.get(0)?,
                    document_id: row.get(1)?,
                    content: row.get(2)?,
                    source_url: row.get(3)?,
                })
            })
            .map_err(|e| Error::database(format!("Failed to hydrate chunks: {}", e)))?;

        let mut chunks = Vec::with_capacity(ids.len());
        for row in rows {
            chunks.push(row?);
        }
        Ok(chunks)
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock();

        let document = conn
            .query_row(
                "SELECT id, source_url, created_at, metadata FROM documents WHERE id = ?1",
                params![id],
                row_to_document,
            )
            .optional()
            .map_err(|e| Error::database(format!("Failed to get document: {}", e)))?;

        Ok(document)
    }

    async fn count_documents(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn count_chunks(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

// ==================== Step Journal ====================

/// Lifecycle of a workflow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Queued,
    Running,
    Complete,
    Failed,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Queued => "queued",
            InstanceState::Running => "running",
            InstanceState::Complete => "complete",
            InstanceState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(InstanceState::Queued),
            "running" => Some(InstanceState::Running),
            "complete" => Some(InstanceState::Complete),
            "failed" => Some(InstanceState::Failed),
            _ => None,
        }
    }

    /// No further execution will happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceState::Complete | InstanceState::Failed)
    }
}

/// Persisted workflow instance
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub id: Uuid,
    pub kind: WorkflowKind,
    pub payload: WorkflowEvent,
    pub state: InstanceState,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstanceRecord {
    /// New queued instance for an event
    pub fn queued(id: Uuid, payload: WorkflowEvent) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind: payload.kind(),
            payload,
            state: InstanceState::Queued,
            output: None,
            error: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

const INSTANCE_COLUMNS: &str =
    "id, kind, payload, state, output, error, attempts, created_at, updated_at";

#[async_trait]
impl StepJournal for SqliteStore {
    async fn create_instance(&self, record: &InstanceRecord) -> Result<()> {
        let conn = self.conn.lock();
        let payload = serde_json::to_string(&record.payload)?;
        let output = record.output.as_ref().map(serde_json::to_string).transpose()?;

        conn.execute(
            &format!(
                "INSERT INTO workflow_instances ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                INSTANCE_COLUMNS
            ),
            params![
                record.id.to_string(),
                record.kind.as_str(),
                payload,
                record.state.as_str(),
                output,
                record.error,
                record.attempts as i64,
                format_timestamp(record.created_at),
                format_timestamp(record.updated_at),
            ],
        )
        .map_err(|e| Error::database(format!("Failed to create instance: {}", e)))?;

        Ok(())
    }

    async fn get_instance(&self, id: Uuid) -> Result<Option<InstanceRecord>> {
        let conn = self.conn.lock();

        let record = conn
            .query_row(
                &format!("SELECT {} FROM workflow_instances WHERE id = ?1", INSTANCE_COLUMNS),
                params![id.to_string()],
                row_to_instance,
            )
            .optional()
            .map_err(|e| Error::database(format!("Failed to get instance: {}", e)))?;

        Ok(record)
    }

    async fn update_instance(
        &self,
        id: Uuid,
        state: InstanceState,
        output: Option<&Value>,
        error: Option<&str>,
        attempts: u32,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let output = output.map(serde_json::to_string).transpose()?;

        let updated = conn
            .execute(
                r#"
                UPDATE workflow_instances
                SET state = ?2, output = ?3, error = ?4, attempts = ?5, updated_at = ?6
                WHERE id = ?1
                "#,
                params![
                    id.to_string(),
                    state.as_str(),
                    output,
                    error,
                    attempts as i64,
                    format_timestamp(Utc::now()),
                ],
            )
            .map_err(|e| Error::database(format!("Failed to update instance: {}", e)))?;

        if updated == 0 {
            return Err(Error::NotFound(format!("Instance {} not found", id)));
        }
        Ok(())
    }

    async fn load_step(&self, id: Uuid, name: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock();

        let raw: Option<String> = conn
            .query_row(
                "SELECT output FROM workflow_steps WHERE instance_id = ?1 AND name = ?2",
                params![id.to_string(), name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::database(format!("Failed to load step {}: {}", name, e)))?;

        raw.map(|s| serde_json::from_str(&s).map_err(Error::from))
            .transpose()
    }

    async fn save_step(&self, id: Uuid, name: &str, output: &Value) -> Result<()> {
        let conn = self.conn.lock();

        // First write wins: a journaled result is replayed verbatim forever.
        conn.execute(
            r#"
            INSERT OR IGNORE INTO workflow_steps (instance_id, name, output, completed_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                id.to_string(),
                name,
                serde_json::to_string(output)?,
                format_timestamp(Utc::now()),
            ],
        )
        .map_err(|e| Error::database(format!("Failed to save step {}: {}", name, e)))?;

        Ok(())
    }

    async fn completed_steps(&self, id: Uuid) -> Result<Vec<String>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT name FROM workflow_steps WHERE instance_id = ?1 ORDER BY rowid")
            .map_err(|e| Error::database(format!("Failed to prepare query: {}", e)))?;

        let names = stmt
            .query_map(params![id.to_string()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(names)
    }

    async fn incomplete_instances(&self) -> Result<Vec<InstanceRecord>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM workflow_instances WHERE state IN ('queued', 'running') ORDER BY created_at",
                INSTANCE_COLUMNS
            ))
            .map_err(|e| Error::database(format!("Failed to prepare query: {}", e)))?;

        let records = stmt
            .query_map([], row_to_instance)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    async fn recent_instances(&self, limit: usize) -> Result<Vec<InstanceRecord>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM workflow_instances ORDER BY created_at DESC LIMIT ?1",
                INSTANCE_COLUMNS
            ))
            .map_err(|e| Error::database(format!("Failed to prepare query: {}", e)))?;

        let records = stmt
            .query_map(params![limit as i64], row_to_instance)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Fixed precision so stored timestamps sort lexically
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    let created_at_ms: i64 = row.get(2)?;
    let metadata: Option<String> = row.get(3)?;

    Ok(Document {
        id: row.get(0)?,
        source_url: row.get(1)?,
        created_at: Utc
            .timestamp_millis_opt(created_at_ms)
            .single()
            .unwrap_or_default(),
        metadata: match metadata {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| conversion_error(3, e))?,
            None => Default::default(),
        },
    })
}

fn row_to_instance(row: &rusqlite::Row) -> rusqlite::Result<InstanceRecord> {
    let id: String = row.get(0)?;
    let kind: String = row.get(1)?;
    let payload: String = row.get(2)?;
    let state: String = row.get(3)?;
    let output: Option<String> = row.get(4)?;
    let error: Option<String> = row.get(5)?;
    let attempts: i64 = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(InstanceRecord {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        kind: WorkflowKind::parse(&kind).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(1, format!("kind '{}'", kind), Type::Text)
        })?,
        payload: serde_json::from_str(&payload).map_err(|e| conversion_error(2, e))?,
        state: InstanceState::parse(&state).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(3, format!("state '{}'", state), Type::Text)
        })?,
        output: output
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| conversion_error(4, e))?,
        error,
        attempts: attempts as u32,
        created_at: parse_timestamp(7, &created_at)?,
        updated_at: parse_timestamp(8, &updated_at)?,
    })
}

//! Local vector index using brute-force cosine similarity
//!
//! Vectors live in a `DashMap` keyed by chunk id. When a log path is
//! configured each upsert appends its records to a JSON-lines file on the
//! blocking pool. `open` replays the log with last write winning and then
//! compacts it to one line per id.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::VectorMatch;

use super::vector_store::{VectorIndex, VectorRecord};

/// In-process vector index
pub struct LocalVectorIndex {
    /// Vectors keyed by chunk id
    vectors: Arc<DashMap<String, VectorRecord>>,
    /// Expected dimensions
    dimensions: usize,
    /// Append handle of the upsert log, if persistence is enabled
    log: Option<Arc<Mutex<File>>>,
}

impl LocalVectorIndex {
    /// Create an empty, memory-only index
    pub fn new(dimensions: usize) -> Self {
        Self {
            vectors: Arc::new(DashMap::new()),
            dimensions,
            log: None,
        }
    }

    /// Open an index backed by an upsert log, replaying it if it exists
    pub fn open(dimensions: usize, path: PathBuf) -> Result<Self> {
        let vectors = DashMap::new();

        if path.exists() {
            let lines = replay_log(&path, &vectors)?;
            tracing::info!(
                "Loaded {} vectors from {} ({} log entries)",
                vectors.len(),
                path.display(),
                lines
            );
            if lines > vectors.len() {
                compact_log(&path, &vectors)?;
            }
        } else if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            vectors: Arc::new(vectors),
            dimensions,
            log: Some(Arc::new(Mutex::new(file))),
        })
    }

    fn check_dimensions(&self, values: &[f32]) -> Result<()> {
        if values.len() != self.dimensions {
            return Err(Error::vector_db(format!(
                "Expected {} dimensions, got {}",
                self.dimensions,
                values.len()
            )));
        }
        Ok(())
    }
}

/// Load every log line into `vectors`, later lines replacing earlier ones.
/// Returns the number of lines read.
fn replay_log(path: &Path, vectors: &DashMap<String, VectorRecord>) -> Result<usize> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = 0;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: VectorRecord = serde_json::from_str(&line)?;
        vectors.insert(record.id.clone(), record);
        lines += 1;
    }

    Ok(lines)
}

/// Rewrite the log with one line per live record
fn compact_log(path: &Path, vectors: &DashMap<String, VectorRecord>) -> Result<()> {
    let mut records: Vec<VectorRecord> = vectors.iter().map(|entry| entry.value().clone()).collect();
    records.sort_by(|a, b| a.id.cmp(&b.id));

    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for record in &records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;

    tracing::info!("Compacted vector log to {} entries", records.len());
    Ok(())
}

/// Cosine similarity; zero when either vector has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    async fn upsert(&self, items: &[VectorRecord]) -> Result<()> {
        for item in items {
            self.check_dimensions(&item.values)?;
        }

        let Some(log) = &self.log else {
            for item in items {
                self.vectors.insert(item.id.clone(), item.clone());
            }
            return Ok(());
        };

        let log = Arc::clone(log);
        let vectors = Arc::clone(&self.vectors);
        let items = items.to_vec();

        // Append and apply under one lock so the log order matches memory
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut buffer = Vec::new();
            for item in &items {
                serde_json::to_writer(&mut buffer, item)?;
                buffer.push(b'\n');
            }

            let mut file = log.lock();
            file.write_all(&buffer)?;
            file.flush()?;

            for item in items {
                vectors.insert(item.id.clone(), item);
            }
            Ok(())
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        self.check_dimensions(vector)?;

        let mut matches: Vec<VectorMatch> = self
            .vectors
            .iter()
            .map(|entry| VectorMatch::new(entry.key().clone(), cosine_similarity(vector, &entry.value().values)))
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);

        Ok(matches)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.vectors.len())
    }

    fn name(&self) -> &str {
        "local-cosine"
    }
}

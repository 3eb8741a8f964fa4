//! Background execution of durable workflow instances
//!
//! Instances are persisted before they are enqueued, executed by a bounded
//! pool of tasks, retried with exponential backoff on transient failures and
//! re-enqueued on startup if the previous process stopped mid-flight.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::error::{Error, Result};
use crate::storage::{InstanceRecord, InstanceState};
use crate::types::{WorkflowEvent, WorkflowKind, WorkflowOutput};

use super::journal::StepJournal;
use super::step::StepContext;

/// Capacity of the dispatch channel
const QUEUE_CAPACITY: usize = 1000;

/// Body of a workflow. Must be deterministic given the event and the
/// outputs of its memoized steps.
#[async_trait]
pub trait Workflow: Send + Sync {
    async fn run(&self, ctx: &StepContext, event: &WorkflowEvent) -> Result<WorkflowOutput>;
}

/// Externally visible view of an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    pub id: Uuid,
    pub kind: WorkflowKind,
    #[serde(rename = "status")]
    pub state: InstanceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
    /// Completed step names in completion order
    pub steps: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstanceStatus {
    fn from_record(record: InstanceRecord, steps: Vec<String>) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            state: record.state,
            output: record.output,
            error: record.error,
            attempts: record.attempts,
            steps,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Shared between the engine handle and its executor tasks
struct EngineInner {
    journal: Arc<dyn StepJournal>,
    workflow: Arc<dyn Workflow>,
    config: WorkflowConfig,
    /// Instances currently owned by an executor task
    active: DashMap<Uuid, ()>,
    /// Instances enqueued but not yet finished
    queue_size: AtomicUsize,
    /// Hands an instance back to the dispatcher without keeping it alive
    requeue: mpsc::WeakSender<Uuid>,
}

/// Durable workflow engine
pub struct WorkflowEngine {
    inner: Arc<EngineInner>,
    sender: mpsc::Sender<Uuid>,
}

impl WorkflowEngine {
    /// Create the engine and spawn its dispatcher. Must be called inside a
    /// tokio runtime.
    pub fn new(
        config: WorkflowConfig,
        journal: Arc<dyn StepJournal>,
        workflow: Arc<dyn Workflow>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let worker_count = config.worker_count.max(1);

        let inner = Arc::new(EngineInner {
            journal,
            workflow,
            config,
            active: DashMap::new(),
            queue_size: AtomicUsize::new(0),
            requeue: sender.downgrade(),
        });

        tokio::spawn(Self::dispatch(Arc::clone(&inner), receiver, worker_count));

        tracing::info!("Workflow engine started with {} workers", worker_count);

        Self { inner, sender }
    }

    /// Persist a new instance and enqueue it. Returns before any step runs.
    pub async fn create_instance(&self, event: WorkflowEvent) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let kind = event.kind();

        self.inner
            .journal
            .create_instance(&InstanceRecord::queued(id, event))
            .await?;

        self.enqueue(id).await?;
        tracing::info!(instance = %id, kind = kind.as_str(), "Workflow instance created");

        Ok(id)
    }

    /// Current status of an instance
    pub async fn get_status(&self, id: Uuid) -> Result<InstanceStatus> {
        let record = self
            .inner
            .journal
            .get_instance(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Instance {} not found", id)))?;

        let steps = self.inner.journal.completed_steps(id).await?;
        Ok(InstanceStatus::from_record(record, steps))
    }

    /// Most recent instances, newest first
    pub async fn list_instances(&self, limit: usize) -> Result<Vec<InstanceStatus>> {
        let records = self.inner.journal.recent_instances(limit).await?;

        let mut statuses = Vec::with_capacity(records.len());
        for record in records {
            let steps = self.inner.journal.completed_steps(record.id).await?;
            statuses.push(InstanceStatus::from_record(record, steps));
        }
        Ok(statuses)
    }

    /// Re-enqueue every instance left queued or running by a previous process
    pub async fn resume_incomplete(&self) -> Result<usize> {
        let records = self.inner.journal.incomplete_instances().await?;
        let count = records.len();

        for record in records {
            tracing::info!(
                instance = %record.id,
                kind = record.kind.as_str(),
                "Resuming workflow instance (previous attempts: {})",
                record.attempts
            );
            self.enqueue(record.id).await?;
        }

        if count > 0 {
            tracing::info!("Resumed {} incomplete workflow instances", count);
        }
        Ok(count)
    }

    /// Poll until the instance reaches a terminal state
    pub async fn wait_for(&self, id: Uuid, timeout: Duration) -> Result<InstanceStatus> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let status = self.get_status(id).await?;
            if status.state.is_terminal() {
                return Ok(status);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::internal(format!(
                    "Timed out waiting for instance {}",
                    id
                )));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Instances enqueued but not yet finished
    pub fn queue_depth(&self) -> usize {
        self.inner.queue_size.load(Ordering::SeqCst)
    }

    async fn enqueue(&self, id: Uuid) -> Result<()> {
        self.inner.queue_size.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.sender.send(id).await {
            self.inner.queue_size.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::internal(format!("Failed to enqueue instance: {}", e)));
        }
        Ok(())
    }

    async fn dispatch(inner: Arc<EngineInner>, mut receiver: mpsc::Receiver<Uuid>, workers: usize) {
        let semaphore = Arc::new(Semaphore::new(workers));

        while let Some(id) = receiver.recv().await {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };

            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                if inner.active.insert(id, ()).is_none() {
                    let outcome = inner.execute(id).await;
                    inner.active.remove(&id);
                    if let Err(e) = outcome {
                        inner.hand_back(id, e).await;
                    }
                } else {
                    tracing::debug!(instance = %id, "Instance already executing; skipping");
                }
                inner.queue_size.fetch_sub(1, Ordering::SeqCst);
                drop(permit);
            });
        }

        tracing::info!("Workflow dispatcher stopped");
    }
}

impl EngineInner {
    /// Run an instance to a persisted terminal state. An error means the
    /// instance could not be loaded or its terminal state could not be
    /// written, and it must run again.
    async fn execute(&self, id: Uuid) -> Result<()> {
        let Some(record) = self.journal.get_instance(id).await? else {
            tracing::warn!(instance = %id, "Dequeued unknown instance");
            return Ok(());
        };

        if record.state.is_terminal() {
            return Ok(());
        }

        let ctx = StepContext::new(id, Arc::clone(&self.journal));
        let mut attempts = record.attempts;

        for attempt in 1..=self.config.max_attempts {
            attempts += 1;

            let outcome = match self
                .transition(id, InstanceState::Running, None, None, attempts)
                .await
            {
                Ok(()) => self.workflow.run(&ctx, &record.payload).await,
                Err(e) => Err(e),
            };

            let error = match outcome.and_then(|output| Ok(serde_json::to_value(&output)?)) {
                Ok(value) => {
                    self.finish(id, InstanceState::Complete, Some(&value), None, attempts)
                        .await?;
                    tracing::info!(instance = %id, attempts, "Workflow instance complete");
                    return Ok(());
                }
                Err(e) => e,
            };

            if !error.is_retryable() || attempt == self.config.max_attempts {
                let message = error.to_string();
                self.finish(id, InstanceState::Failed, None, Some(&message), attempts)
                    .await?;
                tracing::error!(instance = %id, attempts, "Workflow instance failed: {}", message);
                return Ok(());
            }

            let delay = self.config.backoff_for(attempt);
            tracing::warn!(
                instance = %id,
                "Attempt {}/{} failed: {}; retrying in {:?}",
                attempt,
                self.config.max_attempts,
                error,
                delay
            );
            tokio::time::sleep(delay).await;
        }

        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        state: InstanceState,
        output: Option<&Value>,
        error: Option<&str>,
        attempts: u32,
    ) -> Result<()> {
        self.journal
            .update_instance(id, state, output, error, attempts)
            .await
            .map_err(|e| {
                tracing::warn!(instance = %id, "Failed to persist state {}: {}", state.as_str(), e);
                e
            })
    }

    /// Persist a terminal state, retrying the write with the configured backoff
    async fn finish(
        &self,
        id: Uuid,
        state: InstanceState,
        output: Option<&Value>,
        error: Option<&str>,
        attempts: u32,
    ) -> Result<()> {
        let mut write = 1;
        loop {
            match self.transition(id, state, output, error, attempts).await {
                Ok(()) => return Ok(()),
                Err(e) if write >= self.config.max_attempts => return Err(e),
                Err(_) => {
                    tokio::time::sleep(self.config.backoff_for(write)).await;
                    write += 1;
                }
            }
        }
    }

    /// Re-enqueue an instance whose outcome was not persisted. Its journaled
    /// steps replay on the next run, which writes the terminal state again.
    async fn hand_back(&self, id: Uuid, error: Error) {
        let delay = self.config.backoff_for(self.config.max_attempts);
        tracing::warn!(
            instance = %id,
            "Instance outcome not persisted: {}; re-enqueueing in {:?}",
            error,
            delay
        );
        tokio::time::sleep(delay).await;

        let Some(sender) = self.requeue.upgrade() else {
            tracing::error!(instance = %id, "Engine stopped; instance left for startup resume");
            return;
        };

        self.queue_size.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = sender.try_send(id) {
            self.queue_size.fetch_sub(1, Ordering::SeqCst);
            tracing::error!(instance = %id, "Failed to re-enqueue instance: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use crate::types::{IngestParams, IngestReport, ResearchParams};
    use std::sync::atomic::AtomicUsize;

    const WAIT: Duration = Duration::from_secs(5);

    fn config() -> WorkflowConfig {
        WorkflowConfig {
            worker_count: 2,
            max_attempts: 3,
            retry_backoff_ms: 1,
            resume_on_startup: false,
        }
    }

    fn ingest_event() -> WorkflowEvent {
        WorkflowEvent::Ingest(IngestParams {
            content: "hello".to_string(),
            source_url: None,
            metadata: Default::default(),
        })
    }

    /// Fails after its first step until `failures` attempts have been used up
    struct FlakyWorkflow {
        failures: usize,
        runs: AtomicUsize,
        first_step_calls: Arc<AtomicUsize>,
    }

    impl FlakyWorkflow {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                runs: AtomicUsize::new(0),
                first_step_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Workflow for FlakyWorkflow {
        async fn run(&self, ctx: &StepContext, _event: &WorkflowEvent) -> Result<WorkflowOutput> {
            let calls = Arc::clone(&self.first_step_calls);
            let document_id: String = ctx
                .run("generate-document-id", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Uuid::new_v4().to_string())
                })
                .await?;

            if self.runs.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(Error::vector_db("index unavailable"));
            }

            Ok(WorkflowOutput::Ingest(IngestReport::ingested(document_id, 1)))
        }
    }

    /// SQLite journal whose first `n` writes of the `complete` state fail
    struct LockedOnComplete {
        store: SqliteStore,
        complete_failures: AtomicUsize,
    }

    impl LockedOnComplete {
        fn new(failures: usize) -> Self {
            Self {
                store: SqliteStore::in_memory().unwrap(),
                complete_failures: AtomicUsize::new(failures),
            }
        }
    }

    #[async_trait]
    impl StepJournal for LockedOnComplete {
        async fn create_instance(&self, record: &InstanceRecord) -> Result<()> {
            self.store.create_instance(record).await
        }

        async fn get_instance(&self, id: Uuid) -> Result<Option<InstanceRecord>> {
            self.store.get_instance(id).await
        }

        async fn update_instance(
            &self,
            id: Uuid,
            state: InstanceState,
            output: Option<&Value>,
            error: Option<&str>,
            attempts: u32,
        ) -> Result<()> {
            if state == InstanceState::Complete
                && self
                    .complete_failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Err(Error::database("database is locked"));
            }
            self.store
                .update_instance(id, state, output, error, attempts)
                .await
        }

        async fn load_step(&self, id: Uuid, name: &str) -> Result<Option<Value>> {
            self.store.load_step(id, name).await
        }

        async fn save_step(&self, id: Uuid, name: &str, output: &Value) -> Result<()> {
            self.store.save_step(id, name, output).await
        }

        async fn completed_steps(&self, id: Uuid) -> Result<Vec<String>> {
            self.store.completed_steps(id).await
        }

        async fn incomplete_instances(&self) -> Result<Vec<InstanceRecord>> {
            self.store.incomplete_instances().await
        }

        async fn recent_instances(&self, limit: usize) -> Result<Vec<InstanceRecord>> {
            self.store.recent_instances(limit).await
        }
    }

    struct MisconfiguredWorkflow {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Workflow for MisconfiguredWorkflow {
        async fn run(&self, _ctx: &StepContext, _event: &WorkflowEvent) -> Result<WorkflowOutput> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Err(Error::config("chunk_overlap must be smaller than chunk_size"))
        }
    }

    #[tokio::test]
    async fn test_retry_resumes_after_last_completed_step() {
        let journal = Arc::new(SqliteStore::in_memory().unwrap());
        let workflow = Arc::new(FlakyWorkflow::new(1));
        let engine = WorkflowEngine::new(config(), journal, workflow.clone());

        let id = engine.create_instance(ingest_event()).await.unwrap();
        let status = engine.wait_for(id, WAIT).await.unwrap();

        assert_eq!(status.state, InstanceState::Complete);
        assert_eq!(status.attempts, 2);
        assert_eq!(status.steps, vec!["generate-document-id".to_string()]);
        assert_eq!(workflow.first_step_calls.load(Ordering::SeqCst), 1);
        assert!(status.output.is_some());
    }

    #[tokio::test]
    async fn test_exhausted_attempts_mark_instance_failed() {
        let journal = Arc::new(SqliteStore::in_memory().unwrap());
        let workflow = Arc::new(FlakyWorkflow::new(usize::MAX));
        let engine = WorkflowEngine::new(config(), journal, workflow.clone());

        let id = engine.create_instance(ingest_event()).await.unwrap();
        let status = engine.wait_for(id, WAIT).await.unwrap();

        assert_eq!(status.state, InstanceState::Failed);
        assert_eq!(status.attempts, 3);
        assert!(status.error.unwrap().contains("index unavailable"));
        assert_eq!(workflow.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_config_error_is_not_retried() {
        let journal = Arc::new(SqliteStore::in_memory().unwrap());
        let workflow = Arc::new(MisconfiguredWorkflow {
            runs: AtomicUsize::new(0),
        });
        let engine = WorkflowEngine::new(config(), journal, workflow.clone());

        let id = engine.create_instance(ingest_event()).await.unwrap();
        let status = engine.wait_for(id, WAIT).await.unwrap();

        assert_eq!(status.state, InstanceState::Failed);
        assert_eq!(status.attempts, 1);
        assert_eq!(workflow.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_complete_write_is_retried() {
        let journal = Arc::new(LockedOnComplete::new(1));
        let workflow = Arc::new(FlakyWorkflow::new(0));
        let engine = WorkflowEngine::new(config(), journal, workflow.clone());

        let id = engine.create_instance(ingest_event()).await.unwrap();
        let status = engine.wait_for(id, WAIT).await.unwrap();

        assert_eq!(status.state, InstanceState::Complete);
        assert_eq!(status.attempts, 1);
        assert_eq!(workflow.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unpersisted_outcome_is_handed_back_to_the_queue() {
        let config = WorkflowConfig {
            max_attempts: 2,
            ..config()
        };
        // Both writes of the first run fail; the next run replays and persists
        let journal = Arc::new(LockedOnComplete::new(2));
        let workflow = Arc::new(FlakyWorkflow::new(0));
        let engine = WorkflowEngine::new(config, journal, workflow.clone());

        let id = engine.create_instance(ingest_event()).await.unwrap();
        let status = engine.wait_for(id, WAIT).await.unwrap();

        assert_eq!(status.state, InstanceState::Complete);
        assert_eq!(status.attempts, 2);
        assert_eq!(workflow.runs.load(Ordering::SeqCst), 2);
        assert_eq!(workflow.first_step_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(engine.queue_depth(), 0);
    }

    #[tokio::test]
    async fn test_unknown_instance_is_not_found() {
        let journal = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = WorkflowEngine::new(config(), journal, Arc::new(FlakyWorkflow::new(0)));

        assert!(matches!(
            engine.get_status(Uuid::new_v4()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resume_replays_journaled_steps() {
        let journal = Arc::new(SqliteStore::in_memory().unwrap());

        // An instance left running by a previous process, with its first step done
        let id = Uuid::new_v4();
        journal
            .create_instance(&InstanceRecord::queued(id, ingest_event()))
            .await
            .unwrap();
        journal
            .update_instance(id, InstanceState::Running, None, None, 1)
            .await
            .unwrap();
        journal
            .save_step(id, "generate-document-id", &serde_json::json!("doc-from-before"))
            .await
            .unwrap();

        let workflow = Arc::new(FlakyWorkflow::new(0));
        let engine = WorkflowEngine::new(config(), journal, workflow.clone());
        assert_eq!(engine.resume_incomplete().await.unwrap(), 1);

        let status = engine.wait_for(id, WAIT).await.unwrap();
        assert_eq!(status.state, InstanceState::Complete);
        assert_eq!(status.attempts, 2);
        assert_eq!(workflow.first_step_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            status.output.unwrap()["documentId"],
            serde_json::json!("doc-from-before")
        );
    }

    #[tokio::test]
    async fn test_list_instances_newest_first() {
        let journal = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = WorkflowEngine::new(config(), journal, Arc::new(FlakyWorkflow::new(0)));

        let first = engine.create_instance(ingest_event()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = engine
            .create_instance(WorkflowEvent::Research(ResearchParams {
                query: "q".to_string(),
            }))
            .await
            .unwrap();

        let listed = engine.list_instances(10).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert_eq!(listed[0].kind, WorkflowKind::Research);
    }
}

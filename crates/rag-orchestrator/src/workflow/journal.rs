//! Persistence contract for workflow instances and memoized step outputs

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::{InstanceRecord, InstanceState};

/// Durable record of instances and the steps they have completed.
///
/// A step output, once saved under `(instance_id, name)`, is never replaced.
#[async_trait]
pub trait StepJournal: Send + Sync {
    /// Persist a new instance
    async fn create_instance(&self, record: &InstanceRecord) -> Result<()>;

    /// Look up an instance by id
    async fn get_instance(&self, id: Uuid) -> Result<Option<InstanceRecord>>;

    /// Record a state transition
    async fn update_instance(
        &self,
        id: Uuid,
        state: InstanceState,
        output: Option<&Value>,
        error: Option<&str>,
        attempts: u32,
    ) -> Result<()>;

    /// Journaled output of a step, if it has completed
    async fn load_step(&self, id: Uuid, name: &str) -> Result<Option<Value>>;

    /// Journal a step output
    async fn save_step(&self, id: Uuid, name: &str, output: &Value) -> Result<()>;

    /// Names of completed steps in completion order
    async fn completed_steps(&self, id: Uuid) -> Result<Vec<String>>;

    /// Instances that are queued or were running when the process stopped
    async fn incomplete_instances(&self) -> Result<Vec<InstanceRecord>>;

    /// Most recently created instances first
    async fn recent_instances(&self, limit: usize) -> Result<Vec<InstanceRecord>>;
}

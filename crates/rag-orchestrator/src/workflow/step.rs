//! Memoized step execution

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;

use super::journal::StepJournal;

/// Handle passed to a workflow body for running named, memoized steps.
///
/// A step that completed in an earlier attempt is not re-executed: its
/// journaled output is deserialized and returned instead. Side effects must
/// therefore live inside steps, and step names must be deterministic for a
/// given input.
#[derive(Clone)]
pub struct StepContext {
    instance_id: Uuid,
    journal: Arc<dyn StepJournal>,
}

impl StepContext {
    pub fn new(instance_id: Uuid, journal: Arc<dyn StepJournal>) -> Self {
        Self {
            instance_id,
            journal,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Run `step` at most once per instance under `name`
    pub async fn run<T, F, Fut>(&self, name: &str, step: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(journaled) = self.journal.load_step(self.instance_id, name).await? {
            tracing::debug!(instance = %self.instance_id, step = name, "Replaying journaled step");
            return Ok(serde_json::from_value(journaled)?);
        }

        tracing::debug!(instance = %self.instance_id, step = name, "Executing step");
        let output = step().await?;

        let value = serde_json::to_value(&output)?;
        self.journal.save_step(self.instance_id, name, &value).await?;

        Ok(output)
    }
}

//! Durable step substrate
//!
//! Workflow bodies run named steps through a [`StepContext`]; completed step
//! outputs are journaled so a retried or resumed instance skips straight to
//! the first step that has not finished.

mod engine;
mod journal;
mod step;

pub use engine::{InstanceStatus, Workflow, WorkflowEngine};
pub use journal::StepJournal;
pub use step::StepContext;

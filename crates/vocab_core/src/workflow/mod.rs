//! Workflow task accumulation and execution.
//!
//! # Responsibility
//! - Collect the subtasks that reconciliation schedules, per version.
//! - Persist tasks, run them through registered providers and report
//!   failures back to the caller.
//!
//! # Invariants
//! - Subtasks flow upward from the aggregates into one accumulator owned
//!   by the call; aggregates never hold a reference to their parent.
//! - Execution of a task stops at its first failing subtask.

mod accumulator;
mod outcome;
mod provider;

pub use accumulator::TaskAccumulator;
pub use outcome::{FailedTask, WorkflowOutcome};
pub use provider::{
    ProviderError, ProviderRegistry, ProviderRegistryError, TaskInfo, WorkflowProvider,
};

//! Caller-facing summary of workflow execution.

use crate::model::task::{SubtaskResult, TaskId, TaskStatus};
use crate::model::version::VersionId;
use crate::model::vocabulary::VocabularyId;
use serde::Serialize;

/// Tasks of one call that did not finish successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOutcome {
    pub vocabulary_id: VocabularyId,
    pub failed_tasks: Vec<FailedTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTask {
    pub task_id: TaskId,
    pub version_id: VersionId,
    /// `Partial` or `Error`.
    pub status: TaskStatus,
    /// Per-subtask results up to and including the failing one.
    pub response: Vec<SubtaskResult>,
}

impl FailedTask {
    /// Message of the subtask that stopped the task.
    pub fn failure_message(&self) -> Option<&str> {
        self.response
            .iter()
            .find(|result| !result.succeeded)
            .and_then(|result| result.message.as_deref())
    }
}

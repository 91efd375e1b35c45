//! Workflow tasks and subtasks.
//!
//! # Responsibility
//! - Describe one unit of background work scheduled against a version.
//! - Define the deterministic execution order of subtasks.
//!
//! # Invariants
//! - A task never holds the same `(provider, operation)` pair twice.
//! - After `normalize`, deletes precede inserts; deletes run in reverse
//!   pipeline order and inserts in pipeline order.

use crate::model::version::VersionId;
use crate::model::vocabulary::VocabularyId;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt::{Display, Formatter};

/// Identity of a persisted task row.
pub type TaskId = i64;

/// Provider kind that executes a subtask.
///
/// Variants are declared in pipeline order: harvested data feeds the
/// concept tree and metadata steps, imports feed publication, and the
/// resource map is derived from both import and publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubtaskProvider {
    Harvest,
    ConceptTreeTransform,
    Metadata,
    Import,
    Publish,
    ResourceMapTransform,
}

impl SubtaskProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Harvest => "harvest",
            Self::ConceptTreeTransform => "concept_tree_transform",
            Self::Metadata => "metadata",
            Self::Import => "import",
            Self::Publish => "publish",
            Self::ResourceMapTransform => "resource_map_transform",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubtaskOperation {
    Insert,
    Delete,
}

impl SubtaskOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Delete => "delete",
        }
    }
}

/// One step of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub provider: SubtaskProvider,
    pub operation: SubtaskOperation,
}

impl Subtask {
    pub fn new(provider: SubtaskProvider, operation: SubtaskOperation) -> Self {
        Self {
            provider,
            operation,
        }
    }

    pub fn insert(provider: SubtaskProvider) -> Self {
        Self::new(provider, SubtaskOperation::Insert)
    }

    pub fn delete(provider: SubtaskProvider) -> Self {
        Self::new(provider, SubtaskOperation::Delete)
    }

    fn execution_rank(&self) -> (u8, Reverse<SubtaskProvider>, SubtaskProvider) {
        match self.operation {
            SubtaskOperation::Delete => (0, Reverse(self.provider), SubtaskProvider::Harvest),
            SubtaskOperation::Insert => {
                (1, Reverse(SubtaskProvider::Harvest), self.provider)
            }
        }
    }
}

impl Display for Subtask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider.as_str(), self.operation.as_str())
    }
}

/// Final or pending status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Persisted, not yet executed.
    New,
    Success,
    /// Some subtasks succeeded before one failed.
    Partial,
    Error,
}

impl TaskStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Error => "error",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "success" => Some(Self::Success),
            "partial" => Some(Self::Partial),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Result of executing one subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskResult {
    pub subtask: Subtask,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Background work accumulated for one version during one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Assigned when the task row is persisted.
    pub task_id: Option<TaskId>,
    pub vocabulary_id: VocabularyId,
    pub version_id: VersionId,
    pub status: TaskStatus,
    pub subtasks: Vec<Subtask>,
    pub response: Vec<SubtaskResult>,
}

impl Task {
    pub fn new(vocabulary_id: VocabularyId, version_id: VersionId) -> Self {
        Self {
            task_id: None,
            vocabulary_id,
            version_id,
            status: TaskStatus::New,
            subtasks: Vec::new(),
            response: Vec::new(),
        }
    }

    /// Appends `subtask` unless an identical one is already scheduled.
    pub fn add_subtask(&mut self, subtask: Subtask) {
        if !self.subtasks.contains(&subtask) {
            self.subtasks.push(subtask);
        }
    }

    pub fn contains(&self, provider: SubtaskProvider, operation: SubtaskOperation) -> bool {
        self.subtasks.contains(&Subtask::new(provider, operation))
    }

    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }

    /// Sorts subtasks into execution order.
    pub fn normalize(&mut self) {
        self.subtasks.sort_by_key(Subtask::execution_rank);
    }
}

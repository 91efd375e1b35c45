//! Workflow provider contract and in-process registry.
//!
//! # Responsibility
//! - Define the interface a subtask executor implements.
//! - Resolve one executor per `SubtaskProvider` kind.
//!
//! # Invariants
//! - At most one provider is registered per kind.
//! - Providers run on the caller's connection and inside the caller's
//!   transaction; whatever they persist is visible to the reload that
//!   follows task execution.

use crate::aggregate::ReconcileContext;
use crate::model::task::{Subtask, SubtaskProvider, TaskId};
use crate::model::version::{Version, VersionId};
use crate::model::vocabulary::VocabularyId;
use crate::repo::Store;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Stable failure reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// Machine-readable code, recorded in the task response.
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error for ProviderError {}

/// What a provider is told about the task it serves.
#[derive(Debug, Clone, Copy)]
pub struct TaskInfo<'a> {
    pub task_id: TaskId,
    pub vocabulary_id: VocabularyId,
    pub version_id: VersionId,
    /// Current row of the task's version; `None` once it was deleted.
    pub version: Option<&'a Version>,
}

/// Executor of one subtask kind.
pub trait WorkflowProvider {
    fn provider(&self) -> SubtaskProvider;

    /// Performs `subtask`. Any rows the provider writes (system access
    /// points, version artefacts) go through `store`.
    fn run(
        &self,
        store: &Store<'_>,
        ctx: &ReconcileContext,
        task: &TaskInfo<'_>,
        subtask: &Subtask,
    ) -> Result<(), ProviderError>;
}

/// Provider registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderRegistryError {
    DuplicateProvider(SubtaskProvider),
}

impl Display for ProviderRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateProvider(kind) => {
                write!(f, "provider already registered: {}", kind.as_str())
            }
        }
    }
}

impl Error for ProviderRegistryError {}

/// Runtime registry of workflow providers, one per kind.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<SubtaskProvider, Arc<dyn WorkflowProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        provider: Arc<dyn WorkflowProvider>,
    ) -> Result<(), ProviderRegistryError> {
        let kind = provider.provider();
        if self.providers.contains_key(&kind) {
            return Err(ProviderRegistryError::DuplicateProvider(kind));
        }
        self.providers.insert(kind, provider);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Returns registered kinds in pipeline order.
    pub fn kinds(&self) -> Vec<SubtaskProvider> {
        self.providers.keys().copied().collect()
    }

    pub fn get(&self, kind: SubtaskProvider) -> Option<Arc<dyn WorkflowProvider>> {
        self.providers.get(&kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::{ProviderError, ProviderRegistry, ProviderRegistryError, TaskInfo, WorkflowProvider};
    use crate::aggregate::ReconcileContext;
    use crate::model::task::{Subtask, SubtaskProvider};
    use crate::repo::Store;
    use std::sync::Arc;

    struct NoopProvider(SubtaskProvider);

    impl WorkflowProvider for NoopProvider {
        fn provider(&self) -> SubtaskProvider {
            self.0
        }

        fn run(
            &self,
            _store: &Store<'_>,
            _ctx: &ReconcileContext,
            _task: &TaskInfo<'_>,
            _subtask: &Subtask,
        ) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    #[test]
    fn registers_one_provider_per_kind() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(NoopProvider(SubtaskProvider::Publish)))
            .expect("publish provider should register");
        registry
            .register(Arc::new(NoopProvider(SubtaskProvider::Harvest)))
            .expect("harvest provider should register");

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.kinds(),
            vec![SubtaskProvider::Harvest, SubtaskProvider::Publish]
        );
        assert!(registry.get(SubtaskProvider::Import).is_none());
    }

    #[test]
    fn rejects_duplicate_kind() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(NoopProvider(SubtaskProvider::Import)))
            .expect("first provider should register");
        let duplicate = registry.register(Arc::new(NoopProvider(SubtaskProvider::Import)));
        assert_eq!(
            duplicate,
            Err(ProviderRegistryError::DuplicateProvider(SubtaskProvider::Import))
        );
    }
}

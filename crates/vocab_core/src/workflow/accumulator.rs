//! Per-call task accumulator.
//!
//! # Invariants
//! - Holds at most one task per version.
//! - Tasks without subtasks are never persisted nor run.
//! - A task is persisted with status `new` before any provider runs.

use crate::aggregate::ReconcileContext;
use crate::model::task::{Subtask, SubtaskResult, Task, TaskStatus};
use crate::model::version::VersionId;
use crate::model::vocabulary::VocabularyId;
use crate::repo::task_repo::TaskRepository;
use crate::repo::version_repo::VersionRepository;
use crate::repo::{RepoResult, Store};
use crate::workflow::outcome::{FailedTask, WorkflowOutcome};
use crate::workflow::provider::{ProviderError, ProviderRegistry, TaskInfo};
use log::{info, warn};
use std::collections::BTreeMap;
use std::time::Instant;

/// Tasks scheduled by one reconciliation call, keyed by version.
#[derive(Debug, Clone)]
pub struct TaskAccumulator {
    vocabulary_id: VocabularyId,
    tasks: BTreeMap<VersionId, Task>,
}

impl TaskAccumulator {
    pub fn new(vocabulary_id: VocabularyId) -> Self {
        Self {
            vocabulary_id,
            tasks: BTreeMap::new(),
        }
    }

    pub fn vocabulary_id(&self) -> VocabularyId {
        self.vocabulary_id
    }

    /// Schedules `subtask` on the task of `version_id`.
    pub fn add(&mut self, version_id: VersionId, subtask: Subtask) {
        let vocabulary_id = self.vocabulary_id;
        self.tasks
            .entry(version_id)
            .or_insert_with(|| Task::new(vocabulary_id, version_id))
            .add_subtask(subtask);
    }

    pub fn get(&self, version_id: VersionId) -> Option<&Task> {
        self.tasks.get(&version_id)
    }

    pub(crate) fn get_mut(&mut self, version_id: VersionId) -> Option<&mut Task> {
        self.tasks.get_mut(&version_id)
    }

    pub fn version_ids(&self) -> Vec<VersionId> {
        self.tasks.keys().copied().collect()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(|task| !task.is_empty())
    }

    /// Whether no subtask was scheduled at all.
    pub fn is_empty(&self) -> bool {
        self.tasks.values().all(Task::is_empty)
    }

    /// Normalizes and inserts every non-empty task not yet persisted.
    ///
    /// Returns the number of inserted tasks.
    pub fn persist(&mut self, store: &Store<'_>, ctx: &ReconcileContext) -> RepoResult<usize> {
        let repo = store.tasks();
        let mut inserted = 0;
        for task in self.tasks.values_mut() {
            if task.is_empty() || task.task_id.is_some() {
                continue;
            }
            task.normalize();
            task.status = TaskStatus::New;
            task.task_id = Some(repo.insert(task, &ctx.actor, ctx.now)?);
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Runs every persisted task through `providers`.
    ///
    /// Returns whether at least one task actually ran. Provider failures are
    /// recorded on the task; only storage failures abort the run.
    pub fn run_all(
        &mut self,
        store: &Store<'_>,
        ctx: &ReconcileContext,
        providers: &ProviderRegistry,
    ) -> RepoResult<bool> {
        self.persist(store, ctx)?;
        let current_versions = store.versions().load_current(self.vocabulary_id)?;
        let repo = store.tasks();

        let mut ran = false;
        for task in self.tasks.values_mut() {
            let Some(task_id) = task.task_id else {
                continue;
            };
            if task.status != TaskStatus::New {
                continue;
            }
            let info = TaskInfo {
                task_id,
                vocabulary_id: task.vocabulary_id,
                version_id: task.version_id,
                version: current_versions
                    .iter()
                    .find(|version| version.version_id == task.version_id),
            };
            run_task(store, ctx, providers, &info, task);
            repo.update(task, &ctx.actor, ctx.now)?;
            ran = true;
        }
        Ok(ran)
    }

    /// Summarizes tasks that did not succeed; `None` when all succeeded.
    pub fn build_outcome(&self) -> Option<WorkflowOutcome> {
        let failed_tasks: Vec<FailedTask> = self
            .tasks
            .values()
            .filter(|task| matches!(task.status, TaskStatus::Partial | TaskStatus::Error))
            .filter_map(|task| {
                Some(FailedTask {
                    task_id: task.task_id?,
                    version_id: task.version_id,
                    status: task.status,
                    response: task.response.clone(),
                })
            })
            .collect();
        if failed_tasks.is_empty() {
            return None;
        }
        Some(WorkflowOutcome {
            vocabulary_id: self.vocabulary_id,
            failed_tasks,
        })
    }
}

fn run_task(
    store: &Store<'_>,
    ctx: &ReconcileContext,
    providers: &ProviderRegistry,
    info: &TaskInfo<'_>,
    task: &mut Task,
) {
    let started_at = Instant::now();
    task.response.clear();
    let mut succeeded = 0usize;

    for subtask in task.subtasks.clone() {
        let result = match providers.get(subtask.provider) {
            Some(provider) => provider.run(store, ctx, info, &subtask),
            None => Err(ProviderError::new(
                "provider_not_registered",
                format!("no provider registered for {}", subtask.provider.as_str()),
            )),
        };
        match result {
            Ok(()) => {
                task.response.push(SubtaskResult {
                    subtask,
                    succeeded: true,
                    message: None,
                });
                succeeded += 1;
            }
            Err(err) => {
                warn!(
                    "event=task_run module=workflow status=error task_id={} version_id={} subtask={} error_code={}",
                    info.task_id, info.version_id, subtask, err.code
                );
                task.response.push(SubtaskResult {
                    subtask,
                    succeeded: false,
                    message: Some(err.to_string()),
                });
                task.status = if succeeded > 0 {
                    TaskStatus::Partial
                } else {
                    TaskStatus::Error
                };
                return;
            }
        }
    }

    task.status = TaskStatus::Success;
    info!(
        "event=task_run module=workflow status=ok task_id={} version_id={} subtasks={} duration_ms={}",
        info.task_id,
        info.version_id,
        succeeded,
        started_at.elapsed().as_millis()
    );
}

#[cfg(test)]
mod tests {
    use super::TaskAccumulator;
    use crate::aggregate::ReconcileContext;
    use crate::db::open_db_in_memory;
    use crate::model::task::{Subtask, SubtaskProvider, TaskStatus};
    use crate::repo::id_allocator::{IdAllocator, IdKind};
    use crate::repo::task_repo::TaskRepository;
    use crate::repo::Store;
    use crate::workflow::provider::{ProviderError, ProviderRegistry, TaskInfo, WorkflowProvider};
    use std::sync::Arc;

    struct FixedProvider {
        kind: SubtaskProvider,
        fail: bool,
    }

    impl WorkflowProvider for FixedProvider {
        fn provider(&self) -> SubtaskProvider {
            self.kind
        }

        fn run(
            &self,
            _store: &Store<'_>,
            _ctx: &ReconcileContext,
            _task: &TaskInfo<'_>,
            _subtask: &Subtask,
        ) -> Result<(), ProviderError> {
            if self.fail {
                return Err(ProviderError::new("remote_down", "endpoint unreachable"));
            }
            Ok(())
        }
    }

    fn registry(entries: &[(SubtaskProvider, bool)]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for (kind, fail) in entries {
            registry
                .register(Arc::new(FixedProvider {
                    kind: *kind,
                    fail: *fail,
                }))
                .unwrap();
        }
        registry
    }

    fn ctx() -> ReconcileContext {
        ReconcileContext::new("tester", 1_700_000_000_000)
    }

    #[test]
    fn empty_accumulator_persists_and_runs_nothing() {
        let conn = open_db_in_memory().unwrap();
        let store = Store::new(&conn);
        let mut tasks = TaskAccumulator::new(1);
        assert!(tasks.is_empty());
        assert_eq!(tasks.persist(&store, &ctx()).unwrap(), 0);
        assert!(!tasks.run_all(&store, &ctx(), &registry(&[])).unwrap());
        assert!(tasks.build_outcome().is_none());
    }

    #[test]
    fn successful_task_is_recorded() {
        let conn = open_db_in_memory().unwrap();
        let store = Store::new(&conn);
        let vocabulary_id = store.ids().allocate(IdKind::Vocabulary).unwrap();
        let version_id = store.ids().allocate(IdKind::Version).unwrap();

        let mut tasks = TaskAccumulator::new(vocabulary_id);
        tasks.add(version_id, Subtask::insert(SubtaskProvider::Publish));
        tasks.add(version_id, Subtask::insert(SubtaskProvider::Import));
        let ran = tasks
            .run_all(
                &store,
                &ctx(),
                &registry(&[
                    (SubtaskProvider::Import, false),
                    (SubtaskProvider::Publish, false),
                ]),
            )
            .unwrap();

        assert!(ran);
        assert!(tasks.build_outcome().is_none());
        let persisted = store.tasks().list_for_vocabulary(vocabulary_id).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].status, TaskStatus::Success);
        assert_eq!(
            persisted[0].subtasks,
            vec![
                Subtask::insert(SubtaskProvider::Import),
                Subtask::insert(SubtaskProvider::Publish)
            ]
        );
        assert_eq!(persisted[0].response.len(), 2);
    }

    #[test]
    fn failure_after_success_is_partial_and_stops_execution() {
        let conn = open_db_in_memory().unwrap();
        let store = Store::new(&conn);
        let vocabulary_id = store.ids().allocate(IdKind::Vocabulary).unwrap();
        let version_id = store.ids().allocate(IdKind::Version).unwrap();

        let mut tasks = TaskAccumulator::new(vocabulary_id);
        tasks.add(version_id, Subtask::insert(SubtaskProvider::Harvest));
        tasks.add(version_id, Subtask::insert(SubtaskProvider::Import));
        tasks.add(version_id, Subtask::insert(SubtaskProvider::Publish));
        tasks
            .run_all(
                &store,
                &ctx(),
                &registry(&[
                    (SubtaskProvider::Harvest, false),
                    (SubtaskProvider::Import, true),
                    (SubtaskProvider::Publish, false),
                ]),
            )
            .unwrap();

        let outcome = tasks.build_outcome().expect("import failure should be reported");
        assert_eq!(outcome.failed_tasks.len(), 1);
        let failed = &outcome.failed_tasks[0];
        assert_eq!(failed.status, TaskStatus::Partial);
        assert_eq!(failed.response.len(), 2);
        assert_eq!(
            failed.failure_message(),
            Some("remote_down: endpoint unreachable")
        );
    }

    #[test]
    fn missing_provider_on_first_subtask_is_an_error() {
        let conn = open_db_in_memory().unwrap();
        let store = Store::new(&conn);
        let vocabulary_id = store.ids().allocate(IdKind::Vocabulary).unwrap();
        let version_id = store.ids().allocate(IdKind::Version).unwrap();

        let mut tasks = TaskAccumulator::new(vocabulary_id);
        tasks.add(version_id, Subtask::delete(SubtaskProvider::Publish));
        tasks.run_all(&store, &ctx(), &registry(&[])).unwrap();

        let outcome = tasks.build_outcome().unwrap();
        assert_eq!(outcome.failed_tasks[0].status, TaskStatus::Error);
        let task_id = outcome.failed_tasks[0].task_id;
        let stored = store.tasks().get(task_id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Error);
    }
}

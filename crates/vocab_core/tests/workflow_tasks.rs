mod common;

use common::{
    allocate_vocabulary, ctx, succeeding_providers, version, vocabulary, RecordingProvider, LATER,
    MUCH_LATER, NOW,
};
use std::sync::Arc;
use vocab_core::model::access_point::{
    AccessPoint, AccessPointData, AccessPointSource, AccessPointType,
};
use vocab_core::model::task::{Subtask, SubtaskOperation, SubtaskProvider, TaskStatus};
use vocab_core::model::temporal::make_current;
use vocab_core::model::version_artefact::{
    VersionArtefact, VersionArtefactStatus, VersionArtefactType,
};
use vocab_core::model::vocabulary::VocabularyStatus;
use vocab_core::repo::access_point_repo::AccessPointRepository;
use vocab_core::repo::id_allocator::{IdAllocator, IdKind};
use vocab_core::repo::task_repo::TaskRepository;
use vocab_core::repo::version_artefact_repo::VersionArtefactRepository;
use vocab_core::{
    open_db_in_memory, ProviderError, ProviderRegistry, ReconcileContext, Store, TaskInfo,
    TreeProjection, VocabularyModel, WorkflowProvider,
};

/// Writes the system rows a real harvest or import would produce.
struct SystemRowsProvider {
    kind: SubtaskProvider,
}

impl WorkflowProvider for SystemRowsProvider {
    fn provider(&self) -> SubtaskProvider {
        self.kind
    }

    fn run(
        &self,
        store: &Store<'_>,
        ctx: &ReconcileContext,
        task: &TaskInfo<'_>,
        subtask: &Subtask,
    ) -> Result<(), ProviderError> {
        if subtask.operation != SubtaskOperation::Insert {
            return Ok(());
        }
        let storage = |err: vocab_core::RepoError| ProviderError::new("storage", err.to_string());
        match self.kind {
            SubtaskProvider::Import => {
                let mut row = AccessPoint {
                    row_id: 0,
                    access_point_id: store.ids().allocate(IdKind::AccessPoint).map_err(storage)?,
                    version_id: task.version_id,
                    start_date: 0,
                    end_date: 0,
                    modified_by: ctx.actor.clone(),
                    kind: AccessPointType::ApiSparql,
                    source: AccessPointSource::System,
                    data: AccessPointData {
                        url: format!("https://sparql.example.org/{}", task.version_id),
                        format: None,
                    },
                };
                make_current(&mut row, ctx.now);
                store.access_points().insert(&row).map_err(storage)?;
            }
            SubtaskProvider::Harvest => {
                let mut row = VersionArtefact {
                    row_id: 0,
                    version_artefact_id: store
                        .ids()
                        .allocate(IdKind::VersionArtefact)
                        .map_err(storage)?,
                    version_id: task.version_id,
                    start_date: 0,
                    end_date: 0,
                    modified_by: ctx.actor.clone(),
                    kind: VersionArtefactType::HarvestData,
                    status: VersionArtefactStatus::Current,
                    data: serde_json::json!({ "path": "harvest/1" }),
                };
                make_current(&mut row, ctx.now);
                store.version_artefacts().insert(&row).map_err(storage)?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn system_row_providers() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for kind in [SubtaskProvider::Harvest, SubtaskProvider::Import] {
        registry
            .register(Arc::new(SystemRowsProvider { kind }))
            .unwrap();
    }
    for kind in [
        SubtaskProvider::ConceptTreeTransform,
        SubtaskProvider::Metadata,
        SubtaskProvider::Publish,
        SubtaskProvider::ResourceMapTransform,
    ] {
        let (provider, _) = RecordingProvider::new(kind, false);
        registry.register(Arc::new(provider)).unwrap();
    }
    registry
}

#[test]
fn provider_rows_are_visible_after_apply() {
    let conn = open_db_in_memory().unwrap();
    let providers = system_row_providers();
    let id = allocate_vocabulary(&conn);

    let mut desired = vocabulary("Harvested", VocabularyStatus::Published);
    desired.versions = vec![version("Version One", true, true, false)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    let outcome = model.apply_changes(&ctx(NOW), &desired).unwrap();
    assert!(outcome.is_none());

    let current = model.get_current(&TreeProjection::full()).unwrap();
    let projected = &current.versions[0];
    assert_eq!(projected.access_points.len(), 1);
    assert_eq!(projected.access_points[0].kind, AccessPointType::ApiSparql);
    assert_eq!(projected.access_points[0].source, AccessPointSource::System);
    assert_eq!(projected.version_artefacts.len(), 1);
    assert_eq!(
        projected.version_artefacts[0].kind,
        VersionArtefactType::HarvestData
    );

    let tasks = Store::new(&conn).tasks().list_for_vocabulary(id).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(
        tasks[0].subtasks,
        vec![
            Subtask::insert(SubtaskProvider::Harvest),
            Subtask::insert(SubtaskProvider::ConceptTreeTransform),
            Subtask::insert(SubtaskProvider::Metadata),
            Subtask::insert(SubtaskProvider::Import),
        ]
    );
}

#[test]
fn echoing_tree_with_system_rows_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let providers = system_row_providers();
    let id = allocate_vocabulary(&conn);

    let mut desired = vocabulary("Harvested", VocabularyStatus::Published);
    desired.versions = vec![version("Version One", true, true, false)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &desired).unwrap();

    let echoed = model.get_current(&TreeProjection::full()).unwrap();
    model.apply_changes(&ctx(LATER), &echoed).unwrap();

    assert_eq!(model.get_current(&TreeProjection::full()).unwrap(), echoed);
    let store = Store::new(&conn);
    assert_eq!(store.tasks().list_for_vocabulary(id).unwrap().len(), 1);
    let version_id = echoed.versions[0].id.unwrap();
    assert!(store.access_points().load_history(version_id).unwrap().is_empty());
}

#[test]
fn deleting_version_schedules_cleanup_of_system_rows() {
    let conn = open_db_in_memory().unwrap();
    let providers = system_row_providers();
    let id = allocate_vocabulary(&conn);

    let mut desired = vocabulary("Harvested", VocabularyStatus::Published);
    desired.versions = vec![version("Version One", true, true, false)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &desired).unwrap();
    let version_id = model.get_current(&TreeProjection::full()).unwrap().versions[0]
        .id
        .unwrap();

    let emptied = vocabulary("Harvested", VocabularyStatus::Published);
    model.apply_changes(&ctx(LATER), &emptied).unwrap();

    let store = Store::new(&conn);
    let tasks = store.tasks().list_for_vocabulary(id).unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1].version_id, version_id);
    assert_eq!(tasks[1].status, TaskStatus::Success);
    assert_eq!(
        tasks[1].subtasks,
        vec![
            Subtask::delete(SubtaskProvider::ResourceMapTransform),
            Subtask::delete(SubtaskProvider::Import),
            Subtask::delete(SubtaskProvider::Harvest),
            Subtask::insert(SubtaskProvider::ConceptTreeTransform),
        ]
    );
    assert_eq!(store.access_points().load_history(version_id).unwrap().len(), 1);
    assert_eq!(
        store.version_artefacts().load_history(version_id).unwrap().len(),
        1
    );
}

#[test]
fn delete_only_current_schedules_cleanup_of_system_rows() {
    let conn = open_db_in_memory().unwrap();
    let providers = system_row_providers();
    let id = allocate_vocabulary(&conn);

    let mut desired = vocabulary("Imported", VocabularyStatus::Published);
    desired.versions = vec![version("Version One", false, true, false)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &desired).unwrap();

    model.delete_only_current(&ctx(LATER), false).unwrap();

    let tasks = Store::new(&conn).tasks().list_for_vocabulary(id).unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(
        tasks[1].subtasks,
        vec![
            Subtask::delete(SubtaskProvider::ResourceMapTransform),
            Subtask::delete(SubtaskProvider::Import),
        ]
    );
    assert!(model.get_current(&TreeProjection::full()).is_none());
}

#[test]
fn disabling_import_schedules_import_and_resource_map_removal() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut desired = vocabulary("Toggle", VocabularyStatus::Published);
    desired.versions = vec![version("Version One", false, true, true)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &desired).unwrap();

    let mut update = model.get_current(&TreeProjection::full()).unwrap();
    update.versions[0].data.do_import = false;
    model.apply_changes(&ctx(LATER), &update).unwrap();

    let tasks = Store::new(&conn).tasks().list_for_vocabulary(id).unwrap();
    assert_eq!(
        tasks[1].subtasks,
        vec![
            Subtask::delete(SubtaskProvider::ResourceMapTransform),
            Subtask::delete(SubtaskProvider::Import),
        ]
    );
}

#[test]
fn turning_off_harvest_reruns_concept_tree_transform() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut desired = vocabulary("Harvest toggle", VocabularyStatus::Published);
    desired.versions = vec![version("Version One", true, false, false)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &desired).unwrap();

    let mut update = model.get_current(&TreeProjection::full()).unwrap();
    update.versions[0].data.do_harvest = false;
    model.apply_changes(&ctx(LATER), &update).unwrap();

    let tasks = Store::new(&conn).tasks().list_for_vocabulary(id).unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(
        tasks[1].subtasks,
        vec![
            Subtask::delete(SubtaskProvider::Harvest),
            Subtask::insert(SubtaskProvider::ConceptTreeTransform),
        ]
    );
}

#[test]
fn turning_on_harvest_with_import_adds_metadata_insert() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut desired = vocabulary("Metadata", VocabularyStatus::Published);
    desired.versions = vec![version("Version One", false, true, false)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &desired).unwrap();

    let mut update = model.get_current(&TreeProjection::full()).unwrap();
    update.versions[0].data.do_harvest = true;
    model.apply_changes(&ctx(LATER), &update).unwrap();

    let tasks = Store::new(&conn).tasks().list_for_vocabulary(id).unwrap();
    assert_eq!(
        tasks[1].subtasks,
        vec![
            Subtask::insert(SubtaskProvider::Harvest),
            Subtask::insert(SubtaskProvider::ConceptTreeTransform),
            Subtask::insert(SubtaskProvider::Metadata),
        ]
    );
}

#[test]
fn resource_map_follows_flags_enabled_in_separate_calls() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut desired = vocabulary("Staged", VocabularyStatus::Published);
    desired.versions = vec![version("Version One", false, true, false)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &desired).unwrap();

    let mut update = model.get_current(&TreeProjection::full()).unwrap();
    update.versions[0].data.do_publish = true;
    model.apply_changes(&ctx(LATER), &update).unwrap();

    let tasks = Store::new(&conn).tasks().list_for_vocabulary(id).unwrap();
    assert_eq!(
        tasks[0].subtasks,
        vec![Subtask::insert(SubtaskProvider::Import)]
    );
    assert_eq!(
        tasks[1].subtasks,
        vec![
            Subtask::insert(SubtaskProvider::Publish),
            Subtask::insert(SubtaskProvider::ResourceMapTransform),
        ]
    );
}

#[test]
fn failing_provider_yields_partial_outcome_and_keeps_metadata() {
    let conn = open_db_in_memory().unwrap();
    let mut providers = ProviderRegistry::new();
    let (import, import_calls) = RecordingProvider::new(SubtaskProvider::Import, false);
    let (publish, _) = RecordingProvider::new(SubtaskProvider::Publish, true);
    let (resource_map, resource_map_calls) =
        RecordingProvider::new(SubtaskProvider::ResourceMapTransform, false);
    providers.register(Arc::new(import)).unwrap();
    providers.register(Arc::new(publish)).unwrap();
    providers.register(Arc::new(resource_map)).unwrap();
    let id = allocate_vocabulary(&conn);

    let mut desired = vocabulary("Fragile", VocabularyStatus::Published);
    desired.versions = vec![version("Version One", false, true, true)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    let outcome = model
        .apply_changes(&ctx(NOW), &desired)
        .unwrap()
        .expect("publish failure should be reported");

    assert_eq!(outcome.vocabulary_id, id);
    assert_eq!(outcome.failed_tasks.len(), 1);
    let failed = &outcome.failed_tasks[0];
    assert_eq!(failed.status, TaskStatus::Partial);
    assert_eq!(failed.response.len(), 2);
    assert_eq!(
        failed.failure_message(),
        Some("provider_failed: remote endpoint refused")
    );
    assert_eq!(import_calls.lock().unwrap().len(), 1);
    assert!(resource_map_calls.lock().unwrap().is_empty());

    assert_eq!(
        model.get_current(&TreeProjection::full()).unwrap().versions.len(),
        1
    );
    let stored = Store::new(&conn).tasks().get(failed.task_id).unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Partial);
}

#[test]
fn missing_provider_yields_error_outcome() {
    let conn = open_db_in_memory().unwrap();
    let providers = ProviderRegistry::new();
    let id = allocate_vocabulary(&conn);

    let mut desired = vocabulary("Unserved", VocabularyStatus::Published);
    desired.versions = vec![version("Version One", false, false, true)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    let outcome = model.apply_changes(&ctx(MUCH_LATER), &desired).unwrap().unwrap();

    assert_eq!(outcome.failed_tasks[0].status, TaskStatus::Error);
    let message = outcome.failed_tasks[0].failure_message().unwrap();
    assert!(message.starts_with("provider_not_registered"), "{message}");
}

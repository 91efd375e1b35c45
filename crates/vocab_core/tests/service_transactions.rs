mod common;

use common::{ctx, published_by, succeeding_providers, version, vocabulary, LATER, MUCH_LATER, NOW};
use vocab_core::model::vocabulary::VocabularyStatus;
use vocab_core::model::task::TaskStatus;
use vocab_core::{
    open_db_in_memory, ModelError, TreeProjection, VocabularyService, VocabularyServiceError,
};

#[test]
fn create_allocates_id_and_commits() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let service = VocabularyService::new(&conn, &providers);

    let mut desired = vocabulary("Created", VocabularyStatus::Published);
    desired.versions = vec![version("Version One", false, true, false)];
    let (id, outcome) = service.create_vocabulary(&ctx(NOW), &desired).unwrap();
    assert!(outcome.is_none());

    let current = service
        .get_current(id, &TreeProjection::full())
        .unwrap()
        .unwrap();
    assert_eq!(current.id, Some(id));
    assert_eq!(current.data.title, "Created");
    let tasks = service.list_tasks(id).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Success);

    let (second, _) = service
        .create_vocabulary(&ctx(NOW), &vocabulary("Second", VocabularyStatus::Published))
        .unwrap();
    assert_ne!(second, id);
}

#[test]
fn create_rejects_tree_with_id() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let service = VocabularyService::new(&conn, &providers);

    let mut desired = vocabulary("Identified", VocabularyStatus::Published);
    desired.id = Some(5);
    let err = service.create_vocabulary(&ctx(NOW), &desired).unwrap_err();
    assert!(matches!(
        err,
        VocabularyServiceError::Model(ModelError::InvalidArgument(_))
    ));
}

#[test]
fn failed_apply_rolls_back_every_row() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let service = VocabularyService::new(&conn, &providers);

    let mut desired = vocabulary("Original", VocabularyStatus::Published);
    desired.versions = vec![version("Version One", false, false, false)];
    desired.related_entity_refs = vec![published_by(7)];
    let (id, _) = service.create_vocabulary(&ctx(NOW), &desired).unwrap();
    let before = service.get_current(id, &TreeProjection::full()).unwrap();
    let lines_before = service.describe_model(id).unwrap();

    // The root row and links change before the stray version is reached.
    let mut broken = before.clone().unwrap();
    broken.data.title = "Changed".to_string();
    broken.related_entity_refs.clear();
    let mut stray = version("Stray", false, false, false);
    stray.id = Some(9_999);
    broken.versions.push(stray);
    let err = service.apply_changes(&ctx(LATER), id, &broken).unwrap_err();
    assert!(matches!(
        err,
        VocabularyServiceError::Model(ModelError::InvalidArgument(_))
    ));

    assert_eq!(service.get_current(id, &TreeProjection::full()).unwrap(), before);
    assert_eq!(service.describe_model(id).unwrap(), lines_before);
    let row_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM vocabularies;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(row_count, 1);
}

#[test]
fn unknown_vocabulary_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let service = VocabularyService::new(&conn, &providers);

    let err = service
        .apply_changes(
            &ctx(NOW),
            42,
            &vocabulary("Missing", VocabularyStatus::Published),
        )
        .unwrap_err();
    assert!(matches!(err, VocabularyServiceError::VocabularyNotFound(42)));

    let err = service.delete_only_draft(42).unwrap_err();
    assert!(matches!(err, VocabularyServiceError::VocabularyNotFound(42)));
    assert!(service
        .get_current(42, &TreeProjection::full())
        .unwrap()
        .is_none());
}

#[test]
fn deleted_vocabulary_can_be_republished() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let service = VocabularyService::new(&conn, &providers);

    let desired = vocabulary("Cycle", VocabularyStatus::Published);
    let (id, _) = service.create_vocabulary(&ctx(NOW), &desired).unwrap();
    service.delete_only_current(&ctx(LATER), id, false).unwrap();
    assert!(service
        .get_current(id, &TreeProjection::full())
        .unwrap()
        .is_none());

    service.apply_changes(&ctx(MUCH_LATER), id, &desired).unwrap();
    let current = service
        .get_current(id, &TreeProjection::full())
        .unwrap()
        .unwrap();
    assert_eq!(current.data.title, "Cycle");
}

#[test]
fn promote_and_delete_draft_through_service() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let service = VocabularyService::new(&conn, &providers);

    let (id, _) = service
        .create_vocabulary(&ctx(NOW), &vocabulary("Live", VocabularyStatus::Published))
        .unwrap();
    let outcome = service.promote_current_to_draft(&ctx(LATER), id).unwrap();
    assert!(outcome.is_none());
    let draft = service.get_draft(id, &TreeProjection::root_only()).unwrap();
    assert_eq!(draft.unwrap().status, VocabularyStatus::Draft);

    let err = service
        .promote_current_to_draft(&ctx(MUCH_LATER), id)
        .unwrap_err();
    assert!(matches!(
        err,
        VocabularyServiceError::Model(ModelError::InvalidArgument(_))
    ));

    service.delete_only_draft(id).unwrap();
    assert!(service
        .get_draft(id, &TreeProjection::full())
        .unwrap()
        .is_none());
    let current = service.get_current(id, &TreeProjection::full()).unwrap();
    assert_eq!(current.unwrap().data.title, "Live");
}

mod common;

use common::{
    allocate_vocabulary, ctx, published_by, succeeding_providers, version, vocabulary, web_page,
    LATER, MUCH_LATER, NOW,
};
use vocab_core::model::temporal::{DRAFT_ADDITION_MODIFICATION_END_DATE, DRAFT_START_DATE};
use vocab_core::model::vocabulary::VocabularyStatus;
use vocab_core::repo::access_point_repo::AccessPointRepository;
use vocab_core::repo::task_repo::TaskRepository;
use vocab_core::repo::version_repo::VersionRepository;
use vocab_core::repo::vocabulary_repo::VocabularyRepository;
use vocab_core::{open_db_in_memory, ModelError, Store, TreeProjection, VocabularyModel};

#[test]
fn draft_apply_creates_draft_root_and_schedules_no_tasks() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut published = vocabulary("Live", VocabularyStatus::Published);
    published.versions = vec![version("Version One", false, false, false)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &published).unwrap();
    let current_before = model.get_current(&TreeProjection::full()).unwrap();
    let existing_version_id = current_before.versions[0].id;

    let mut draft = current_before.clone();
    draft.status = VocabularyStatus::Draft;
    draft.data.title = "Live (next edition)".to_string();
    draft.versions[0].data.do_harvest = true;
    draft.versions[0].data.do_import = true;
    draft
        .versions
        .push(version("Version Two", true, true, true));
    let outcome = model.apply_changes(&ctx(LATER), &draft).unwrap();
    assert!(outcome.is_none());

    let store = Store::new(&conn);
    let draft_root = store.vocabularies().load_draft(id).unwrap().unwrap();
    assert_eq!(draft_root.status, VocabularyStatus::Draft);
    assert_eq!(draft_root.start_date, DRAFT_START_DATE);
    assert_eq!(draft_root.end_date, DRAFT_ADDITION_MODIFICATION_END_DATE);
    assert_eq!(store.versions().load_draft(id).unwrap().len(), 2);
    assert!(store.tasks().list_for_vocabulary(id).unwrap().is_empty());

    assert_eq!(model.get_current(&TreeProjection::full()).unwrap(), current_before);
    let projected = model.get_draft(&TreeProjection::full()).unwrap();
    assert_eq!(projected.data.title, "Live (next edition)");
    assert_eq!(projected.versions.len(), 2);
    assert_eq!(projected.versions[0].id, existing_version_id);
    assert!(projected.versions[0].data.do_harvest);
}

#[test]
fn draft_edits_update_rows_in_place() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut draft = vocabulary("Draft", VocabularyStatus::Draft);
    let mut first = version("Version One", false, false, false);
    first.access_points = vec![web_page("https://example.org/draft")];
    draft.versions = vec![first];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &draft).unwrap();

    let store = Store::new(&conn);
    let root_before = store.vocabularies().load_draft(id).unwrap().unwrap();
    let version_before = store.versions().load_draft(id).unwrap().remove(0);

    let mut edit = model.get_draft(&TreeProjection::full()).unwrap();
    edit.data.title = "Draft (edited)".to_string();
    edit.versions[0].data.title = "Version One (edited)".to_string();
    edit.versions[0].access_points[0].data.url = "https://example.org/edited".to_string();
    model.apply_changes(&ctx(LATER), &edit).unwrap();

    let root_after = store.vocabularies().load_draft(id).unwrap().unwrap();
    assert_eq!(root_after.row_id, root_before.row_id);
    assert_eq!(root_after.data.title, "Draft (edited)");
    let version_after = store.versions().load_draft(id).unwrap().remove(0);
    assert_eq!(version_after.row_id, version_before.row_id);
    assert_eq!(version_after.data.title, "Version One (edited)");
    let points = store
        .access_points()
        .load_draft(version_after.version_id)
        .unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].data.url, "https://example.org/edited");

    assert!(store.vocabularies().load_history(id).unwrap().is_empty());
    assert!(store.versions().load_history(id).unwrap().is_empty());
    assert!(model.get_current(&TreeProjection::full()).is_none());
}

#[test]
fn removing_draft_version_deletes_it_outright() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut draft = vocabulary("Draft", VocabularyStatus::Draft);
    let mut first = version("Version One", false, false, false);
    first.access_points = vec![web_page("https://example.org/draft")];
    draft.versions = vec![first];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &draft).unwrap();
    let version_id = model.get_draft(&TreeProjection::full()).unwrap().versions[0]
        .id
        .unwrap();

    let mut edit = model.get_draft(&TreeProjection::full()).unwrap();
    edit.versions.clear();
    model.apply_changes(&ctx(LATER), &edit).unwrap();

    let store = Store::new(&conn);
    assert!(store.versions().load_draft(id).unwrap().is_empty());
    assert!(store.versions().load_history(id).unwrap().is_empty());
    assert!(store.access_points().load_draft(version_id).unwrap().is_empty());
    assert!(store.access_points().load_history(version_id).unwrap().is_empty());
}

#[test]
fn publishing_draft_reuses_draft_identities_and_consumes_draft() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut draft = vocabulary("Draft", VocabularyStatus::Draft);
    let mut first = version("Version One", false, true, false);
    first.access_points = vec![web_page("https://example.org/draft")];
    draft.versions = vec![first];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &draft).unwrap();
    let projected = model.get_draft(&TreeProjection::full()).unwrap();

    let mut publish = projected.clone();
    publish.status = VocabularyStatus::Published;
    model.apply_changes(&ctx(LATER), &publish).unwrap();

    let current = model.get_current(&TreeProjection::full()).unwrap();
    assert_eq!(current.status, VocabularyStatus::Published);
    assert_eq!(current.versions[0].id, projected.versions[0].id);
    assert_eq!(
        current.versions[0].access_points[0].id,
        projected.versions[0].access_points[0].id
    );
    assert!(model.get_draft(&TreeProjection::full()).is_none());
    assert!(!model.has_draft());

    let store = Store::new(&conn);
    assert!(store.vocabularies().load_draft(id).unwrap().is_none());
    assert!(store.versions().load_draft(id).unwrap().is_empty());
    assert_eq!(
        store.vocabularies().load_current(id).unwrap().unwrap().start_date,
        LATER
    );
    // Publishing turned import on for the version.
    assert_eq!(store.tasks().list_for_vocabulary(id).unwrap().len(), 1);
}

#[test]
fn promote_copies_current_tree_and_delete_draft_restores_it() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut published = vocabulary("Live", VocabularyStatus::Published);
    let mut first = version("Version One", false, false, false);
    first.access_points = vec![web_page("https://example.org/one")];
    published.versions = vec![first];
    published.related_entity_refs = vec![published_by(7)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &published).unwrap();
    let before = model.get_current(&TreeProjection::full()).unwrap();
    let lines_before = model.describe_model_at(LATER);

    let outcome = model.promote_current_to_draft(&ctx(LATER)).unwrap();
    assert!(outcome.is_none());

    assert_eq!(model.get_current(&TreeProjection::full()).unwrap(), before);
    let mut expected = before.clone();
    expected.status = VocabularyStatus::Draft;
    assert_eq!(model.get_draft(&TreeProjection::full()).unwrap(), expected);

    let store = Store::new(&conn);
    assert!(store.vocabularies().load_history(id).unwrap().is_empty());
    assert!(store.versions().load_history(id).unwrap().is_empty());
    assert_eq!(store.versions().load_draft(id).unwrap().len(), 1);

    let reloaded = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    assert_eq!(reloaded.get_draft(&TreeProjection::full()).unwrap(), expected);

    model.delete_only_draft().unwrap();
    assert_eq!(model.get_current(&TreeProjection::full()).unwrap(), before);
    assert_eq!(model.describe_model_at(LATER), lines_before);
    let reloaded = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    assert_eq!(reloaded.get_current(&TreeProjection::full()).unwrap(), before);
    assert!(!reloaded.has_draft());
}

#[test]
fn promote_requires_current_and_no_draft() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    let err = model.promote_current_to_draft(&ctx(NOW)).unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(_)), "{err}");

    model
        .apply_changes(&ctx(NOW), &vocabulary("Live", VocabularyStatus::Published))
        .unwrap();
    model
        .apply_changes(&ctx(LATER), &vocabulary("Next", VocabularyStatus::Draft))
        .unwrap();
    let err = model.promote_current_to_draft(&ctx(MUCH_LATER)).unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(_)), "{err}");
}

#[test]
fn delete_only_draft_removes_every_draft_row() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model
        .apply_changes(&ctx(NOW), &vocabulary("Live", VocabularyStatus::Published))
        .unwrap();
    let current = model.get_current(&TreeProjection::full()).unwrap();

    let mut draft = vocabulary("Next", VocabularyStatus::Draft);
    draft.versions = vec![version("Version One", false, false, false)];
    draft.related_entity_refs = vec![published_by(7)];
    model.apply_changes(&ctx(LATER), &draft).unwrap();
    assert!(model.has_draft());

    model.delete_only_draft().unwrap();

    assert!(!model.has_draft());
    assert!(model.get_draft(&TreeProjection::full()).is_none());
    assert_eq!(model.get_current(&TreeProjection::full()).unwrap(), current);
    let reloaded = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    assert!(!reloaded.has_draft());

    let err = model.delete_only_draft().unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(_)), "{err}");
}

#[test]
fn delete_only_current_historicizes_and_keeps_existing_draft() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut published = vocabulary("Live", VocabularyStatus::Published);
    published.versions = vec![version("Version One", false, false, false)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &published).unwrap();
    model
        .apply_changes(&ctx(LATER), &vocabulary("Next", VocabularyStatus::Draft))
        .unwrap();
    let draft_before = model.get_draft(&TreeProjection::full()).unwrap();

    model.delete_only_current(&ctx(MUCH_LATER), true).unwrap();

    assert!(model.get_current(&TreeProjection::full()).is_none());
    assert_eq!(model.get_draft(&TreeProjection::full()).unwrap(), draft_before);
    let store = Store::new(&conn);
    assert_eq!(store.vocabularies().load_history(id).unwrap().len(), 1);
    assert_eq!(store.versions().load_history(id).unwrap().len(), 1);
    assert!(store.versions().load_current(id).unwrap().is_empty());
}

#[test]
fn delete_only_current_preserving_draft_moves_rows_into_draft() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut published = vocabulary("Live", VocabularyStatus::Published);
    published.versions = vec![version("Version One", false, false, false)];
    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model.apply_changes(&ctx(NOW), &published).unwrap();
    let before = model.get_current(&TreeProjection::full()).unwrap();

    model.delete_only_current(&ctx(LATER), true).unwrap();

    assert!(model.get_current(&TreeProjection::full()).is_none());
    let mut expected = before.clone();
    expected.status = VocabularyStatus::Draft;
    assert_eq!(model.get_draft(&TreeProjection::full()).unwrap(), expected);

    let store = Store::new(&conn);
    let history = store.vocabularies().load_history(id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].end_date, LATER);
    assert_eq!(store.versions().load_history(id).unwrap().len(), 1);
}

#[test]
fn delete_only_current_without_current_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let providers = succeeding_providers();
    let id = allocate_vocabulary(&conn);

    let mut model = VocabularyModel::load(Store::new(&conn), &providers, id).unwrap();
    model
        .apply_changes(&ctx(NOW), &vocabulary("Draft", VocabularyStatus::Draft))
        .unwrap();
    let err = model.delete_only_current(&ctx(LATER), false).unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(_)), "{err}");
}

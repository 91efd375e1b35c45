#![allow(dead_code)]

use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use vocab_core::model::access_point::{AccessPointData, AccessPointSource, AccessPointType};
use vocab_core::model::related::RelatedEntityRelation;
use vocab_core::model::task::{Subtask, SubtaskProvider};
use vocab_core::model::version::{VersionData, VersionStatus};
use vocab_core::model::vocabulary::{VocabularyData, VocabularyId, VocabularyStatus};
use vocab_core::repo::id_allocator::{IdAllocator, IdKind};
use vocab_core::{
    AccessPointTree, ProviderError, ProviderRegistry, ReconcileContext, RelatedRef, Store,
    TaskInfo, VersionTree, VocabularyTree, WorkflowProvider,
};

pub const NOW: i64 = 1_700_000_000_000;
pub const LATER: i64 = NOW + 60_000;
pub const MUCH_LATER: i64 = NOW + 120_000;

pub fn ctx(now: i64) -> ReconcileContext {
    ReconcileContext::new("tester", now)
}

pub fn allocate_vocabulary(conn: &Connection) -> VocabularyId {
    Store::new(conn).ids().allocate(IdKind::Vocabulary).unwrap()
}

pub fn vocabulary(title: &str, status: VocabularyStatus) -> VocabularyTree {
    VocabularyTree {
        id: None,
        status,
        owner: "ands".to_string(),
        slug: "rifcs".to_string(),
        data: VocabularyData {
            title: title.to_string(),
            primary_language: "en".to_string(),
            ..VocabularyData::default()
        },
        versions: Vec::new(),
        related_entity_refs: Vec::new(),
        related_vocabulary_refs: Vec::new(),
    }
}

pub fn version(title: &str, harvest: bool, import: bool, publish: bool) -> VersionTree {
    VersionTree {
        id: None,
        status: VersionStatus::Current,
        slug: title.to_ascii_lowercase().replace(' ', "-"),
        release_date: None,
        data: VersionData {
            title: title.to_string(),
            note: None,
            harvest_source: None,
            do_harvest: harvest,
            do_import: import,
            do_publish: publish,
        },
        force_workflow: false,
        access_points: Vec::new(),
        version_artefacts: Vec::new(),
    }
}

pub fn web_page(url: &str) -> AccessPointTree {
    AccessPointTree {
        id: None,
        kind: AccessPointType::WebPage,
        source: AccessPointSource::User,
        data: AccessPointData {
            url: url.to_string(),
            format: None,
        },
    }
}

pub fn published_by(entity_id: i64) -> RelatedRef<RelatedEntityRelation> {
    RelatedRef {
        id: entity_id,
        relations: vec![RelatedEntityRelation::PublishedBy],
    }
}

/// Drops server-assigned ids so trees can be compared with submissions.
pub fn without_ids(mut tree: VocabularyTree) -> VocabularyTree {
    tree.id = None;
    for version in &mut tree.versions {
        version.id = None;
        for access_point in &mut version.access_points {
            access_point.id = None;
        }
    }
    tree
}

/// Provider that records every subtask it is asked to run.
pub struct RecordingProvider {
    kind: SubtaskProvider,
    fail: bool,
    calls: Arc<Mutex<Vec<Subtask>>>,
}

impl RecordingProvider {
    pub fn new(kind: SubtaskProvider, fail: bool) -> (Self, Arc<Mutex<Vec<Subtask>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                kind,
                fail,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl WorkflowProvider for RecordingProvider {
    fn provider(&self) -> SubtaskProvider {
        self.kind
    }

    fn run(
        &self,
        _store: &Store<'_>,
        _ctx: &ReconcileContext,
        _task: &TaskInfo<'_>,
        subtask: &Subtask,
    ) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(*subtask);
        if self.fail {
            return Err(ProviderError::new("provider_failed", "remote endpoint refused"));
        }
        Ok(())
    }
}

/// Registry where every provider kind succeeds.
pub fn succeeding_providers() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for kind in [
        SubtaskProvider::Harvest,
        SubtaskProvider::ConceptTreeTransform,
        SubtaskProvider::Metadata,
        SubtaskProvider::Import,
        SubtaskProvider::Publish,
        SubtaskProvider::ResourceMapTransform,
    ] {
        let (provider, _) = RecordingProvider::new(kind, false);
        registry.register(Arc::new(provider)).unwrap();
    }
    registry
}

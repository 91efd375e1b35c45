//! Vocabulary aggregate: root entry point of the reconciliation engine.
//!
//! # Responsibility
//! - Load the complete current and draft state of one vocabulary.
//! - Dispatch a submitted tree to current-view or draft-view handling,
//!   cascade it through versions and links, then run scheduled workflow.
//! - Project the current and draft trees back to callers.
//!
//! # Invariants
//! - At most one current and one draft root row exist per vocabulary.
//! - Workflow runs only after the whole cascade has been staged, and the
//!   model is reloaded from storage whenever a task actually ran.
//! - After an error the in-memory state is undefined; callers discard the
//!   model and roll back the transaction.

use crate::aggregate::link_model::{RelatedEntityModel, RelatedVocabularyModel};
use crate::aggregate::version_model::VersionModel;
use crate::aggregate::{
    describe_row, system_now_millis, ModelError, ModelResult, ReconcileContext, TemporalView,
};
use crate::model::schema::{flatten_refs, group_refs, TreeProjection, VocabularyTree};
use crate::model::temporal::{make_current, make_draft, make_historical};
use crate::model::vocabulary::{Vocabulary, VocabularyId, VocabularyStatus};
use crate::repo::vocabulary_repo::VocabularyRepository;
use crate::repo::Store;
use crate::workflow::{ProviderRegistry, TaskAccumulator, WorkflowOutcome};
use log::{error, info};
use std::time::Instant;

pub struct VocabularyModel<'a> {
    store: Store<'a>,
    providers: &'a ProviderRegistry,
    vocabulary_id: VocabularyId,
    current: Option<Vocabulary>,
    draft: Option<Vocabulary>,
    versions: VersionModel<'a>,
    related_entities: RelatedEntityModel<'a>,
    related_vocabularies: RelatedVocabularyModel<'a>,
}

impl<'a> VocabularyModel<'a> {
    /// Loads every current and draft row of `vocabulary_id`.
    ///
    /// An unknown id yields an empty model, ready for a first
    /// `apply_changes`.
    pub fn load(
        store: Store<'a>,
        providers: &'a ProviderRegistry,
        vocabulary_id: VocabularyId,
    ) -> ModelResult<Self> {
        let repo = store.vocabularies();
        Ok(Self {
            store,
            providers,
            vocabulary_id,
            current: repo.load_current(vocabulary_id)?,
            draft: repo.load_draft(vocabulary_id)?,
            versions: VersionModel::load(store, vocabulary_id)?,
            related_entities: RelatedEntityModel::load(store, vocabulary_id)?,
            related_vocabularies: RelatedVocabularyModel::load(store, vocabulary_id)?,
        })
    }

    pub fn vocabulary_id(&self) -> VocabularyId {
        self.vocabulary_id
    }

    pub fn current_row(&self) -> Option<&Vocabulary> {
        self.current.as_ref()
    }

    pub fn draft_row(&self) -> Option<&Vocabulary> {
        self.draft.as_ref()
    }

    pub fn versions(&self) -> &VersionModel<'a> {
        &self.versions
    }

    pub fn related_entities(&self) -> &RelatedEntityModel<'a> {
        &self.related_entities
    }

    pub fn related_vocabularies(&self) -> &RelatedVocabularyModel<'a> {
        &self.related_vocabularies
    }

    /// Whether any draft row exists anywhere in the tree.
    pub fn has_draft(&self) -> bool {
        self.draft.is_some()
            || self.versions.has_draft()
            || self.related_entities.has_draft()
            || self.related_vocabularies.has_draft()
    }

    /// Projects the current tree; `None` when nothing is current.
    pub fn get_current(&self, projection: &TreeProjection) -> Option<VocabularyTree> {
        let row = self.current.as_ref()?;
        Some(self.project(TemporalView::Current, row, projection))
    }

    /// Projects the draft tree; `None` when no draft root row exists.
    pub fn get_draft(&self, projection: &TreeProjection) -> Option<VocabularyTree> {
        let row = self.draft.as_ref()?;
        Some(self.project(TemporalView::Draft, row, projection))
    }

    /// Reconciles the stored tree with `desired`.
    ///
    /// `desired.status == Draft` targets the draft view; any other status
    /// targets the current view. Returns the workflow outcome when a
    /// scheduled task did not succeed.
    ///
    /// # Errors
    /// - `InvalidArgument` when `desired` names another vocabulary, repeats
    ///   a child id, or names a child id that does not belong here.
    pub fn apply_changes(
        &mut self,
        ctx: &ReconcileContext,
        desired: &VocabularyTree,
    ) -> ModelResult<Option<WorkflowOutcome>> {
        if let Some(id) = desired.id {
            if id != self.vocabulary_id {
                return Err(ModelError::InvalidArgument(format!(
                    "submitted tree names vocabulary {id}, expected {}",
                    self.vocabulary_id
                )));
            }
        }
        let view = if desired.status == VocabularyStatus::Draft {
            TemporalView::Draft
        } else {
            TemporalView::Current
        };
        let started_at = Instant::now();
        info!(
            "event=vocabulary_apply module=aggregate status=start vocabulary_id={} view={} actor={}",
            self.vocabulary_id, view, ctx.actor
        );

        let mut tasks = TaskAccumulator::new(self.vocabulary_id);
        let result = match view {
            TemporalView::Current => self.apply_current(ctx, desired, &mut tasks),
            TemporalView::Draft => self.apply_draft(ctx, desired, &mut tasks),
        }
        .and_then(|()| self.finish(ctx, tasks));

        match &result {
            Ok(outcome) => info!(
                "event=vocabulary_apply module=aggregate status=ok vocabulary_id={} view={} failed_tasks={} duration_ms={}",
                self.vocabulary_id,
                view,
                outcome.as_ref().map_or(0, |outcome| outcome.failed_tasks.len()),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=vocabulary_apply module=aggregate status=error vocabulary_id={} view={} duration_ms={} error={}",
                self.vocabulary_id,
                view,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    /// Removes the current view, historicizing every current row.
    ///
    /// With `preserve_draft` and no existing draft, every historicized row
    /// is also cloned into a new draft row.
    pub fn delete_only_current(
        &mut self,
        ctx: &ReconcileContext,
        preserve_draft: bool,
    ) -> ModelResult<Option<WorkflowOutcome>> {
        if self.current.is_none() {
            return Err(ModelError::InvalidArgument(format!(
                "vocabulary {} has no current instance",
                self.vocabulary_id
            )));
        }
        if preserve_draft && !self.has_draft() {
            return self.historicize_into_draft(ctx);
        }
        info!(
            "event=vocabulary_delete_current module=aggregate status=start vocabulary_id={} actor={}",
            self.vocabulary_id, ctx.actor
        );

        let mut tasks = TaskAccumulator::new(self.vocabulary_id);
        self.historicize_root(ctx)?;
        self.versions.delete_only_current(ctx, &mut tasks)?;
        self.related_entities.delete_only_current(ctx)?;
        self.related_vocabularies.delete_only_current(ctx)?;
        self.finish(ctx, tasks)
    }

    /// Hard-deletes every draft row of the tree.
    pub fn delete_only_draft(&mut self) -> ModelResult<()> {
        if !self.has_draft() {
            return Err(ModelError::InvalidArgument(format!(
                "vocabulary {} has no draft instance",
                self.vocabulary_id
            )));
        }
        info!(
            "event=vocabulary_delete_draft module=aggregate status=start vocabulary_id={}",
            self.vocabulary_id
        );
        self.consume_draft()
    }

    /// Seeds the draft view with a copy of the current tree.
    ///
    /// Current rows stay untouched, so deleting the draft afterwards
    /// leaves the vocabulary exactly as it was. No workflow is scheduled.
    ///
    /// # Errors
    /// - `InvalidArgument` when nothing is current or a draft exists.
    pub fn promote_current_to_draft(
        &mut self,
        ctx: &ReconcileContext,
    ) -> ModelResult<Option<WorkflowOutcome>> {
        let Some(current) = self.current.clone() else {
            return Err(ModelError::InvalidArgument(format!(
                "vocabulary {} has no current instance",
                self.vocabulary_id
            )));
        };
        if self.has_draft() {
            return Err(ModelError::InvalidArgument(format!(
                "vocabulary {} already has a draft instance",
                self.vocabulary_id
            )));
        }
        info!(
            "event=vocabulary_promote_draft module=aggregate status=start vocabulary_id={} actor={}",
            self.vocabulary_id, ctx.actor
        );

        let mut row = current;
        row.status = VocabularyStatus::Draft;
        self.insert_draft_root(ctx, row)?;
        self.versions.copy_current_to_draft(ctx)?;
        Ok(None)
    }

    /// One diagnostic line per loaded row, classified at the system time.
    pub fn describe_model(&self) -> Vec<String> {
        self.describe_model_at(system_now_millis())
    }

    /// One diagnostic line per loaded row, classified at `now`.
    pub fn describe_model_at(&self, now: i64) -> Vec<String> {
        let mut lines = vec![format!("vocabulary_id={}", self.vocabulary_id)];
        for row in self.current.iter().chain(self.draft.iter()) {
            lines.push(describe_row(
                "vocabulary",
                row.vocabulary_id,
                row,
                row.row_id,
                now,
            ));
        }
        self.versions.describe(now, &mut lines);
        self.related_entities.describe(now, &mut lines);
        self.related_vocabularies.describe(now, &mut lines);
        lines
    }

    fn project(
        &self,
        view: TemporalView,
        row: &Vocabulary,
        projection: &TreeProjection,
    ) -> VocabularyTree {
        let mut tree = VocabularyTree::from_row(row);
        if projection.versions {
            tree.versions = self.versions.project(view, projection);
        }
        if projection.related_entities {
            tree.related_entity_refs = group_refs(self.related_entities.keys(view));
        }
        if projection.related_vocabularies {
            tree.related_vocabulary_refs = group_refs(self.related_vocabularies.keys(view));
        }
        tree
    }

    fn apply_current(
        &mut self,
        ctx: &ReconcileContext,
        desired: &VocabularyTree,
        tasks: &mut TaskAccumulator,
    ) -> ModelResult<()> {
        if let Some(current) = &self.current {
            if desired.differs_from(current) {
                self.historicize_root(ctx)?;
                let row = self.new_root(desired);
                self.insert_current_root(ctx, row)?;
            }
        } else if let Some(mut draft) = self.draft.take() {
            // Publish the draft root in place.
            assign(&mut draft, desired);
            draft.modified_by = ctx.actor.clone();
            make_current(&mut draft, ctx.now);
            self.store.vocabularies().update(&draft)?;
            self.current = Some(draft);
        } else {
            let row = self.new_root(desired);
            self.insert_current_root(ctx, row)?;
        }

        self.versions
            .apply_changes(ctx, TemporalView::Current, &desired.versions, tasks)?;
        self.related_entities.apply_changes(
            ctx,
            TemporalView::Current,
            &flatten_refs(&desired.related_entity_refs),
        )?;
        self.related_vocabularies.apply_changes(
            ctx,
            TemporalView::Current,
            &flatten_refs(&desired.related_vocabulary_refs),
        )?;
        self.consume_draft()
    }

    fn apply_draft(
        &mut self,
        ctx: &ReconcileContext,
        desired: &VocabularyTree,
        tasks: &mut TaskAccumulator,
    ) -> ModelResult<()> {
        match self.draft.as_mut() {
            Some(draft) => {
                if desired.differs_from(draft) {
                    assign(draft, desired);
                    draft.modified_by = ctx.actor.clone();
                    self.store.vocabularies().update(draft)?;
                }
            }
            None => {
                let row = self.new_root(desired);
                self.insert_draft_root(ctx, row)?;
            }
        }

        self.versions
            .apply_changes(ctx, TemporalView::Draft, &desired.versions, tasks)?;
        self.related_entities.apply_changes(
            ctx,
            TemporalView::Draft,
            &flatten_refs(&desired.related_entity_refs),
        )?;
        self.related_vocabularies.apply_changes(
            ctx,
            TemporalView::Draft,
            &flatten_refs(&desired.related_vocabulary_refs),
        )
    }

    /// Persists and runs scheduled tasks, reloading when any ran.
    fn finish(
        &mut self,
        ctx: &ReconcileContext,
        mut tasks: TaskAccumulator,
    ) -> ModelResult<Option<WorkflowOutcome>> {
        if tasks.is_empty() {
            return Ok(None);
        }
        tasks.persist(&self.store, ctx)?;
        if tasks.run_all(&self.store, ctx, self.providers)? {
            self.reload()?;
        }
        Ok(tasks.build_outcome())
    }

    /// Historicizes every current row and clones it into a draft row.
    fn historicize_into_draft(
        &mut self,
        ctx: &ReconcileContext,
    ) -> ModelResult<Option<WorkflowOutcome>> {
        info!(
            "event=vocabulary_delete_current module=aggregate status=start vocabulary_id={} actor={} preserve_draft=true",
            self.vocabulary_id, ctx.actor
        );

        let mut tasks = TaskAccumulator::new(self.vocabulary_id);
        let mut row = self.historicize_root(ctx)?;
        row.status = VocabularyStatus::Draft;
        self.insert_draft_root(ctx, row)?;
        self.versions.promote_current_to_draft(ctx, &mut tasks)?;
        self.related_entities.promote_current_to_draft(ctx)?;
        self.related_vocabularies.promote_current_to_draft(ctx)?;
        self.finish(ctx, tasks)
    }

    fn reload(&mut self) -> ModelResult<()> {
        *self = Self::load(self.store, self.providers, self.vocabulary_id)?;
        Ok(())
    }

    /// Hard-deletes every remaining draft row.
    fn consume_draft(&mut self) -> ModelResult<()> {
        if let Some(draft) = self.draft.take() {
            self.store.vocabularies().delete(draft.row_id)?;
        }
        self.versions.delete_only_draft()?;
        self.related_entities.delete_only_draft()?;
        self.related_vocabularies.delete_only_draft()
    }

    fn historicize_root(&mut self, ctx: &ReconcileContext) -> ModelResult<Vocabulary> {
        let mut row = self.current.take().ok_or_else(|| {
            ModelError::Inconsistent(format!(
                "vocabulary {} is not current",
                self.vocabulary_id
            ))
        })?;
        row.modified_by = ctx.actor.clone();
        make_historical(&mut row, ctx.now);
        self.store.vocabularies().update(&row)?;
        Ok(row)
    }

    fn insert_current_root(&mut self, ctx: &ReconcileContext, mut row: Vocabulary) -> ModelResult<()> {
        row.modified_by = ctx.actor.clone();
        make_current(&mut row, ctx.now);
        row.row_id = self.store.vocabularies().insert(&row)?;
        self.current = Some(row);
        Ok(())
    }

    fn insert_draft_root(&mut self, ctx: &ReconcileContext, mut row: Vocabulary) -> ModelResult<()> {
        row.modified_by = ctx.actor.clone();
        make_draft(&mut row);
        row.row_id = self.store.vocabularies().insert(&row)?;
        self.draft = Some(row);
        Ok(())
    }

    fn new_root(&self, desired: &VocabularyTree) -> Vocabulary {
        let mut row = Vocabulary {
            row_id: 0,
            vocabulary_id: self.vocabulary_id,
            start_date: 0,
            end_date: 0,
            modified_by: String::new(),
            owner: String::new(),
            status: desired.status,
            slug: String::new(),
            data: Default::default(),
        };
        assign(&mut row, desired);
        row
    }
}

/// Copies the client-authored root fields of `desired` onto `row`.
fn assign(row: &mut Vocabulary, desired: &VocabularyTree) {
    row.owner = desired.owner.clone();
    row.status = desired.status;
    row.slug = desired.slug.clone();
    row.data = desired.data.clone();
}

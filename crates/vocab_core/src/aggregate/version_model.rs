//! Version aggregate.
//!
//! # Responsibility
//! - Own the version rows of one vocabulary and compose the access point
//!   and version artefact models.
//! - Derive workflow subtasks from workflow flag changes of current
//!   versions.
//!
//! # Invariants
//! - Children are reconciled only for versions that survive the version
//!   level reconciliation; deleted versions take their children with them.
//! - Draft-view changes never touch the task accumulator.

use crate::aggregate::access_point_model::AccessPointModel;
use crate::aggregate::version_artefact_model::VersionArtefactModel;
use crate::aggregate::{
    describe_row, sorted_submission, ModelError, ModelResult, ReconcileContext, TemporalView,
};
use crate::model::schema::{AccessPointTree, TreeProjection, VersionTree};
use crate::model::task::{Subtask, SubtaskOperation, SubtaskProvider};
use crate::model::temporal::{make_current, make_draft, make_historical};
use crate::model::version::{Version, VersionId, WorkflowFlags};
use crate::model::vocabulary::VocabularyId;
use crate::reconcile::{reconcile, EditVisitor, Identified};
use crate::repo::id_allocator::{IdAllocator, IdKind};
use crate::repo::version_repo::VersionRepository;
use crate::repo::Store;
use crate::workflow::TaskAccumulator;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

impl Identified for Version {
    type Key = VersionId;

    fn identity(&self) -> Option<VersionId> {
        Some(self.version_id)
    }
}

impl Identified for VersionTree {
    type Key = VersionId;

    fn identity(&self) -> Option<VersionId> {
        self.id
    }
}

pub struct VersionModel<'conn> {
    store: Store<'conn>,
    vocabulary_id: VocabularyId,
    current: BTreeMap<VersionId, Version>,
    draft: BTreeMap<VersionId, Version>,
    access_points: AccessPointModel<'conn>,
    version_artefacts: VersionArtefactModel<'conn>,
}

impl<'conn> VersionModel<'conn> {
    pub(crate) fn load(store: Store<'conn>, vocabulary_id: VocabularyId) -> ModelResult<Self> {
        let repo = store.versions();
        let current: BTreeMap<VersionId, Version> = repo
            .load_current(vocabulary_id)?
            .into_iter()
            .map(|row| (row.version_id, row))
            .collect();
        let draft: BTreeMap<VersionId, Version> = repo
            .load_draft(vocabulary_id)?
            .into_iter()
            .map(|row| (row.version_id, row))
            .collect();
        let version_ids: BTreeSet<VersionId> =
            current.keys().chain(draft.keys()).copied().collect();

        Ok(Self {
            store,
            vocabulary_id,
            access_points: AccessPointModel::load(store, &version_ids)?,
            version_artefacts: VersionArtefactModel::load(store, &version_ids)?,
            current,
            draft,
        })
    }

    pub fn current(&self) -> impl Iterator<Item = &Version> {
        self.current.values()
    }

    pub fn draft(&self) -> impl Iterator<Item = &Version> {
        self.draft.values()
    }

    pub fn access_points(&self) -> &AccessPointModel<'conn> {
        &self.access_points
    }

    pub fn version_artefacts(&self) -> &VersionArtefactModel<'conn> {
        &self.version_artefacts
    }

    pub(crate) fn has_draft(&self) -> bool {
        !self.draft.is_empty() || self.access_points.has_draft() || self.version_artefacts.has_draft()
    }

    pub(crate) fn project(&self, view: TemporalView, projection: &TreeProjection) -> Vec<VersionTree> {
        self.rows(view)
            .values()
            .map(|row| {
                let mut tree = VersionTree::from_row(row);
                if projection.access_points {
                    tree.access_points = self.access_points.project(view, row.version_id);
                }
                if projection.version_artefacts {
                    tree.version_artefacts =
                        self.version_artefacts.project(view, row.version_id);
                }
                tree
            })
            .collect()
    }

    /// Historicizes every current version together with its children.
    pub(crate) fn delete_only_current(
        &mut self,
        ctx: &ReconcileContext,
        tasks: &mut TaskAccumulator,
    ) -> ModelResult<()> {
        let version_ids: BTreeSet<VersionId> = self.current.keys().copied().collect();
        for version_id in &version_ids {
            self.delete_current_version(ctx, *version_id, tasks)?;
        }
        add_implied_subtasks(tasks, &self.current);
        Ok(())
    }

    /// Hard-deletes every draft version together with its children.
    pub(crate) fn delete_only_draft(&mut self) -> ModelResult<()> {
        let repo = self.store.versions();
        for (_, row) in std::mem::take(&mut self.draft) {
            repo.delete(row.row_id)?;
        }
        self.access_points.delete_all_drafts()?;
        self.version_artefacts.delete_all_drafts()
    }

    /// Clones every current version, children included, into the draft.
    ///
    /// # Errors
    /// - `InvalidArgument` when a draft version already exists.
    pub(crate) fn copy_current_to_draft(&mut self, ctx: &ReconcileContext) -> ModelResult<()> {
        self.ensure_no_draft()?;
        let rows: Vec<Version> = self.current.values().cloned().collect();
        for row in rows {
            self.access_points.copy_version_to_draft(ctx, row.version_id)?;
            self.version_artefacts
                .copy_version_to_draft(ctx, row.version_id)?;
            self.insert_draft(ctx, row)?;
        }
        Ok(())
    }

    /// Moves every current version, children included, into the draft.
    ///
    /// # Errors
    /// - `InvalidArgument` when a draft version already exists.
    pub(crate) fn promote_current_to_draft(
        &mut self,
        ctx: &ReconcileContext,
        tasks: &mut TaskAccumulator,
    ) -> ModelResult<()> {
        self.ensure_no_draft()?;
        let version_ids: BTreeSet<VersionId> = self.current.keys().copied().collect();
        for version_id in &version_ids {
            self.access_points
                .promote_version(ctx, *version_id, tasks)?;
            self.version_artefacts
                .promote_version(ctx, *version_id, tasks)?;
            let row = self.historicize(ctx, *version_id)?;
            self.insert_draft(ctx, row)?;
        }
        add_implied_subtasks(tasks, &self.current);
        Ok(())
    }

    fn ensure_no_draft(&self) -> ModelResult<()> {
        if !self.has_draft() {
            return Ok(());
        }
        Err(ModelError::InvalidArgument(format!(
            "vocabulary {} already has draft versions",
            self.vocabulary_id
        )))
    }

    /// Reconciles the submitted versions, then their children.
    pub(crate) fn apply_changes(
        &mut self,
        ctx: &ReconcileContext,
        view: TemporalView,
        submitted: &[VersionTree],
        tasks: &mut TaskAccumulator,
    ) -> ModelResult<()> {
        let desired = sorted_submission(submitted, "version")?;
        let existing: Vec<Version> = self.rows(view).values().cloned().collect();

        let mut visitor = VersionVisitor {
            model: self,
            ctx,
            view,
            tasks,
            resolved: Vec::new(),
        };
        reconcile(&existing, &desired, &mut visitor)?;
        let VersionVisitor { resolved, .. } = visitor;

        if view == TemporalView::Current {
            add_implied_subtasks(tasks, &self.current);
        }
        for (version_id, access_points) in resolved {
            self.access_points
                .apply_changes(ctx, view, version_id, &access_points, tasks)?;
        }
        Ok(())
    }

    pub(crate) fn describe(&self, now: i64, lines: &mut Vec<String>) {
        for row in self.current.values().chain(self.draft.values()) {
            lines.push(describe_row("version", row.version_id, row, row.row_id, now));
        }
        self.access_points.describe(now, lines);
        self.version_artefacts.describe(now, lines);
    }

    fn rows(&self, view: TemporalView) -> &BTreeMap<VersionId, Version> {
        match view {
            TemporalView::Current => &self.current,
            TemporalView::Draft => &self.draft,
        }
    }

    fn delete_current_version(
        &mut self,
        ctx: &ReconcileContext,
        version_id: VersionId,
        tasks: &mut TaskAccumulator,
    ) -> ModelResult<()> {
        self.access_points
            .notify_version_deleted(ctx, TemporalView::Current, version_id, tasks)?;
        self.version_artefacts
            .notify_version_deleted(ctx, TemporalView::Current, version_id, tasks)?;
        self.historicize(ctx, version_id)?;
        Ok(())
    }

    fn historicize(&mut self, ctx: &ReconcileContext, version_id: VersionId) -> ModelResult<Version> {
        let mut row = self.current.remove(&version_id).ok_or_else(|| {
            ModelError::Inconsistent(format!("version {version_id} is not current"))
        })?;
        row.modified_by = ctx.actor.clone();
        make_historical(&mut row, ctx.now);
        self.store.versions().update(&row)?;
        Ok(row)
    }

    fn insert_current(&mut self, ctx: &ReconcileContext, mut row: Version) -> ModelResult<()> {
        row.modified_by = ctx.actor.clone();
        make_current(&mut row, ctx.now);
        row.row_id = self.store.versions().insert(&row)?;
        self.current.insert(row.version_id, row);
        Ok(())
    }

    fn insert_draft(&mut self, ctx: &ReconcileContext, mut row: Version) -> ModelResult<()> {
        row.modified_by = ctx.actor.clone();
        make_draft(&mut row);
        row.row_id = self.store.versions().insert(&row)?;
        self.draft.insert(row.version_id, row);
        Ok(())
    }

    fn new_row(&self, version_id: VersionId, desired: &VersionTree) -> Version {
        Version {
            row_id: 0,
            version_id,
            vocabulary_id: self.vocabulary_id,
            start_date: 0,
            end_date: 0,
            modified_by: String::new(),
            status: desired.status,
            slug: desired.slug.clone(),
            release_date: desired.release_date.clone(),
            data: desired.data.clone(),
        }
    }
}

/// Copies the client-authored fields of `desired` onto `row`.
fn assign(row: &mut Version, desired: &VersionTree) {
    row.status = desired.status;
    row.slug = desired.slug.clone();
    row.release_date = desired.release_date.clone();
    row.data = desired.data.clone();
}

/// Schedules one subtask per workflow flag that changed value.
fn schedule_flag_changes(
    tasks: &mut TaskAccumulator,
    version_id: VersionId,
    before: WorkflowFlags,
    after: WorkflowFlags,
    force: bool,
) {
    let flags = [
        (SubtaskProvider::Harvest, before.harvest, after.harvest),
        (SubtaskProvider::Import, before.import, after.import),
        (SubtaskProvider::Publish, before.publish, after.publish),
    ];
    for (provider, was, is) in flags {
        if force || was != is {
            let operation = if is {
                SubtaskOperation::Insert
            } else {
                SubtaskOperation::Delete
            };
            tasks.add(version_id, Subtask::new(provider, operation));
        }
    }
    if after.harvest && after.import && (force || !before.harvest) {
        tasks.add(version_id, Subtask::insert(SubtaskProvider::Metadata));
    }
}

/// Adds the transform subtasks implied by harvest, import and publish
/// subtasks already scheduled.
///
/// Any harvest change re-runs the concept tree transform.
fn add_implied_subtasks(tasks: &mut TaskAccumulator, current: &BTreeMap<VersionId, Version>) {
    for version_id in tasks.version_ids() {
        let Some(task) = tasks.get_mut(version_id) else {
            continue;
        };
        if task.contains(SubtaskProvider::Harvest, SubtaskOperation::Insert)
            || task.contains(SubtaskProvider::Harvest, SubtaskOperation::Delete)
        {
            task.add_subtask(Subtask::insert(SubtaskProvider::ConceptTreeTransform));
        }

        let import_and_publish = current
            .get(&version_id)
            .map(|row| row.data.do_import && row.data.do_publish)
            .unwrap_or(false);
        if import_and_publish
            && (task.contains(SubtaskProvider::Import, SubtaskOperation::Insert)
                || task.contains(SubtaskProvider::Publish, SubtaskOperation::Insert))
        {
            task.add_subtask(Subtask::insert(SubtaskProvider::ResourceMapTransform));
        }
        if task.contains(SubtaskProvider::Import, SubtaskOperation::Delete)
            || task.contains(SubtaskProvider::Publish, SubtaskOperation::Delete)
        {
            task.add_subtask(Subtask::delete(SubtaskProvider::ResourceMapTransform));
        }
    }
}

struct VersionVisitor<'m, 'conn> {
    model: &'m mut VersionModel<'conn>,
    ctx: &'m ReconcileContext,
    view: TemporalView,
    tasks: &'m mut TaskAccumulator,
    /// Surviving versions and their submitted access points.
    resolved: Vec<(VersionId, Vec<AccessPointTree>)>,
}

impl VersionVisitor<'_, '_> {
    fn resolve(&mut self, version_id: VersionId, desired: &VersionTree) {
        self.resolved
            .push((version_id, desired.access_points.clone()));
    }
}

impl EditVisitor<Version, VersionTree> for VersionVisitor<'_, '_> {
    type Error = ModelError;

    fn keep(&mut self, existing: &Version, desired: &VersionTree) -> ModelResult<()> {
        let version_id = existing.version_id;
        let changed = desired.differs_from(existing);
        match self.view {
            TemporalView::Current => {
                if changed || desired.force_workflow {
                    debug!(
                        "event=version_update module=aggregate view=current version_id={} force_workflow={}",
                        version_id, desired.force_workflow
                    );
                    self.model.historicize(self.ctx, version_id)?;
                    let row = self.model.new_row(version_id, desired);
                    self.model.insert_current(self.ctx, row)?;
                }
                schedule_flag_changes(
                    self.tasks,
                    version_id,
                    existing.data.workflow_flags(),
                    desired.data.workflow_flags(),
                    desired.force_workflow,
                );
            }
            TemporalView::Draft => {
                if changed {
                    debug!(
                        "event=version_update module=aggregate view=draft version_id={}",
                        version_id
                    );
                    let row = self.model.draft.get_mut(&version_id).ok_or_else(|| {
                        ModelError::Inconsistent(format!("version {version_id} has no draft"))
                    })?;
                    assign(row, desired);
                    row.modified_by = self.ctx.actor.clone();
                    self.model.store.versions().update(row)?;
                }
            }
        }
        self.resolve(version_id, desired);
        Ok(())
    }

    fn delete(&mut self, existing: &Version) -> ModelResult<()> {
        let version_id = existing.version_id;
        debug!(
            "event=version_delete module=aggregate view={} version_id={}",
            self.view, version_id
        );
        match self.view {
            TemporalView::Current => {
                self.model
                    .delete_current_version(self.ctx, version_id, self.tasks)?;
            }
            TemporalView::Draft => {
                self.model.access_points.notify_version_deleted(
                    self.ctx,
                    TemporalView::Draft,
                    version_id,
                    self.tasks,
                )?;
                self.model.version_artefacts.notify_version_deleted(
                    self.ctx,
                    TemporalView::Draft,
                    version_id,
                    self.tasks,
                )?;
                if let Some(row) = self.model.draft.remove(&version_id) {
                    self.model.store.versions().delete(row.row_id)?;
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, desired: &VersionTree) -> ModelResult<()> {
        let version_id = match (self.view, desired.id) {
            (TemporalView::Current, Some(id)) => {
                let mut row = self.model.draft.remove(&id).ok_or_else(|| {
                    ModelError::InvalidArgument(format!(
                        "version {id} does not belong to vocabulary {}",
                        self.model.vocabulary_id
                    ))
                })?;
                // Promote the draft row in place.
                assign(&mut row, desired);
                row.modified_by = self.ctx.actor.clone();
                make_current(&mut row, self.ctx.now);
                self.model.store.versions().update(&row)?;
                self.model.current.insert(id, row);
                id
            }
            (TemporalView::Current, None) => {
                let id = self.model.store.ids().allocate(IdKind::Version)?;
                let row = self.model.new_row(id, desired);
                self.model.insert_current(self.ctx, row)?;
                id
            }
            (TemporalView::Draft, Some(id)) => {
                if !self.model.current.contains_key(&id) {
                    return Err(ModelError::InvalidArgument(format!(
                        "version {id} does not belong to vocabulary {}",
                        self.model.vocabulary_id
                    )));
                }
                let row = self.model.new_row(id, desired);
                self.model.insert_draft(self.ctx, row)?;
                id
            }
            (TemporalView::Draft, None) => {
                let id = self.model.store.ids().allocate(IdKind::Version)?;
                let row = self.model.new_row(id, desired);
                self.model.insert_draft(self.ctx, row)?;
                id
            }
        };
        debug!(
            "event=version_insert module=aggregate view={} version_id={}",
            self.view, version_id
        );
        if self.view == TemporalView::Current {
            schedule_flag_changes(
                self.tasks,
                version_id,
                WorkflowFlags::default(),
                desired.data.workflow_flags(),
                false,
            );
        }
        self.resolve(version_id, desired);
        Ok(())
    }
}

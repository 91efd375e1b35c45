//! Access point aggregate: user-authored endpoints of each version.
//!
//! # Responsibility
//! - Reconcile submitted access points of one version against the
//!   current or draft view.
//! - Clean up (and schedule cleanup for) every access point of a version
//!   the parent deletes.
//!
//! # Invariants
//! - Only `source = user` rows take part in reconciliation; system rows
//!   are never matched against a submission and never removed by one.

use crate::aggregate::version_children::VersionChildren;
use crate::aggregate::{
    sorted_submission, ModelError, ModelResult, ReconcileContext, TemporalView,
};
use crate::model::access_point::{AccessPoint, AccessPointId, AccessPointSource};
use crate::model::schema::AccessPointTree;
use crate::model::version::VersionId;
use crate::reconcile::{reconcile, EditVisitor, Identified};
use crate::repo::id_allocator::{IdAllocator, IdKind};
use crate::repo::Store;
use crate::workflow::TaskAccumulator;
use log::debug;
use std::collections::BTreeSet;

impl Identified for AccessPoint {
    type Key = AccessPointId;

    fn identity(&self) -> Option<AccessPointId> {
        Some(self.access_point_id)
    }
}

impl Identified for AccessPointTree {
    type Key = AccessPointId;

    fn identity(&self) -> Option<AccessPointId> {
        self.id
    }
}

pub struct AccessPointModel<'conn> {
    store: Store<'conn>,
    rows: VersionChildren<'conn, AccessPoint>,
}

impl<'conn> AccessPointModel<'conn> {
    pub(crate) fn load(store: Store<'conn>, version_ids: &BTreeSet<VersionId>) -> ModelResult<Self> {
        Ok(Self {
            store,
            rows: VersionChildren::load(store, version_ids)?,
        })
    }

    pub fn current(&self, version_id: VersionId) -> &[AccessPoint] {
        self.rows.current(version_id)
    }

    pub fn draft(&self, version_id: VersionId) -> &[AccessPoint] {
        self.rows.draft(version_id)
    }

    pub(crate) fn has_draft(&self) -> bool {
        self.rows.has_draft()
    }

    pub(crate) fn project(&self, view: TemporalView, version_id: VersionId) -> Vec<AccessPointTree> {
        let rows = match view {
            TemporalView::Current => self.current(version_id),
            TemporalView::Draft => self.draft(version_id),
        };
        rows.iter().map(AccessPointTree::from_row).collect()
    }

    /// The parent version was removed from `view`.
    pub(crate) fn notify_version_deleted(
        &mut self,
        ctx: &ReconcileContext,
        view: TemporalView,
        version_id: VersionId,
        tasks: &mut TaskAccumulator,
    ) -> ModelResult<()> {
        match view {
            TemporalView::Current => self.rows.historicize_version(ctx, version_id, tasks),
            TemporalView::Draft => self.rows.delete_version_drafts(version_id),
        }
    }

    pub(crate) fn copy_version_to_draft(
        &mut self,
        ctx: &ReconcileContext,
        version_id: VersionId,
    ) -> ModelResult<()> {
        self.rows.copy_version_to_draft(ctx, version_id)
    }

    pub(crate) fn promote_version(
        &mut self,
        ctx: &ReconcileContext,
        version_id: VersionId,
        tasks: &mut TaskAccumulator,
    ) -> ModelResult<()> {
        self.rows.promote_version(ctx, version_id, tasks)
    }

    pub(crate) fn delete_all_drafts(&mut self) -> ModelResult<()> {
        self.rows.delete_all_drafts()
    }

    /// Reconciles the user access points of one version.
    pub(crate) fn apply_changes(
        &mut self,
        ctx: &ReconcileContext,
        view: TemporalView,
        version_id: VersionId,
        submitted: &[AccessPointTree],
        tasks: &mut TaskAccumulator,
    ) -> ModelResult<()> {
        let user_submitted: Vec<AccessPointTree> = submitted
            .iter()
            .filter(|item| item.source == AccessPointSource::User)
            .cloned()
            .collect();
        let desired = sorted_submission(&user_submitted, "access point")?;
        let existing: Vec<AccessPoint> = match view {
            TemporalView::Current => self.rows.current(version_id),
            TemporalView::Draft => self.rows.draft(version_id),
        }
        .iter()
        .filter(|row| row.source == AccessPointSource::User)
        .cloned()
        .collect();

        let mut visitor = AccessPointVisitor {
            model: self,
            ctx,
            view,
            version_id,
            tasks,
        };
        reconcile(&existing, &desired, &mut visitor)
    }

    pub(crate) fn describe(&self, now: i64, lines: &mut Vec<String>) {
        self.rows.describe(now, lines);
    }

    fn new_row(
        &self,
        version_id: VersionId,
        access_point_id: AccessPointId,
        desired: &AccessPointTree,
    ) -> AccessPoint {
        AccessPoint {
            row_id: 0,
            access_point_id,
            version_id,
            start_date: 0,
            end_date: 0,
            modified_by: String::new(),
            kind: desired.kind,
            source: AccessPointSource::User,
            data: desired.data.clone(),
        }
    }

    /// Resolves the identity of a submitted access point that is not in
    /// the reconciled view.
    fn identity_for_insert(
        &self,
        view: TemporalView,
        version_id: VersionId,
        desired: &AccessPointTree,
    ) -> ModelResult<Option<AccessPointId>> {
        let Some(id) = desired.id else {
            return Ok(None);
        };
        let known = match view {
            TemporalView::Current => self.rows.draft(version_id),
            TemporalView::Draft => self.rows.current(version_id),
        }
        .iter()
        .any(|row| row.access_point_id == id);
        if !known {
            return Err(ModelError::InvalidArgument(format!(
                "access point {id} does not belong to version {version_id}"
            )));
        }
        Ok(Some(id))
    }
}

struct AccessPointVisitor<'m, 'conn> {
    model: &'m mut AccessPointModel<'conn>,
    ctx: &'m ReconcileContext,
    view: TemporalView,
    version_id: VersionId,
    tasks: &'m mut TaskAccumulator,
}

impl EditVisitor<AccessPoint, AccessPointTree> for AccessPointVisitor<'_, '_> {
    type Error = ModelError;

    fn keep(&mut self, existing: &AccessPoint, desired: &AccessPointTree) -> ModelResult<()> {
        if !desired.differs_from(existing) {
            return Ok(());
        }
        debug!(
            "event=access_point_update module=aggregate view={} version_id={} access_point_id={}",
            self.view, self.version_id, existing.access_point_id
        );
        match self.view {
            TemporalView::Current => {
                self.model
                    .rows
                    .historicize(self.ctx, self.version_id, existing.access_point_id)?;
                let row = self
                    .model
                    .new_row(self.version_id, existing.access_point_id, desired);
                self.model.rows.insert_current(self.ctx, self.version_id, row)
            }
            TemporalView::Draft => self.model.rows.update_draft(
                self.ctx,
                self.version_id,
                existing.access_point_id,
                |row| {
                    row.kind = desired.kind;
                    row.data = desired.data.clone();
                },
            ),
        }
    }

    fn delete(&mut self, existing: &AccessPoint) -> ModelResult<()> {
        debug!(
            "event=access_point_delete module=aggregate view={} version_id={} access_point_id={}",
            self.view, self.version_id, existing.access_point_id
        );
        match self.view {
            TemporalView::Current => {
                let closed = self.model.rows.historicize(
                    self.ctx,
                    self.version_id,
                    existing.access_point_id,
                )?;
                if let Some(subtask) = closed.removal_subtask() {
                    self.tasks.add(self.version_id, subtask);
                }
                Ok(())
            }
            TemporalView::Draft => self
                .model
                .rows
                .delete_draft(self.version_id, existing.access_point_id),
        }
    }

    fn insert(&mut self, desired: &AccessPointTree) -> ModelResult<()> {
        let known_id = self
            .model
            .identity_for_insert(self.view, self.version_id, desired)?;
        debug!(
            "event=access_point_insert module=aggregate view={} version_id={} access_point_id={:?}",
            self.view, self.version_id, known_id
        );
        match (self.view, known_id) {
            (TemporalView::Current, Some(id)) => {
                self.model
                    .rows
                    .promote_draft(self.ctx, self.version_id, id, |row| {
                        row.kind = desired.kind;
                        row.data = desired.data.clone();
                    })?;
                Ok(())
            }
            (TemporalView::Current, None) => {
                let id = self.model.store.ids().allocate(IdKind::AccessPoint)?;
                let row = self.model.new_row(self.version_id, id, desired);
                self.model.rows.insert_current(self.ctx, self.version_id, row)
            }
            (TemporalView::Draft, known) => {
                let id = match known {
                    Some(id) => id,
                    None => self.model.store.ids().allocate(IdKind::AccessPoint)?,
                };
                let row = self.model.new_row(self.version_id, id, desired);
                self.model.rows.insert_draft(self.ctx, self.version_id, row)
            }
        }
    }
}

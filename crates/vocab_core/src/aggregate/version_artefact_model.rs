//! Version artefact aggregate.
//!
//! Artefacts are produced by workflow providers, not by clients, so a
//! submission never changes them. The model only follows its parent
//! version through deletion and promotion.

use crate::aggregate::version_children::VersionChildren;
use crate::aggregate::{ModelResult, ReconcileContext, TemporalView};
use crate::model::schema::VersionArtefactTree;
use crate::model::version::VersionId;
use crate::model::version_artefact::VersionArtefact;
use crate::repo::Store;
use crate::workflow::TaskAccumulator;
use std::collections::BTreeSet;

pub struct VersionArtefactModel<'conn> {
    rows: VersionChildren<'conn, VersionArtefact>,
}

impl<'conn> VersionArtefactModel<'conn> {
    pub(crate) fn load(store: Store<'conn>, version_ids: &BTreeSet<VersionId>) -> ModelResult<Self> {
        Ok(Self {
            rows: VersionChildren::load(store, version_ids)?,
        })
    }

    pub fn current(&self, version_id: VersionId) -> &[VersionArtefact] {
        self.rows.current(version_id)
    }

    pub fn draft(&self, version_id: VersionId) -> &[VersionArtefact] {
        self.rows.draft(version_id)
    }

    pub(crate) fn has_draft(&self) -> bool {
        self.rows.has_draft()
    }

    pub(crate) fn project(
        &self,
        view: TemporalView,
        version_id: VersionId,
    ) -> Vec<VersionArtefactTree> {
        let rows = match view {
            TemporalView::Current => self.current(version_id),
            TemporalView::Draft => self.draft(version_id),
        };
        rows.iter().map(VersionArtefactTree::from_row).collect()
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

    pub(crate) fn describe(&self, now: i64, lines: &mut Vec<String>) {
        self.rows.describe(now, lines);
    }
}

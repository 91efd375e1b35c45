//! Per-version child rows shared by access points and version artefacts.
//!
//! # Invariants
//! - Rows are grouped by version and kept sorted by child identity, so
//!   they can be fed straight into the sequence reconciler.
//! - Current rows leave the cache when they are historicized; history is
//!   never cached.

use crate::aggregate::{describe_row, ModelError, ModelResult, ReconcileContext};
use crate::model::access_point::AccessPoint;
use crate::model::task::Subtask;
use crate::model::temporal::{make_current, make_draft, make_historical, TemporalRecord};
use crate::model::version::VersionId;
use crate::model::version_artefact::VersionArtefact;
use crate::model::RowId;
use crate::repo::access_point_repo::AccessPointRepository;
use crate::repo::version_artefact_repo::VersionArtefactRepository;
use crate::repo::{RepoResult, Store};
use crate::workflow::TaskAccumulator;
use std::collections::{BTreeMap, BTreeSet};

/// Row stored per version and identified by its own logical id.
pub(crate) trait VersionChild: TemporalRecord + Clone {
    /// Name used in logs and diagnostics.
    const LABEL: &'static str;

    fn child_id(&self) -> i64;
    fn row_id(&self) -> RowId;
    fn set_row_id(&mut self, row_id: RowId);
    fn set_modified_by(&mut self, actor: &str);
    fn removal_subtask(&self) -> Option<Subtask>;

    fn load_current(store: &Store<'_>, version_id: VersionId) -> RepoResult<Vec<Self>>;
    fn load_draft(store: &Store<'_>, version_id: VersionId) -> RepoResult<Vec<Self>>;
    fn insert_row(store: &Store<'_>, row: &Self) -> RepoResult<RowId>;
    fn update_row(store: &Store<'_>, row: &Self) -> RepoResult<()>;
    fn delete_row(store: &Store<'_>, row_id: RowId) -> RepoResult<()>;
}

impl VersionChild for AccessPoint {
    const LABEL: &'static str = "access_point";

    fn child_id(&self) -> i64 {
        self.access_point_id
    }

    fn row_id(&self) -> RowId {
        self.row_id
    }

    fn set_row_id(&mut self, row_id: RowId) {
        self.row_id = row_id;
    }

    fn set_modified_by(&mut self, actor: &str) {
        self.modified_by = actor.to_string();
    }

    fn removal_subtask(&self) -> Option<Subtask> {
        AccessPoint::removal_subtask(self)
    }

    fn load_current(store: &Store<'_>, version_id: VersionId) -> RepoResult<Vec<Self>> {
        store.access_points().load_current(version_id)
    }

    fn load_draft(store: &Store<'_>, version_id: VersionId) -> RepoResult<Vec<Self>> {
        store.access_points().load_draft(version_id)
    }

    fn insert_row(store: &Store<'_>, row: &Self) -> RepoResult<RowId> {
        store.access_points().insert(row)
    }

    fn update_row(store: &Store<'_>, row: &Self) -> RepoResult<()> {
        store.access_points().update(row)
    }

    fn delete_row(store: &Store<'_>, row_id: RowId) -> RepoResult<()> {
        store.access_points().delete(row_id)
    }
}

impl VersionChild for VersionArtefact {
    const LABEL: &'static str = "version_artefact";

    fn child_id(&self) -> i64 {
        self.version_artefact_id
    }

    fn row_id(&self) -> RowId {
        self.row_id
    }

    fn set_row_id(&mut self, row_id: RowId) {
        self.row_id = row_id;
    }

    fn set_modified_by(&mut self, actor: &str) {
        self.modified_by = actor.to_string();
    }

    fn removal_subtask(&self) -> Option<Subtask> {
        VersionArtefact::removal_subtask(self)
    }

    fn load_current(store: &Store<'_>, version_id: VersionId) -> RepoResult<Vec<Self>> {
        store.version_artefacts().load_current(version_id)
    }

    fn load_draft(store: &Store<'_>, version_id: VersionId) -> RepoResult<Vec<Self>> {
        store.version_artefacts().load_draft(version_id)
    }

    fn insert_row(store: &Store<'_>, row: &Self) -> RepoResult<RowId> {
        store.version_artefacts().insert(row)
    }

    fn update_row(store: &Store<'_>, row: &Self) -> RepoResult<()> {
        store.version_artefacts().update(row)
    }

    fn delete_row(store: &Store<'_>, row_id: RowId) -> RepoResult<()> {
        store.version_artefacts().delete(row_id)
    }
}

/// Cached current and draft child rows of a set of versions.
pub(crate) struct VersionChildren<'conn, T> {
    store: Store<'conn>,
    current: BTreeMap<VersionId, Vec<T>>,
    draft: BTreeMap<VersionId, Vec<T>>,
}

impl<'conn, T: VersionChild> VersionChildren<'conn, T> {
    pub(crate) fn load(store: Store<'conn>, version_ids: &BTreeSet<VersionId>) -> ModelResult<Self> {
        let mut current = BTreeMap::new();
        let mut draft = BTreeMap::new();
        for version_id in version_ids {
            let rows = T::load_current(&store, *version_id)?;
            if !rows.is_empty() {
                current.insert(*version_id, rows);
            }
            let rows = T::load_draft(&store, *version_id)?;
            if !rows.is_empty() {
                draft.insert(*version_id, rows);
            }
        }
        Ok(Self {
            store,
            current,
            draft,
        })
    }

    pub(crate) fn current(&self, version_id: VersionId) -> &[T] {
        self.current
            .get(&version_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn draft(&self, version_id: VersionId) -> &[T] {
        self.draft.get(&version_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn has_draft(&self) -> bool {
        self.draft.values().any(|rows| !rows.is_empty())
    }

    /// Persists `row` as a new current row and caches it.
    pub(crate) fn insert_current(
        &mut self,
        ctx: &ReconcileContext,
        version_id: VersionId,
        mut row: T,
    ) -> ModelResult<()> {
        row.set_modified_by(&ctx.actor);
        make_current(&mut row, ctx.now);
        let row_id = T::insert_row(&self.store, &row)?;
        row.set_row_id(row_id);
        insert_sorted(self.current.entry(version_id).or_default(), row);
        Ok(())
    }

    /// Persists `row` as a new draft addition and caches it.
    pub(crate) fn insert_draft(
        &mut self,
        ctx: &ReconcileContext,
        version_id: VersionId,
        mut row: T,
    ) -> ModelResult<()> {
        row.set_modified_by(&ctx.actor);
        make_draft(&mut row);
        let row_id = T::insert_row(&self.store, &row)?;
        row.set_row_id(row_id);
        insert_sorted(self.draft.entry(version_id).or_default(), row);
        Ok(())
    }

    /// Closes the current row of `child_id` at `ctx.now`.
    pub(crate) fn historicize(
        &mut self,
        ctx: &ReconcileContext,
        version_id: VersionId,
        child_id: i64,
    ) -> ModelResult<T> {
        let mut row = take_row(&mut self.current, version_id, child_id).ok_or_else(|| {
            ModelError::Inconsistent(format!(
                "{} {child_id} is not current in version {version_id}",
                T::LABEL
            ))
        })?;
        row.set_modified_by(&ctx.actor);
        make_historical(&mut row, ctx.now);
        T::update_row(&self.store, &row)?;
        Ok(row)
    }

    /// Turns the draft row of `child_id` into the current row, in place.
    pub(crate) fn promote_draft(
        &mut self,
        ctx: &ReconcileContext,
        version_id: VersionId,
        child_id: i64,
        apply: impl FnOnce(&mut T),
    ) -> ModelResult<bool> {
        let Some(mut row) = take_row(&mut self.draft, version_id, child_id) else {
            return Ok(false);
        };
        apply(&mut row);
        row.set_modified_by(&ctx.actor);
        make_current(&mut row, ctx.now);
        T::update_row(&self.store, &row)?;
        insert_sorted(self.current.entry(version_id).or_default(), row);
        Ok(true)
    }

    /// Rewrites the draft row of `child_id` in place.
    pub(crate) fn update_draft(
        &mut self,
        ctx: &ReconcileContext,
        version_id: VersionId,
        child_id: i64,
        apply: impl FnOnce(&mut T),
    ) -> ModelResult<()> {
        let row = self
            .draft
            .get_mut(&version_id)
            .and_then(|rows| rows.iter_mut().find(|row| row.child_id() == child_id))
            .ok_or_else(|| {
                ModelError::Inconsistent(format!(
                    "{} {child_id} has no draft in version {version_id}",
                    T::LABEL
                ))
            })?;
        apply(row);
        row.set_modified_by(&ctx.actor);
        T::update_row(&self.store, row)?;
        Ok(())
    }

    /// Hard-deletes the draft row of `child_id`.
    pub(crate) fn delete_draft(&mut self, version_id: VersionId, child_id: i64) -> ModelResult<()> {
        let row = take_row(&mut self.draft, version_id, child_id).ok_or_else(|| {
            ModelError::Inconsistent(format!(
                "{} {child_id} has no draft in version {version_id}",
                T::LABEL
            ))
        })?;
        T::delete_row(&self.store, row.row_id())?;
        Ok(())
    }

    /// Historicizes every current row of a version and schedules the
    /// cleanup each removal requires.
    pub(crate) fn historicize_version(
        &mut self,
        ctx: &ReconcileContext,
        version_id: VersionId,
        tasks: &mut TaskAccumulator,
    ) -> ModelResult<()> {
        let child_ids: Vec<i64> = self
            .current(version_id)
            .iter()
            .map(VersionChild::child_id)
            .collect();
        for child_id in child_ids {
            let closed = self.historicize(ctx, version_id, child_id)?;
            if let Some(subtask) = closed.removal_subtask() {
                tasks.add(version_id, subtask);
            }
        }
        self.current.remove(&version_id);
        Ok(())
    }

    /// Hard-deletes every draft row of a version.
    pub(crate) fn delete_version_drafts(&mut self, version_id: VersionId) -> ModelResult<()> {
        for row in self.draft.remove(&version_id).unwrap_or_default() {
            T::delete_row(&self.store, row.row_id())?;
        }
        Ok(())
    }

    pub(crate) fn delete_all_drafts(&mut self) -> ModelResult<()> {
        let version_ids: Vec<VersionId> = self.draft.keys().copied().collect();
        for version_id in version_ids {
            self.delete_version_drafts(version_id)?;
        }
        Ok(())
    }

    /// Clones the current rows of `version_id` into draft rows.
    ///
    /// # Errors
    /// - `InvalidArgument` when the version already has draft rows.
    pub(crate) fn copy_version_to_draft(
        &mut self,
        ctx: &ReconcileContext,
        version_id: VersionId,
    ) -> ModelResult<()> {
        self.ensure_no_draft(version_id)?;
        for row in self.current(version_id).to_vec() {
            self.insert_draft(ctx, version_id, row)?;
        }
        Ok(())
    }

    /// Historicizes the current rows of `version_id` and clones them as drafts.
    pub(crate) fn promote_version(
        &mut self,
        ctx: &ReconcileContext,
        version_id: VersionId,
        tasks: &mut TaskAccumulator,
    ) -> ModelResult<()> {
        self.ensure_no_draft(version_id)?;
        let rows = self.current(version_id).to_vec();
        self.historicize_version(ctx, version_id, tasks)?;
        for row in rows {
            self.insert_draft(ctx, version_id, row)?;
        }
        Ok(())
    }

    fn ensure_no_draft(&self, version_id: VersionId) -> ModelResult<()> {
        if self.draft(version_id).is_empty() {
            return Ok(());
        }
        Err(ModelError::InvalidArgument(format!(
            "version {version_id} already has draft {} rows",
            T::LABEL
        )))
    }

    pub(crate) fn describe(&self, now: i64, lines: &mut Vec<String>) {
        for rows in self.current.values().chain(self.draft.values()) {
            for row in rows {
                lines.push(describe_row(
                    T::LABEL,
                    row.child_id(),
                    row,
                    row.row_id(),
                    now,
                ));
            }
        }
    }
}

fn take_row<T: VersionChild>(
    rows: &mut BTreeMap<VersionId, Vec<T>>,
    version_id: VersionId,
    child_id: i64,
) -> Option<T> {
    let group = rows.get_mut(&version_id)?;
    let index = group.iter().position(|row| row.child_id() == child_id)?;
    let row = group.remove(index);
    if group.is_empty() {
        rows.remove(&version_id);
    }
    Some(row)
}

fn insert_sorted<T: VersionChild>(rows: &mut Vec<T>, row: T) {
    let index = rows.partition_point(|existing| existing.child_id() < row.child_id());
    rows.insert(index, row);
}

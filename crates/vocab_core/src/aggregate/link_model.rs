//! Vocabulary link aggregate, shared by related entities and related
//! vocabularies.
//!
//! # Responsibility
//! - Reconcile the submitted link set of a vocabulary against the current
//!   or draft view.
//! - Project the draft view as current links adjusted by draft markers.
//!
//! # Invariants
//! - Links have no payload: a current Keep never writes anything.
//! - Draft state is a set of markers layered over the current links: an
//!   addition marker for a link the draft adds, a deletion marker for a
//!   current link the draft drops. At most one marker exists per key.
//! - Draft projection = (current - deletions) + additions.

use crate::aggregate::{describe_row, ModelError, ModelResult, ReconcileContext, TemporalView};
use crate::model::related::{
    LinkKey, LinkRelation, RelatedEntityRelation, RelatedVocabularyRelation, VocabularyLink,
};
use crate::model::temporal::{
    draft_kind, make_current, make_draft, make_draft_deletion, make_historical, DraftKind,
};
use crate::model::vocabulary::VocabularyId;
use crate::reconcile::{reconcile, EditVisitor, Identified};
use crate::repo::link_repo::LinkRepository;
use crate::repo::Store;
use log::debug;
use std::collections::BTreeSet;

impl<R: LinkRelation> Identified for VocabularyLink<R> {
    type Key = LinkKey<R>;

    fn identity(&self) -> Option<LinkKey<R>> {
        Some(self.key())
    }
}

impl<R: LinkRelation> Identified for LinkKey<R> {
    type Key = LinkKey<R>;

    fn identity(&self) -> Option<LinkKey<R>> {
        Some(*self)
    }
}

pub struct LinkModel<'conn, R> {
    store: Store<'conn>,
    vocabulary_id: VocabularyId,
    current: Vec<VocabularyLink<R>>,
    /// Addition and deletion markers.
    draft: Vec<VocabularyLink<R>>,
}

pub type RelatedEntityModel<'conn> = LinkModel<'conn, RelatedEntityRelation>;
pub type RelatedVocabularyModel<'conn> = LinkModel<'conn, RelatedVocabularyRelation>;

impl<'conn, R: LinkRelation> LinkModel<'conn, R> {
    pub(crate) fn load(store: Store<'conn>, vocabulary_id: VocabularyId) -> ModelResult<Self> {
        let repo = store.links::<R>();
        Ok(Self {
            store,
            vocabulary_id,
            current: repo.load_current(vocabulary_id)?,
            draft: repo.load_draft(vocabulary_id)?,
        })
    }

    pub fn current(&self) -> &[VocabularyLink<R>] {
        &self.current
    }

    /// Raw draft markers, additions and deletions alike.
    pub fn draft_markers(&self) -> &[VocabularyLink<R>] {
        &self.draft
    }

    pub(crate) fn has_draft(&self) -> bool {
        !self.draft.is_empty()
    }

    /// Link keys visible in `view`, sorted.
    pub fn keys(&self, view: TemporalView) -> Vec<LinkKey<R>> {
        let current = self.current.iter().map(VocabularyLink::key);
        match view {
            TemporalView::Current => current.collect(),
            TemporalView::Draft => {
                let deleted = self.marker_keys(DraftKind::Deletion);
                let mut keys: BTreeSet<LinkKey<R>> =
                    current.filter(|key| !deleted.contains(key)).collect();
                keys.extend(self.marker_keys(DraftKind::AdditionOrModification));
                keys.into_iter().collect()
            }
        }
    }

    /// Historicizes every current link.
    pub(crate) fn delete_only_current(&mut self, ctx: &ReconcileContext) -> ModelResult<()> {
        for key in self.keys(TemporalView::Current) {
            self.historicize(ctx, key)?;
        }
        Ok(())
    }

    /// Hard-deletes every draft marker.
    pub(crate) fn delete_only_draft(&mut self) -> ModelResult<()> {
        let repo = self.store.links::<R>();
        for marker in self.draft.drain(..) {
            repo.delete(marker.row_id)?;
        }
        Ok(())
    }

    /// Replaces the current links by addition markers of the same keys.
    ///
    /// # Errors
    /// - `InvalidArgument` when draft markers already exist.
    pub(crate) fn promote_current_to_draft(&mut self, ctx: &ReconcileContext) -> ModelResult<()> {
        if self.has_draft() {
            return Err(ModelError::InvalidArgument(format!(
                "vocabulary {} already has draft {} links",
                self.vocabulary_id,
                R::FAMILY
            )));
        }
        for key in self.keys(TemporalView::Current) {
            self.historicize(ctx, key)?;
            self.insert_marker(ctx, key, DraftKind::AdditionOrModification)?;
        }
        Ok(())
    }

    pub(crate) fn apply_changes(
        &mut self,
        ctx: &ReconcileContext,
        view: TemporalView,
        desired: &[LinkKey<R>],
    ) -> ModelResult<()> {
        let existing = self.current.clone();
        let mut visitor = LinkVisitor {
            model: self,
            ctx,
            view,
        };
        reconcile(&existing, desired, &mut visitor)?;

        if view == TemporalView::Draft {
            // Withdraw additions the submission no longer contains.
            let wanted: BTreeSet<LinkKey<R>> = desired.iter().copied().collect();
            for key in self.marker_keys(DraftKind::AdditionOrModification) {
                if !wanted.contains(&key) {
                    self.delete_marker(key, DraftKind::AdditionOrModification)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn describe(&self, now: i64, lines: &mut Vec<String>) {
        for link in self.current.iter().chain(self.draft.iter()) {
            lines.push(describe_row(
                R::FAMILY,
                format_args!("{}:{}", link.target_id, link.relation.as_db_str()),
                link,
                link.row_id,
                now,
            ));
        }
    }

    fn marker_keys(&self, kind: DraftKind) -> BTreeSet<LinkKey<R>> {
        self.draft
            .iter()
            .filter(|marker| draft_kind(*marker) == Some(kind))
            .map(VocabularyLink::key)
            .collect()
    }

    fn historicize(&mut self, ctx: &ReconcileContext, key: LinkKey<R>) -> ModelResult<()> {
        let index = self
            .current
            .iter()
            .position(|link| link.key() == key)
            .ok_or_else(|| {
                ModelError::Inconsistent(format!("{} link {key:?} is not current", R::FAMILY))
            })?;
        let mut link = self.current.remove(index);
        link.modified_by = ctx.actor.clone();
        make_historical(&mut link, ctx.now);
        self.store.links::<R>().update(&link)?;
        Ok(())
    }

    fn insert_current(&mut self, ctx: &ReconcileContext, key: LinkKey<R>) -> ModelResult<()> {
        let mut link = self.new_link(ctx, key);
        make_current(&mut link, ctx.now);
        link.row_id = self.store.links::<R>().insert(&link)?;
        let index = self.current.partition_point(|existing| existing.key() < key);
        self.current.insert(index, link);
        Ok(())
    }

    fn insert_marker(
        &mut self,
        ctx: &ReconcileContext,
        key: LinkKey<R>,
        kind: DraftKind,
    ) -> ModelResult<()> {
        let mut link = self.new_link(ctx, key);
        match kind {
            DraftKind::AdditionOrModification => make_draft(&mut link),
            DraftKind::Deletion => make_draft_deletion(&mut link),
        }
        link.row_id = self.store.links::<R>().insert(&link)?;
        self.draft.push(link);
        Ok(())
    }

    fn delete_marker(&mut self, key: LinkKey<R>, kind: DraftKind) -> ModelResult<()> {
        let Some(index) = self
            .draft
            .iter()
            .position(|marker| marker.key() == key && draft_kind(marker) == Some(kind))
        else {
            return Ok(());
        };
        let marker = self.draft.remove(index);
        self.store.links::<R>().delete(marker.row_id)?;
        Ok(())
    }

    fn has_marker(&self, key: LinkKey<R>, kind: DraftKind) -> bool {
        self.draft
            .iter()
            .any(|marker| marker.key() == key && draft_kind(marker) == Some(kind))
    }

    fn new_link(&self, ctx: &ReconcileContext, key: LinkKey<R>) -> VocabularyLink<R> {
        VocabularyLink {
            row_id: 0,
            vocabulary_id: self.vocabulary_id,
            target_id: key.target_id,
            relation: key.relation,
            start_date: 0,
            end_date: 0,
            modified_by: ctx.actor.clone(),
        }
    }
}

struct LinkVisitor<'m, 'conn, R> {
    model: &'m mut LinkModel<'conn, R>,
    ctx: &'m ReconcileContext,
    view: TemporalView,
}

impl<R: LinkRelation> EditVisitor<VocabularyLink<R>, LinkKey<R>> for LinkVisitor<'_, '_, R> {
    type Error = ModelError;

    fn keep(&mut self, existing: &VocabularyLink<R>, _desired: &LinkKey<R>) -> ModelResult<()> {
        match self.view {
            TemporalView::Current => Ok(()),
            TemporalView::Draft => self
                .model
                .delete_marker(existing.key(), DraftKind::Deletion),
        }
    }

    fn delete(&mut self, existing: &VocabularyLink<R>) -> ModelResult<()> {
        let key = existing.key();
        debug!(
            "event=link_delete module=aggregate family={} view={} target_id={}",
            R::FAMILY,
            self.view,
            key.target_id
        );
        match self.view {
            TemporalView::Current => self.model.historicize(self.ctx, key),
            TemporalView::Draft => {
                if self.model.has_marker(key, DraftKind::Deletion) {
                    return Ok(());
                }
                self.model.insert_marker(self.ctx, key, DraftKind::Deletion)
            }
        }
    }

    fn insert(&mut self, desired: &LinkKey<R>) -> ModelResult<()> {
        debug!(
            "event=link_insert module=aggregate family={} view={} target_id={}",
            R::FAMILY,
            self.view,
            desired.target_id
        );
        match self.view {
            TemporalView::Current => self.model.insert_current(self.ctx, *desired),
            TemporalView::Draft => {
                if self.model.has_marker(*desired, DraftKind::AdditionOrModification) {
                    return Ok(());
                }
                self.model
                    .insert_marker(self.ctx, *desired, DraftKind::AdditionOrModification)
            }
        }
    }
}

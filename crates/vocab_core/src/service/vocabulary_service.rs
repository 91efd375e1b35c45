//! Vocabulary use-case service.
//!
//! # Responsibility
//! - Run each aggregate entry point inside one immediate SQLite
//!   transaction.
//! - Allocate the identity of new vocabularies.
//!
//! # Invariants
//! - A failed operation leaves storage untouched: the transaction rolls
//!   back when it is dropped without commit.
//! - Workflow failures are not operation failures; they are returned as a
//!   `WorkflowOutcome` next to a committed change.

use crate::aggregate::{ModelError, ReconcileContext, VocabularyModel};
use crate::model::schema::{TreeProjection, VocabularyTree};
use crate::model::task::Task;
use crate::model::vocabulary::VocabularyId;
use crate::repo::id_allocator::{IdAllocator, IdKind};
use crate::repo::task_repo::TaskRepository;
use crate::repo::vocabulary_repo::VocabularyRepository;
use crate::repo::{RepoError, Store};
use crate::workflow::{ProviderRegistry, WorkflowOutcome};
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from vocabulary service operations.
#[derive(Debug)]
pub enum VocabularyServiceError {
    /// No current, draft or history row exists for this id.
    VocabularyNotFound(VocabularyId),
    /// Aggregate-level failure.
    Model(ModelError),
}

impl Display for VocabularyServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VocabularyNotFound(id) => write!(f, "vocabulary not found: {id}"),
            Self::Model(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VocabularyServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(err) => Some(err),
            Self::VocabularyNotFound(_) => None,
        }
    }
}

impl From<ModelError> for VocabularyServiceError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl From<RepoError> for VocabularyServiceError {
    fn from(value: RepoError) -> Self {
        Self::Model(ModelError::Repo(value))
    }
}

impl From<rusqlite::Error> for VocabularyServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Model(value.into())
    }
}

pub type ServiceResult<T> = Result<T, VocabularyServiceError>;

/// Vocabulary service facade.
pub struct VocabularyService<'a> {
    conn: &'a Connection,
    providers: &'a ProviderRegistry,
}

impl<'a> VocabularyService<'a> {
    pub fn new(conn: &'a Connection, providers: &'a ProviderRegistry) -> Self {
        Self { conn, providers }
    }

    /// Creates a vocabulary from a tree that carries no id yet.
    ///
    /// Returns the allocated id and the workflow outcome of the first
    /// apply.
    pub fn create_vocabulary(
        &self,
        ctx: &ReconcileContext,
        tree: &VocabularyTree,
    ) -> ServiceResult<(VocabularyId, Option<WorkflowOutcome>)> {
        if let Some(id) = tree.id {
            return Err(ModelError::InvalidArgument(format!(
                "new vocabulary must not carry an id, got {id}"
            ))
            .into());
        }
        self.in_transaction("vocabulary_create", |store, providers| {
            let vocabulary_id = store.ids().allocate(IdKind::Vocabulary)?;
            let mut model = VocabularyModel::load(store, providers, vocabulary_id)?;
            let outcome = model.apply_changes(ctx, tree)?;
            Ok((vocabulary_id, outcome))
        })
    }

    /// Applies `tree` to the current or draft view of an existing
    /// vocabulary.
    pub fn apply_changes(
        &self,
        ctx: &ReconcileContext,
        vocabulary_id: VocabularyId,
        tree: &VocabularyTree,
    ) -> ServiceResult<Option<WorkflowOutcome>> {
        self.in_transaction("vocabulary_apply", |store, providers| {
            let mut model = load_existing(store, providers, vocabulary_id)?;
            Ok(model.apply_changes(ctx, tree)?)
        })
    }

    pub fn delete_only_current(
        &self,
        ctx: &ReconcileContext,
        vocabulary_id: VocabularyId,
        preserve_draft: bool,
    ) -> ServiceResult<Option<WorkflowOutcome>> {
        self.in_transaction("vocabulary_delete_current", |store, providers| {
            let mut model = load_existing(store, providers, vocabulary_id)?;
            Ok(model.delete_only_current(ctx, preserve_draft)?)
        })
    }

    pub fn delete_only_draft(&self, vocabulary_id: VocabularyId) -> ServiceResult<()> {
        self.in_transaction("vocabulary_delete_draft", |store, providers| {
            let mut model = load_existing(store, providers, vocabulary_id)?;
            Ok(model.delete_only_draft()?)
        })
    }

    pub fn promote_current_to_draft(
        &self,
        ctx: &ReconcileContext,
        vocabulary_id: VocabularyId,
    ) -> ServiceResult<Option<WorkflowOutcome>> {
        self.in_transaction("vocabulary_promote_draft", |store, providers| {
            let mut model = load_existing(store, providers, vocabulary_id)?;
            Ok(model.promote_current_to_draft(ctx)?)
        })
    }

    pub fn get_current(
        &self,
        vocabulary_id: VocabularyId,
        projection: &TreeProjection,
    ) -> ServiceResult<Option<VocabularyTree>> {
        let model = VocabularyModel::load(Store::new(self.conn), self.providers, vocabulary_id)?;
        Ok(model.get_current(projection))
    }

    pub fn get_draft(
        &self,
        vocabulary_id: VocabularyId,
        projection: &TreeProjection,
    ) -> ServiceResult<Option<VocabularyTree>> {
        let model = VocabularyModel::load(Store::new(self.conn), self.providers, vocabulary_id)?;
        Ok(model.get_draft(projection))
    }

    pub fn describe_model(&self, vocabulary_id: VocabularyId) -> ServiceResult<Vec<String>> {
        let model = VocabularyModel::load(Store::new(self.conn), self.providers, vocabulary_id)?;
        Ok(model.describe_model())
    }

    /// Lists every workflow task ever scheduled for a vocabulary.
    pub fn list_tasks(&self, vocabulary_id: VocabularyId) -> ServiceResult<Vec<Task>> {
        Ok(Store::new(self.conn)
            .tasks()
            .list_for_vocabulary(vocabulary_id)?)
    }

    fn in_transaction<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce(Store<'_>, &ProviderRegistry) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        match body(Store::new(&tx), self.providers) {
            Ok(value) => {
                tx.commit()?;
                info!("event={operation} module=service status=ok");
                Ok(value)
            }
            Err(err) => {
                warn!("event={operation} module=service status=rollback error={err}");
                Err(err)
            }
        }
    }
}

fn load_existing<'a>(
    store: Store<'a>,
    providers: &'a ProviderRegistry,
    vocabulary_id: VocabularyId,
) -> ServiceResult<VocabularyModel<'a>> {
    let model = VocabularyModel::load(store, providers, vocabulary_id)?;
    if model.current_row().is_none()
        && !model.has_draft()
        && !has_history(&store, vocabulary_id)?
    {
        return Err(VocabularyServiceError::VocabularyNotFound(vocabulary_id));
    }
    Ok(model)
}

fn has_history(store: &Store<'_>, vocabulary_id: VocabularyId) -> ServiceResult<bool> {
    Ok(!store.vocabularies().load_history(vocabulary_id)?.is_empty())
}

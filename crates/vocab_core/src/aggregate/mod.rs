//! Aggregate models: the temporal reconciliation engine.
//!
//! # Responsibility
//! - Load the current and draft state of one vocabulary tree.
//! - Reconcile a submitted tree against either view with minimal row
//!   mutations, cascading Vocabulary -> Versions -> {Access Points,
//!   Version Artefacts} -> Related links.
//! - Derive workflow subtasks from semantic changes of the current view.
//!
//! # Invariants
//! - Current rows are append-only: an update closes the old row and opens
//!   a new one. Draft rows are updated and deleted in place.
//! - Draft-only changes never schedule workflow.
//! - Models hold no state across calls; `now` and `actor` arrive through
//!   one `ReconcileContext` per call.

use crate::reconcile::{Identified, ReconcileError};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

mod access_point_model;
mod link_model;
mod version_artefact_model;
mod version_children;
mod version_model;
mod vocabulary_model;

pub use access_point_model::AccessPointModel;
pub use link_model::{LinkModel, RelatedEntityModel, RelatedVocabularyModel};
pub use version_artefact_model::VersionArtefactModel;
pub use version_model::VersionModel;
pub use vocabulary_model::VocabularyModel;

pub type ModelResult<T> = Result<T, ModelError>;

/// Failure of an aggregate operation.
#[derive(Debug)]
pub enum ModelError {
    /// Precondition violation; reported to the caller, never retried.
    InvalidArgument(String),
    /// Storage failure, propagated unchanged.
    Repo(RepoError),
    /// Internal consistency violation: a programming error.
    Inconsistent(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Inconsistent(message) => write!(f, "internal inconsistency: {message}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::InvalidArgument(_) | Self::Inconsistent(_) => None,
        }
    }
}

impl From<RepoError> for ModelError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for ModelError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

impl From<ReconcileError> for ModelError {
    fn from(value: ReconcileError) -> Self {
        log::error!(
            "event=reconcile module=aggregate status=error error_code=inconsistent_input error={}",
            value
        );
        Self::Inconsistent(value.to_string())
    }
}

/// Which temporal view an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalView {
    Current,
    Draft,
}

impl Display for TemporalView {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Draft => f.write_str("draft"),
        }
    }
}

/// Caller identity and clock of one reconciliation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileContext {
    /// Recorded as `modified_by` on every touched row.
    pub actor: String,
    /// Epoch milliseconds used for every temporal transition of the call.
    pub now: i64,
}

impl ReconcileContext {
    pub fn new(actor: impl Into<String>, now: i64) -> Self {
        Self {
            actor: actor.into(),
            now,
        }
    }

    /// Context stamped with the system clock.
    pub fn at_system_time(actor: impl Into<String>) -> Self {
        Self::new(actor, system_now_millis())
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn system_now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Clones and sorts submitted children by identity, new ones last.
///
/// Duplicate identities in a submission are a client error.
pub(crate) fn sorted_submission<T>(items: &[T], what: &str) -> ModelResult<Vec<T>>
where
    T: Identified + Clone,
{
    let mut sorted = items.to_vec();
    sorted.sort_by(|left, right| match (left.identity(), right.identity()) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    for pair in sorted.windows(2) {
        if let (Some(left), Some(right)) = (pair[0].identity(), pair[1].identity()) {
            if left == right {
                return Err(ModelError::InvalidArgument(format!(
                    "{what} {left:?} appears more than once"
                )));
            }
        }
    }
    Ok(sorted)
}

/// Formats one diagnostic line for `describe_model`.
pub(crate) fn describe_row(
    kind: &str,
    identity: impl Display,
    row: &impl crate::model::temporal::TemporalRecord,
    row_id: i64,
    now: i64,
) -> String {
    format!(
        "{kind} {identity} row_id={row_id} meaning={} start_date={} end_date={}",
        crate::model::temporal::classify(row, now),
        row.start_date(),
        row.end_date()
    )
}

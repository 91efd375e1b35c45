//! Registry domain model.
//!
//! # Responsibility
//! - Define the persisted row shapes of vocabularies and their children.
//! - Define the client-facing tree submitted to and projected from the
//!   aggregate models.
//! - Classify rows temporally.
//!
//! # Invariants
//! - Every row carries a surrogate `row_id` plus the logical identity it
//!   belongs to; several rows (historical, current, draft) share one
//!   logical identity.
//! - Rows that were ever current are never physically deleted.

pub mod access_point;
pub mod related;
pub mod schema;
pub mod task;
pub mod temporal;
pub mod version;
pub mod version_artefact;
pub mod vocabulary;

/// Surrogate key of one persisted row.
pub type RowId = i64;

//! Temporal reconciliation engine for a vocabulary registry.
//!
//! Vocabularies and their children are kept in three temporal views at
//! once: current, draft and historical. A submitted tree is reconciled
//! against the current or draft view with minimal row mutations, and
//! semantic changes schedule workflow tasks.

pub mod aggregate;
pub mod db;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod repo;
pub mod service;
pub mod workflow;

pub use aggregate::{
    ModelError, ModelResult, ReconcileContext, TemporalView, VocabularyModel,
};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{
    default_log_level, init_logging, logging_status, LoggingConfig, LoggingError,
};
pub use model::schema::{
    AccessPointTree, RelatedRef, TreeProjection, VersionArtefactTree, VersionTree,
    VocabularyTree,
};
pub use model::temporal::{classify, TemporalMeaning};
pub use repo::{RepoError, RepoResult, Store};
pub use service::{VocabularyService, VocabularyServiceError};
pub use workflow::{
    FailedTask, ProviderError, ProviderRegistry, TaskInfo, WorkflowOutcome, WorkflowProvider,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

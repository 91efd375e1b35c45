//! Repository layer: persistence accessors for registry rows.
//!
//! # Responsibility
//! - Provide keyed load/insert/update/delete accessors per table family.
//! - Isolate SQLite query details from the aggregate models.
//!
//! # Invariants
//! - Accessors contain no business logic; every temporal decision is made
//!   by the caller.
//! - Read paths reject undecodable persisted state instead of masking it.
//! - Every accessor runs on the caller's connection, inside whatever
//!   transaction the caller opened.

use crate::db::DbError;
use crate::model::RowId;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod access_point_repo;
pub mod id_allocator;
pub mod link_repo;
pub mod task_repo;
pub mod version_artefact_repo;
pub mod version_repo;
pub mod vocabulary_repo;

use access_point_repo::SqliteAccessPointRepository;
use id_allocator::SqliteIdAllocator;
use link_repo::SqliteLinkRepository;
use task_repo::SqliteTaskRepository;
use version_artefact_repo::SqliteVersionArtefactRepository;
use version_repo::SqliteVersionRepository;
use vocabulary_repo::SqliteVocabularyRepository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for registry persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// A row expected by an update or delete is missing.
    NotFound { table: &'static str, row_id: RowId },
    /// Persisted data cannot be decoded into a row.
    InvalidData(String),
    /// Payload (de)serialization failure.
    Json(serde_json::Error),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { table, row_id } => write!(f, "row {row_id} not found in {table}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Json(err) => write!(f, "payload serialization failed: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Bundle of SQLite repositories sharing one connection.
#[derive(Clone, Copy)]
pub struct Store<'conn> {
    conn: &'conn Connection,
}

impl<'conn> Store<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub fn ids(&self) -> SqliteIdAllocator<'conn> {
        SqliteIdAllocator::new(self.conn)
    }

    pub fn vocabularies(&self) -> SqliteVocabularyRepository<'conn> {
        SqliteVocabularyRepository::new(self.conn)
    }

    pub fn versions(&self) -> SqliteVersionRepository<'conn> {
        SqliteVersionRepository::new(self.conn)
    }

    pub fn access_points(&self) -> SqliteAccessPointRepository<'conn> {
        SqliteAccessPointRepository::new(self.conn)
    }

    pub fn version_artefacts(&self) -> SqliteVersionArtefactRepository<'conn> {
        SqliteVersionArtefactRepository::new(self.conn)
    }

    pub fn links<R>(&self) -> SqliteLinkRepository<'conn, R> {
        SqliteLinkRepository::new(self.conn)
    }

    pub fn tasks(&self) -> SqliteTaskRepository<'conn> {
        SqliteTaskRepository::new(self.conn)
    }
}

pub(crate) fn ensure_changed(changed: usize, table: &'static str, row_id: RowId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound { table, row_id });
    }
    Ok(())
}

pub(crate) fn parse_enum<T>(
    value: &str,
    column: &'static str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> RepoResult<T> {
    parse(value).ok_or_else(|| RepoError::InvalidData(format!("invalid value `{value}` in {column}")))
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    value: &str,
    column: &'static str,
) -> RepoResult<T> {
    serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("undecodable JSON in {column}: {err}")))
}

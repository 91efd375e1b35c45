//! Surrogate identity allocation for logical entities.

use crate::repo::RepoResult;
use rusqlite::Connection;

/// Logical entity kinds that own an identity sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Vocabulary,
    Version,
    AccessPoint,
    VersionArtefact,
}

impl IdKind {
    fn table(self) -> &'static str {
        match self {
            Self::Vocabulary => "vocabulary_ids",
            Self::Version => "version_ids",
            Self::AccessPoint => "access_point_ids",
            Self::VersionArtefact => "version_artefact_ids",
        }
    }
}

/// Issues fresh identities. An identity is never handed out twice.
pub trait IdAllocator {
    fn allocate(&self, kind: IdKind) -> RepoResult<i64>;
}

pub struct SqliteIdAllocator<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteIdAllocator<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl IdAllocator for SqliteIdAllocator<'_> {
    fn allocate(&self, kind: IdKind) -> RepoResult<i64> {
        self.conn
            .execute(&format!("INSERT INTO {} DEFAULT VALUES;", kind.table()), [])?;
        Ok(self.conn.last_insert_rowid())
    }
}

//! Version row accessors.

use crate::model::temporal::CURRENTLY_VALID_END_DATE;
use crate::model::version::{Version, VersionStatus};
use crate::model::vocabulary::VocabularyId;
use crate::model::RowId;
use crate::repo::{ensure_changed, parse_enum, parse_json, RepoResult};
use rusqlite::{params, Connection, Row};

const TABLE: &str = "versions";

const VERSION_SELECT_SQL: &str = "SELECT
    row_id,
    version_id,
    vocabulary_id,
    start_date,
    end_date,
    modified_by,
    status,
    slug,
    release_date,
    data
FROM versions";

pub trait VersionRepository {
    /// Loads current rows of one vocabulary ordered by `version_id`.
    fn load_current(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<Version>>;
    /// Loads draft rows of one vocabulary ordered by `version_id`.
    fn load_draft(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<Version>>;
    fn load_history(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<Version>>;
    fn insert(&self, row: &Version) -> RepoResult<RowId>;
    fn update(&self, row: &Version) -> RepoResult<()>;
    fn delete(&self, row_id: RowId) -> RepoResult<()>;
}

pub struct SqliteVersionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVersionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query(&self, filter: &str, vocabulary_id: VocabularyId) -> RepoResult<Vec<Version>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VERSION_SELECT_SQL}
             WHERE vocabulary_id = ?1
               AND {filter}
             ORDER BY version_id ASC, start_date ASC, row_id ASC;"
        ))?;
        let mut rows = stmt.query(params![vocabulary_id, CURRENTLY_VALID_END_DATE])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_version_row(row)?);
        }
        Ok(items)
    }
}

impl VersionRepository for SqliteVersionRepository<'_> {
    fn load_current(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<Version>> {
        self.query("end_date = ?2", vocabulary_id)
    }

    fn load_draft(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<Version>> {
        self.query("start_date > ?2", vocabulary_id)
    }

    fn load_history(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<Version>> {
        self.query("end_date < ?2", vocabulary_id)
    }

    fn insert(&self, row: &Version) -> RepoResult<RowId> {
        self.conn.execute(
            "INSERT INTO versions (
                version_id,
                vocabulary_id,
                start_date,
                end_date,
                modified_by,
                status,
                slug,
                release_date,
                data
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                row.version_id,
                row.vocabulary_id,
                row.start_date,
                row.end_date,
                row.modified_by.as_str(),
                row.status.as_db_str(),
                row.slug.as_str(),
                row.release_date.as_deref(),
                serde_json::to_string(&row.data)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, row: &Version) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE versions
             SET
                start_date = ?2,
                end_date = ?3,
                modified_by = ?4,
                status = ?5,
                slug = ?6,
                release_date = ?7,
                data = ?8
             WHERE row_id = ?1;",
            params![
                row.row_id,
                row.start_date,
                row.end_date,
                row.modified_by.as_str(),
                row.status.as_db_str(),
                row.slug.as_str(),
                row.release_date.as_deref(),
                serde_json::to_string(&row.data)?,
            ],
        )?;
        ensure_changed(changed, TABLE, row.row_id)
    }

    fn delete(&self, row_id: RowId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM versions WHERE row_id = ?1;", [row_id])?;
        ensure_changed(changed, TABLE, row_id)
    }
}

fn parse_version_row(row: &Row<'_>) -> RepoResult<Version> {
    let status_text: String = row.get("status")?;
    let data_text: String = row.get("data")?;
    Ok(Version {
        row_id: row.get("row_id")?,
        version_id: row.get("version_id")?,
        vocabulary_id: row.get("vocabulary_id")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        modified_by: row.get("modified_by")?,
        status: parse_enum(&status_text, "versions.status", VersionStatus::from_db_str)?,
        slug: row.get("slug")?,
        release_date: row.get("release_date")?,
        data: parse_json(&data_text, "versions.data")?,
    })
}

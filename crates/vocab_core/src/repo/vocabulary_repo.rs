//! Vocabulary row accessors.

use crate::model::temporal::CURRENTLY_VALID_END_DATE;
use crate::model::vocabulary::{Vocabulary, VocabularyId, VocabularyStatus};
use crate::model::RowId;
use crate::repo::{ensure_changed, parse_enum, parse_json, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const TABLE: &str = "vocabularies";

const VOCABULARY_SELECT_SQL: &str = "SELECT
    row_id,
    vocabulary_id,
    start_date,
    end_date,
    modified_by,
    owner,
    status,
    slug,
    data
FROM vocabularies";

pub trait VocabularyRepository {
    /// Loads the single current row, if any.
    fn load_current(&self, vocabulary_id: VocabularyId) -> RepoResult<Option<Vocabulary>>;
    /// Loads the single draft row, if any.
    fn load_draft(&self, vocabulary_id: VocabularyId) -> RepoResult<Option<Vocabulary>>;
    /// Loads historical rows, oldest first.
    fn load_history(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<Vocabulary>>;
    fn insert(&self, row: &Vocabulary) -> RepoResult<RowId>;
    fn update(&self, row: &Vocabulary) -> RepoResult<()>;
    fn delete(&self, row_id: RowId) -> RepoResult<()>;
}

pub struct SqliteVocabularyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVocabularyRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query(&self, filter: &str, vocabulary_id: VocabularyId) -> RepoResult<Vec<Vocabulary>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VOCABULARY_SELECT_SQL}
             WHERE vocabulary_id = ?1
               AND {filter}
             ORDER BY start_date ASC, row_id ASC;"
        ))?;
        let mut rows = stmt.query(params![vocabulary_id, CURRENTLY_VALID_END_DATE])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_vocabulary_row(row)?);
        }
        Ok(items)
    }

    fn query_single(
        &self,
        filter: &str,
        vocabulary_id: VocabularyId,
        label: &str,
    ) -> RepoResult<Option<Vocabulary>> {
        let mut items = self.query(filter, vocabulary_id)?;
        if items.len() > 1 {
            return Err(RepoError::InvalidData(format!(
                "vocabulary {vocabulary_id} has {} {label} rows",
                items.len()
            )));
        }
        Ok(items.pop())
    }
}

impl VocabularyRepository for SqliteVocabularyRepository<'_> {
    fn load_current(&self, vocabulary_id: VocabularyId) -> RepoResult<Option<Vocabulary>> {
        self.query_single("end_date = ?2", vocabulary_id, "current")
    }

    fn load_draft(&self, vocabulary_id: VocabularyId) -> RepoResult<Option<Vocabulary>> {
        self.query_single("start_date > ?2", vocabulary_id, "draft")
    }

    fn load_history(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<Vocabulary>> {
        self.query("end_date < ?2", vocabulary_id)
    }

    fn insert(&self, row: &Vocabulary) -> RepoResult<RowId> {
        self.conn.execute(
            "INSERT INTO vocabularies (
                vocabulary_id,
                start_date,
                end_date,
                modified_by,
                owner,
                status,
                slug,
                data
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                row.vocabulary_id,
                row.start_date,
                row.end_date,
                row.modified_by.as_str(),
                row.owner.as_str(),
                row.status.as_db_str(),
                row.slug.as_str(),
                serde_json::to_string(&row.data)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, row: &Vocabulary) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE vocabularies
             SET
                start_date = ?2,
                end_date = ?3,
                modified_by = ?4,
                owner = ?5,
                status = ?6,
                slug = ?7,
                data = ?8
             WHERE row_id = ?1;",
            params![
                row.row_id,
                row.start_date,
                row.end_date,
                row.modified_by.as_str(),
                row.owner.as_str(),
                row.status.as_db_str(),
                row.slug.as_str(),
                serde_json::to_string(&row.data)?,
            ],
        )?;
        ensure_changed(changed, TABLE, row.row_id)
    }

    fn delete(&self, row_id: RowId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM vocabularies WHERE row_id = ?1;", [row_id])?;
        ensure_changed(changed, TABLE, row_id)
    }
}

fn parse_vocabulary_row(row: &Row<'_>) -> RepoResult<Vocabulary> {
    let status_text: String = row.get("status")?;
    let data_text: String = row.get("data")?;
    Ok(Vocabulary {
        row_id: row.get("row_id")?,
        vocabulary_id: row.get("vocabulary_id")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        modified_by: row.get("modified_by")?,
        owner: row.get("owner")?,
        status: parse_enum(
            &status_text,
            "vocabularies.status",
            VocabularyStatus::from_db_str,
        )?,
        slug: row.get("slug")?,
        data: parse_json(&data_text, "vocabularies.data")?,
    })
}

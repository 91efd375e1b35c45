//! Vocabulary link row accessors, shared by both link families.
//!
//! # Invariants
//! - Table and target column come from the relation type, never from
//!   caller input.

use crate::model::related::{LinkRelation, VocabularyLink};
use crate::model::temporal::CURRENTLY_VALID_END_DATE;
use crate::model::vocabulary::VocabularyId;
use crate::model::RowId;
use crate::repo::{ensure_changed, parse_enum, RepoResult};
use rusqlite::{params, Connection, Row};
use std::marker::PhantomData;

pub trait LinkRepository<R: LinkRelation> {
    /// Loads current links ordered by `(target_id, relation)`.
    fn load_current(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<VocabularyLink<R>>>;
    /// Loads draft addition and deletion markers ordered by key.
    fn load_draft(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<VocabularyLink<R>>>;
    fn load_history(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<VocabularyLink<R>>>;
    fn insert(&self, row: &VocabularyLink<R>) -> RepoResult<RowId>;
    fn update(&self, row: &VocabularyLink<R>) -> RepoResult<()>;
    fn delete(&self, row_id: RowId) -> RepoResult<()>;
}

pub struct SqliteLinkRepository<'conn, R> {
    conn: &'conn Connection,
    _relation: PhantomData<R>,
}

impl<'conn, R> SqliteLinkRepository<'conn, R> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            _relation: PhantomData,
        }
    }
}

impl<R: LinkRelation> SqliteLinkRepository<'_, R> {
    fn query(&self, filter: &str, vocabulary_id: VocabularyId) -> RepoResult<Vec<VocabularyLink<R>>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT
                row_id,
                vocabulary_id,
                {target} AS target_id,
                relation,
                start_date,
                end_date,
                modified_by
             FROM {table}
             WHERE vocabulary_id = ?1
               AND {filter}
             ORDER BY {target} ASC, relation ASC, start_date ASC, row_id ASC;",
            target = R::TARGET_COLUMN,
            table = R::TABLE,
        ))?;
        let mut rows = stmt.query(params![vocabulary_id, CURRENTLY_VALID_END_DATE])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_link_row(row)?);
        }
        // Relation enum order differs from its text order.
        items.sort_by_key(|item| (item.key(), item.start_date, item.row_id));
        Ok(items)
    }
}

impl<R: LinkRelation> LinkRepository<R> for SqliteLinkRepository<'_, R> {
    fn load_current(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<VocabularyLink<R>>> {
        self.query("end_date = ?2", vocabulary_id)
    }

    fn load_draft(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<VocabularyLink<R>>> {
        self.query("start_date > ?2", vocabulary_id)
    }

    fn load_history(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<VocabularyLink<R>>> {
        self.query("end_date < ?2", vocabulary_id)
    }

    fn insert(&self, row: &VocabularyLink<R>) -> RepoResult<RowId> {
        self.conn.execute(
            &format!(
                "INSERT INTO {table} (
                    vocabulary_id,
                    {target},
                    relation,
                    start_date,
                    end_date,
                    modified_by
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                target = R::TARGET_COLUMN,
                table = R::TABLE,
            ),
            params![
                row.vocabulary_id,
                row.target_id,
                row.relation.as_db_str(),
                row.start_date,
                row.end_date,
                row.modified_by.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, row: &VocabularyLink<R>) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {table}
                 SET
                    start_date = ?2,
                    end_date = ?3,
                    modified_by = ?4
                 WHERE row_id = ?1;",
                table = R::TABLE,
            ),
            params![
                row.row_id,
                row.start_date,
                row.end_date,
                row.modified_by.as_str(),
            ],
        )?;
        ensure_changed(changed, R::TABLE, row.row_id)
    }

    fn delete(&self, row_id: RowId) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {} WHERE row_id = ?1;", R::TABLE),
            [row_id],
        )?;
        ensure_changed(changed, R::TABLE, row_id)
    }
}

fn parse_link_row<R: LinkRelation>(row: &Row<'_>) -> RepoResult<VocabularyLink<R>> {
    let relation_text: String = row.get("relation")?;
    Ok(VocabularyLink {
        row_id: row.get("row_id")?,
        vocabulary_id: row.get("vocabulary_id")?,
        target_id: row.get("target_id")?,
        relation: parse_enum(&relation_text, R::TABLE, R::from_db_str)?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        modified_by: row.get("modified_by")?,
    })
}

//! Version artefact row accessors.

use crate::model::temporal::CURRENTLY_VALID_END_DATE;
use crate::model::version::VersionId;
use crate::model::version_artefact::{
    VersionArtefact, VersionArtefactStatus, VersionArtefactType,
};
use crate::model::RowId;
use crate::repo::{ensure_changed, parse_enum, parse_json, RepoResult};
use rusqlite::{params, Connection, Row};

const TABLE: &str = "version_artefacts";

const VERSION_ARTEFACT_SELECT_SQL: &str = "SELECT
    row_id,
    version_artefact_id,
    version_id,
    start_date,
    end_date,
    modified_by,
    kind,
    status,
    data
FROM version_artefacts";

pub trait VersionArtefactRepository {
    fn load_current(&self, version_id: VersionId) -> RepoResult<Vec<VersionArtefact>>;
    fn load_draft(&self, version_id: VersionId) -> RepoResult<Vec<VersionArtefact>>;
    fn load_history(&self, version_id: VersionId) -> RepoResult<Vec<VersionArtefact>>;
    fn insert(&self, row: &VersionArtefact) -> RepoResult<RowId>;
    fn update(&self, row: &VersionArtefact) -> RepoResult<()>;
    fn delete(&self, row_id: RowId) -> RepoResult<()>;
}

pub struct SqliteVersionArtefactRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVersionArtefactRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query(&self, filter: &str, version_id: VersionId) -> RepoResult<Vec<VersionArtefact>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VERSION_ARTEFACT_SELECT_SQL}
             WHERE version_id = ?1
               AND {filter}
             ORDER BY version_artefact_id ASC, start_date ASC, row_id ASC;"
        ))?;
        let mut rows = stmt.query(params![version_id, CURRENTLY_VALID_END_DATE])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_version_artefact_row(row)?);
        }
        Ok(items)
    }
}

impl VersionArtefactRepository for SqliteVersionArtefactRepository<'_> {
    fn load_current(&self, version_id: VersionId) -> RepoResult<Vec<VersionArtefact>> {
        self.query("end_date = ?2", version_id)
    }

    fn load_draft(&self, version_id: VersionId) -> RepoResult<Vec<VersionArtefact>> {
        self.query("start_date > ?2", version_id)
    }

    fn load_history(&self, version_id: VersionId) -> RepoResult<Vec<VersionArtefact>> {
        self.query("end_date < ?2", version_id)
    }

    fn insert(&self, row: &VersionArtefact) -> RepoResult<RowId> {
        self.conn.execute(
            "INSERT INTO version_artefacts (
                version_artefact_id,
                version_id,
                start_date,
                end_date,
                modified_by,
                kind,
                status,
                data
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                row.version_artefact_id,
                row.version_id,
                row.start_date,
                row.end_date,
                row.modified_by.as_str(),
                row.kind.as_db_str(),
                row.status.as_db_str(),
                serde_json::to_string(&row.data)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, row: &VersionArtefact) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE version_artefacts
             SET
                start_date = ?2,
                end_date = ?3,
                modified_by = ?4,
                kind = ?5,
                status = ?6,
                data = ?7
             WHERE row_id = ?1;",
            params![
                row.row_id,
                row.start_date,
                row.end_date,
                row.modified_by.as_str(),
                row.kind.as_db_str(),
                row.status.as_db_str(),
                serde_json::to_string(&row.data)?,
            ],
        )?;
        ensure_changed(changed, TABLE, row.row_id)
    }

    fn delete(&self, row_id: RowId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM version_artefacts WHERE row_id = ?1;", [row_id])?;
        ensure_changed(changed, TABLE, row_id)
    }
}

fn parse_version_artefact_row(row: &Row<'_>) -> RepoResult<VersionArtefact> {
    let kind_text: String = row.get("kind")?;
    let status_text: String = row.get("status")?;
    let data_text: String = row.get("data")?;
    Ok(VersionArtefact {
        row_id: row.get("row_id")?,
        version_artefact_id: row.get("version_artefact_id")?,
        version_id: row.get("version_id")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        modified_by: row.get("modified_by")?,
        kind: parse_enum(
            &kind_text,
            "version_artefacts.kind",
            VersionArtefactType::from_db_str,
        )?,
        status: parse_enum(
            &status_text,
            "version_artefacts.status",
            VersionArtefactStatus::from_db_str,
        )?,
        data: parse_json(&data_text, "version_artefacts.data")?,
    })
}

//! Access point row accessors.

use crate::model::access_point::{AccessPoint, AccessPointSource, AccessPointType};
use crate::model::temporal::CURRENTLY_VALID_END_DATE;
use crate::model::version::VersionId;
use crate::model::RowId;
use crate::repo::{ensure_changed, parse_enum, parse_json, RepoResult};
use rusqlite::{params, Connection, Row};

const TABLE: &str = "access_points";

const ACCESS_POINT_SELECT_SQL: &str = "SELECT
    row_id,
    access_point_id,
    version_id,
    start_date,
    end_date,
    modified_by,
    kind,
    source,
    data
FROM access_points";

pub trait AccessPointRepository {
    /// Loads current rows of one version ordered by `access_point_id`.
    fn load_current(&self, version_id: VersionId) -> RepoResult<Vec<AccessPoint>>;
    /// Loads draft rows of one version ordered by `access_point_id`.
    fn load_draft(&self, version_id: VersionId) -> RepoResult<Vec<AccessPoint>>;
    fn load_history(&self, version_id: VersionId) -> RepoResult<Vec<AccessPoint>>;
    fn insert(&self, row: &AccessPoint) -> RepoResult<RowId>;
    fn update(&self, row: &AccessPoint) -> RepoResult<()>;
    fn delete(&self, row_id: RowId) -> RepoResult<()>;
}

pub struct SqliteAccessPointRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccessPointRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query(&self, filter: &str, version_id: VersionId) -> RepoResult<Vec<AccessPoint>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ACCESS_POINT_SELECT_SQL}
             WHERE version_id = ?1
               AND {filter}
             ORDER BY access_point_id ASC, start_date ASC, row_id ASC;"
        ))?;
        let mut rows = stmt.query(params![version_id, CURRENTLY_VALID_END_DATE])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_access_point_row(row)?);
        }
        Ok(items)
    }
}

impl AccessPointRepository for SqliteAccessPointRepository<'_> {
    fn load_current(&self, version_id: VersionId) -> RepoResult<Vec<AccessPoint>> {
        self.query("end_date = ?2", version_id)
    }

    fn load_draft(&self, version_id: VersionId) -> RepoResult<Vec<AccessPoint>> {
        self.query("start_date > ?2", version_id)
    }

    fn load_history(&self, version_id: VersionId) -> RepoResult<Vec<AccessPoint>> {
        self.query("end_date < ?2", version_id)
    }

    fn insert(&self, row: &AccessPoint) -> RepoResult<RowId> {
        self.conn.execute(
            "INSERT INTO access_points (
                access_point_id,
                version_id,
                start_date,
                end_date,
                modified_by,
                kind,
                source,
                data
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                row.access_point_id,
                row.version_id,
                row.start_date,
                row.end_date,
                row.modified_by.as_str(),
                row.kind.as_db_str(),
                row.source.as_db_str(),
                serde_json::to_string(&row.data)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, row: &AccessPoint) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE access_points
             SET
                start_date = ?2,
                end_date = ?3,
                modified_by = ?4,
                kind = ?5,
                source = ?6,
                data = ?7
             WHERE row_id = ?1;",
            params![
                row.row_id,
                row.start_date,
                row.end_date,
                row.modified_by.as_str(),
                row.kind.as_db_str(),
                row.source.as_db_str(),
                serde_json::to_string(&row.data)?,
            ],
        )?;
        ensure_changed(changed, TABLE, row.row_id)
    }

    fn delete(&self, row_id: RowId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM access_points WHERE row_id = ?1;", [row_id])?;
        ensure_changed(changed, TABLE, row_id)
    }
}

fn parse_access_point_row(row: &Row<'_>) -> RepoResult<AccessPoint> {
    let kind_text: String = row.get("kind")?;
    let source_text: String = row.get("source")?;
    let data_text: String = row.get("data")?;
    Ok(AccessPoint {
        row_id: row.get("row_id")?,
        access_point_id: row.get("access_point_id")?,
        version_id: row.get("version_id")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        modified_by: row.get("modified_by")?,
        kind: parse_enum(&kind_text, "access_points.kind", AccessPointType::from_db_str)?,
        source: parse_enum(
            &source_text,
            "access_points.source",
            AccessPointSource::from_db_str,
        )?,
        data: parse_json(&data_text, "access_points.data")?,
    })
}

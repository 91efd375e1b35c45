//! Workflow task row accessors.
//!
//! # Invariants
//! - Subtasks and execution responses are stored as JSON arrays.
//! - A task must be inserted before it can be updated.

use crate::model::task::{Task, TaskId, TaskStatus};
use crate::model::vocabulary::VocabularyId;
use crate::repo::{ensure_changed, parse_enum, parse_json, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const TABLE: &str = "tasks";

const TASK_SELECT_SQL: &str = "SELECT
    task_id,
    vocabulary_id,
    version_id,
    status,
    subtasks,
    response
FROM tasks";

pub trait TaskRepository {
    fn insert(&self, task: &Task, modified_by: &str, now: i64) -> RepoResult<TaskId>;
    /// Persists status and execution response of an inserted task.
    fn update(&self, task: &Task, modified_by: &str, now: i64) -> RepoResult<()>;
    fn get(&self, task_id: TaskId) -> RepoResult<Option<Task>>;
    /// Lists every task of one vocabulary in creation order.
    fn list_for_vocabulary(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<Task>>;
}

pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn insert(&self, task: &Task, modified_by: &str, now: i64) -> RepoResult<TaskId> {
        self.conn.execute(
            "INSERT INTO tasks (
                vocabulary_id,
                version_id,
                status,
                subtasks,
                response,
                modified_by,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7);",
            params![
                task.vocabulary_id,
                task.version_id,
                task.status.as_db_str(),
                serde_json::to_string(&task.subtasks)?,
                serde_json::to_string(&task.response)?,
                modified_by,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, task: &Task, modified_by: &str, now: i64) -> RepoResult<()> {
        let task_id = task.task_id.ok_or_else(|| {
            RepoError::InvalidData("cannot update a task that was never inserted".to_string())
        })?;
        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                status = ?2,
                subtasks = ?3,
                response = ?4,
                modified_by = ?5,
                updated_at = ?6
             WHERE task_id = ?1;",
            params![
                task_id,
                task.status.as_db_str(),
                serde_json::to_string(&task.subtasks)?,
                serde_json::to_string(&task.response)?,
                modified_by,
                now,
            ],
        )?;
        ensure_changed(changed, TABLE, task_id)
    }

    fn get(&self, task_id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE task_id = ?1;"))?;
        let mut rows = stmt.query([task_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn list_for_vocabulary(&self, vocabulary_id: VocabularyId) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE vocabulary_id = ?1
             ORDER BY task_id ASC;"
        ))?;
        let mut rows = stmt.query([vocabulary_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_task_row(row)?);
        }
        Ok(items)
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let status_text: String = row.get("status")?;
    let subtasks_text: String = row.get("subtasks")?;
    let response_text: String = row.get("response")?;
    Ok(Task {
        task_id: Some(row.get("task_id")?),
        vocabulary_id: row.get("vocabulary_id")?,
        version_id: row.get("version_id")?,
        status: parse_enum(&status_text, "tasks.status", TaskStatus::from_db_str)?,
        subtasks: parse_json(&subtasks_text, "tasks.subtasks")?,
        response: parse_json(&response_text, "tasks.response")?,
    })
}

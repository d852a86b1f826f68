//! Task persistence contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the storage port `TaskStore` rehydrates from and writes through.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - `load_all` returns tasks newest first (`created_at DESC, id DESC`).
//! - Write paths report `NotFound` when no row matched.
//! - Read paths reject invalid persisted rows instead of masking them.

use crate::db::migrations::latest_version;
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::icon::TaskIcon;
use crate::model::task::{validate_task_name, Task, TaskId};
use crate::time::Timestamp;
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Lossless, lexicographically sortable storage form for timestamps.
const STORAGE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const TASK_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    icon_index,
    created_at,
    scheduled_at
FROM tasks";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for task persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(TaskId),
    InvalidData(String),
    /// Backend refused the write for a non-SQL reason.
    Unavailable(String),
}

impl RepoError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Db(err) => err.code(),
            Self::NotFound(_) => "repo_not_found",
            Self::InvalidData(_) => "repo_invalid_data",
            Self::Unavailable(_) => "repo_unavailable",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found in storage: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
            Self::Unavailable(message) => write!(f, "task storage unavailable: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::Unavailable(_) => None,
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

/// Durable storage port consumed by `TaskStore`.
///
/// The store validates before calling any write; implementations only
/// record what they are given.
pub trait TaskRepository {
    /// Returns every stored task, newest first.
    fn load_all(&self) -> RepoResult<Vec<Task>>;
    fn insert(&mut self, task: &Task) -> RepoResult<()>;
    /// Replaces the stored row with the same `id`.
    fn update(&mut self, task: &Task) -> RepoResult<()>;
    fn delete(&mut self, id: TaskId) -> RepoResult<()>;
    /// Next id to assign: above every id this storage has ever held,
    /// including deleted rows.
    fn next_id(&self) -> RepoResult<TaskId>;
}

/// SQLite-backed task repository owning its connection.
pub struct SqliteTaskRepository {
    conn: Connection,
}

impl SqliteTaskRepository {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - Returns `InvalidData` when the connection schema is not current.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self { conn })
    }

    /// Opens and migrates a database file.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens and migrates a private in-memory database.
    pub fn open_in_memory() -> RepoResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    /// Borrow of the underlying connection, for diagnostics and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl TaskRepository for SqliteTaskRepository {
    fn load_all(&self) -> RepoResult<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} ORDER BY created_at DESC, id DESC;"))?;
        let mut rows = stmt.query([])?;
        let mut tasks = Vec::new();

        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }

        Ok(tasks)
    }

    fn insert(&mut self, task: &Task) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO tasks (
                id,
                name,
                description,
                icon_index,
                created_at,
                scheduled_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                task.id,
                task.name.as_str(),
                task.description.as_str(),
                task.icon.index(),
                timestamp_to_db(task.created_at),
                timestamp_to_db(task.scheduled_at),
            ],
        )?;

        Ok(())
    }

    fn update(&mut self, task: &Task) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                name = ?2,
                description = ?3,
                icon_index = ?4,
                scheduled_at = ?5
             WHERE id = ?1;",
            params![
                task.id,
                task.name.as_str(),
                task.description.as_str(),
                task.icon.index(),
                timestamp_to_db(task.scheduled_at),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(task.id));
        }

        Ok(())
    }

    fn delete(&mut self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", [id])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn next_id(&self) -> RepoResult<TaskId> {
        let high_water: TaskId = self.conn.query_row(
            "SELECT MAX(
                COALESCE((SELECT seq FROM sqlite_sequence WHERE name = 'tasks'), 0),
                COALESCE((SELECT MAX(id) FROM tasks), 0)
            );",
            [],
            |row| row.get(0),
        )?;
        Ok(high_water + 1)
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let expected = latest_version();
    if version != expected {
        return Err(RepoError::InvalidData(format!(
            "connection schema version {version} does not match expected {expected}; open it via db::open_db"
        )));
    }
    Ok(())
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id: TaskId = row.get("id")?;

    let name: String = row.get("name")?;
    validate_task_name(&name).map_err(|err| {
        RepoError::InvalidData(format!("invalid name for task {id} in tasks.name: {err}"))
    })?;

    let icon_raw: i64 = row.get("icon_index")?;
    let icon = u32::try_from(icon_raw)
        .ok()
        .and_then(|index| TaskIcon::from_index(index).ok())
        .ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid icon index `{icon_raw}` for task {id} in tasks.icon_index"
            ))
        })?;

    let created_at = timestamp_from_db(id, "created_at", row.get("created_at")?)?;
    let scheduled_at = timestamp_from_db(id, "scheduled_at", row.get("scheduled_at")?)?;

    Ok(Task {
        id,
        name,
        description: row.get("description")?,
        icon,
        created_at,
        scheduled_at,
    })
}

fn timestamp_to_db(value: Timestamp) -> String {
    value.format(STORAGE_TIMESTAMP_FORMAT).to_string()
}

fn timestamp_from_db(id: TaskId, column: &str, raw: String) -> RepoResult<Timestamp> {
    Timestamp::parse_from_str(&raw, STORAGE_TIMESTAMP_FORMAT).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid timestamp `{raw}` for task {id} in tasks.{column}: {err}"
        ))
    })
}

//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose task use-cases to Dart via FRB.
//! - Translate core errors into stable `error_code` strings.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Timestamps cross the boundary as `dd/mm/yyyy HH:MM` text.
//! - One process-wide `TaskStore` backs every call.

use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use taskdeck_core::{
    core_version as core_version_inner, due_soon_window, format_timestamp,
    init_logging as init_logging_inner, parse_timestamp, ping as ping_inner, remaining_or_overdue,
    SqliteTaskRepository, StoreError, Task, TaskChanges, TaskDraft, TaskIcon, TaskStore, Timestamp,
};

const STORE_DB_FILE_NAME: &str = "taskdeck.sqlite3";
const STORE_DB_PATH_ENV: &str = "TASKDECK_DB_PATH";
const STORE_UNAVAILABLE: &str = "store_unavailable";

static STORE: OnceCell<TaskStore<SqliteTaskRepository>> = OnceCell::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Task projection handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Index into `icon_catalog()`.
    pub icon_index: u32,
    pub icon_key: String,
    /// `dd/mm/yyyy HH:MM`.
    pub created_at: String,
    /// `dd/mm/yyyy HH:MM`.
    pub scheduled_at: String,
    /// `Time left: ...` or `Overdue by ...`, computed at response time.
    pub countdown_label: String,
    pub overdue: bool,
}

/// Envelope for single-task commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Task after the operation; `None` on failure and for deletes.
    pub task: Option<TaskItem>,
    /// Stable machine-readable failure code.
    pub error_code: Option<String>,
    /// Diagnostic message; not meant as user-facing copy.
    pub message: String,
}

impl TaskActionResponse {
    fn success(message: impl Into<String>, task: Option<TaskItem>) -> Self {
        Self {
            ok: true,
            task,
            error_code: None,
            message: message.into(),
        }
    }

    fn failure(code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            task: None,
            error_code: Some(code.to_string()),
            message: message.into(),
        }
    }
}

/// Envelope for list-shaped queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListResponse {
    pub ok: bool,
    /// Tasks in store order, newest first.
    pub items: Vec<TaskItem>,
    /// Store revision the items were read at; see `tasks_revision()`.
    pub revision: u64,
    pub error_code: Option<String>,
    pub message: String,
}

impl TaskListResponse {
    fn from_tasks(tasks: Vec<Task>, now: Timestamp, revision: u64) -> Self {
        let items = tasks
            .into_iter()
            .map(|task| to_task_item(task, now))
            .collect::<Vec<_>>();
        let message = format!("Found {} task(s).", items.len());
        Self {
            ok: true,
            items,
            revision,
            error_code: None,
            message,
        }
    }

    fn failure(code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            items: Vec::new(),
            revision: 0,
            error_code: Some(code.to_string()),
            message: message.into(),
        }
    }
}

/// One entry of the fixed icon catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconItem {
    pub index: u32,
    pub key: String,
}

/// Creates a task.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Validation order: name format, name length, duplicate name, past schedule.
#[flutter_rust_bridge::frb(sync)]
pub fn task_add(
    name: String,
    description: String,
    icon_index: u32,
    scheduled_at_text: String,
) -> TaskActionResponse {
    let store = match shared_store() {
        Ok(store) => store,
        Err(message) => return TaskActionResponse::failure(STORE_UNAVAILABLE, message),
    };
    let scheduled_at = match parse_timestamp(&scheduled_at_text) {
        Ok(value) => value,
        Err(err) => return TaskActionResponse::failure(err.code(), err.to_string()),
    };
    let icon = match TaskIcon::from_index(icon_index) {
        Ok(icon) => icon,
        Err(err) => return TaskActionResponse::failure(err.code(), err.to_string()),
    };

    let draft = TaskDraft::new(name, scheduled_at)
        .with_description(description)
        .with_icon(icon);
    match store.add(draft) {
        Ok(task) => {
            let item = to_task_item(task, store.now());
            TaskActionResponse::success("Task created.", Some(item))
        }
        Err(err) => store_failure("task_add", &err),
    }
}

/// Edits an existing task; `None` fields keep their current value.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - The edited task is re-validated as a whole, excluding itself from the
///   duplicate-name check.
#[flutter_rust_bridge::frb(sync)]
pub fn task_update(
    id: i64,
    name: Option<String>,
    description: Option<String>,
    icon_index: Option<u32>,
    scheduled_at_text: Option<String>,
) -> TaskActionResponse {
    let store = match shared_store() {
        Ok(store) => store,
        Err(message) => return TaskActionResponse::failure(STORE_UNAVAILABLE, message),
    };
    let scheduled_at = match scheduled_at_text.as_deref().map(parse_timestamp).transpose() {
        Ok(value) => value,
        Err(err) => return TaskActionResponse::failure(err.code(), err.to_string()),
    };
    let icon = match icon_index.map(TaskIcon::from_index).transpose() {
        Ok(icon) => icon,
        Err(err) => return TaskActionResponse::failure(err.code(), err.to_string()),
    };

    let changes = TaskChanges {
        name,
        description,
        icon,
        scheduled_at,
    };
    match store.update(id, changes) {
        Ok(task) => {
            let item = to_task_item(task, store.now());
            TaskActionResponse::success("Task updated.", Some(item))
        }
        Err(err) => store_failure("task_update", &err),
    }
}

/// Deletes a task by id.
#[flutter_rust_bridge::frb(sync)]
pub fn task_delete(id: i64) -> TaskActionResponse {
    let store = match shared_store() {
        Ok(store) => store,
        Err(message) => return TaskActionResponse::failure(STORE_UNAVAILABLE, message),
    };
    match store.delete(id) {
        Ok(()) => TaskActionResponse::success("Task deleted.", None),
        Err(err) => store_failure("task_delete", &err),
    }
}

/// Lists every task, newest first.
#[flutter_rust_bridge::frb(sync)]
pub fn tasks_list() -> TaskListResponse {
    with_store_list(|store| store.list())
}

/// Case-insensitive substring search over task names.
///
/// A blank query returns the full list.
#[flutter_rust_bridge::frb(sync)]
pub fn tasks_search(query: String) -> TaskListResponse {
    with_store_list(|store| store.filtered_by_query(&query))
}

/// Tasks scheduled within the next hour, for the notification badge.
#[flutter_rust_bridge::frb(sync)]
pub fn tasks_due_soon() -> TaskListResponse {
    with_store_list(|store| store.due_within(due_soon_window(), store.now()))
}

/// Commit counter of the shared store.
///
/// Increases by one per committed add/update/delete from any caller. The UI
/// compares it with the `revision` of its last list response and re-queries
/// only when they differ. Pushing changes over an FRB stream is not wired
/// yet; this counter is the change signal until then.
///
/// # FFI contract
/// - Sync call, in-memory read.
/// - Returns `None` when the store cannot be opened.
#[flutter_rust_bridge::frb(sync)]
pub fn tasks_revision() -> Option<u64> {
    shared_store().ok().map(|store| store.revision())
}

/// The fixed icon catalog in index order.
#[flutter_rust_bridge::frb(sync)]
pub fn icon_catalog() -> Vec<IconItem> {
    TaskIcon::ALL
        .iter()
        .map(|icon| IconItem {
            index: icon.index(),
            key: icon.key().to_string(),
        })
        .collect()
}

fn with_store_list(
    f: impl FnOnce(&TaskStore<SqliteTaskRepository>) -> Vec<Task>,
) -> TaskListResponse {
    match shared_store() {
        Ok(store) => {
            let revision = store.revision();
            let tasks = f(store);
            TaskListResponse::from_tasks(tasks, store.now(), revision)
        }
        Err(message) => TaskListResponse::failure(STORE_UNAVAILABLE, message),
    }
}

fn store_failure(operation: &str, err: &StoreError) -> TaskActionResponse {
    TaskActionResponse::failure(err.code(), format!("{operation} failed: {err}"))
}

fn shared_store() -> Result<&'static TaskStore<SqliteTaskRepository>, String> {
    STORE.get_or_try_init(|| {
        let db_path = resolve_store_db_path();
        let repo = SqliteTaskRepository::open(&db_path).map_err(|err| {
            error!(
                "event=store_open module=ffi status=error error_code={}",
                err.code()
            );
            format!("task store DB open failed: {err}")
        })?;
        let store = TaskStore::open(repo).map_err(|err| {
            error!(
                "event=store_open module=ffi status=error error_code={}",
                err.code()
            );
            format!("task store load failed: {err}")
        })?;
        info!(
            "event=store_open module=ffi status=ok task_count={}",
            store.len()
        );
        Ok(store)
    })
}

fn resolve_store_db_path() -> PathBuf {
    if let Ok(raw) = std::env::var(STORE_DB_PATH_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    std::env::temp_dir().join(STORE_DB_FILE_NAME)
}

fn to_task_item(task: Task, now: Timestamp) -> TaskItem {
    let countdown = remaining_or_overdue(task.scheduled_at, now);
    TaskItem {
        id: task.id,
        icon_index: task.icon.index(),
        icon_key: task.icon.key().to_string(),
        created_at: format_timestamp(task.created_at),
        scheduled_at: format_timestamp(task.scheduled_at),
        countdown_label: countdown.label(),
        overdue: countdown.overdue,
        name: task.name,
        description: task.description,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, icon_catalog, init_logging, ping, task_add, task_delete, task_update,
        tasks_due_soon, tasks_list, tasks_revision, tasks_search,
    };
    use chrono::Duration;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};
    use taskdeck_core::{format_timestamp, Clock, SystemClock};

    static NAME_COUNTER: AtomicU32 = AtomicU32::new(0);

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn icon_catalog_lists_twelve_icons_in_order() {
        let icons = icon_catalog();
        assert_eq!(icons.len(), 12);
        assert_eq!(icons[0].key, "android");
        assert_eq!(icons[11].key, "directions_car");
        assert!(icons.iter().enumerate().all(|(i, icon)| icon.index == i as u32));
    }

    #[test]
    fn task_add_then_list_search_and_delete() {
        let name = unique_name();
        let created = task_add(name.clone(), "notes".to_string(), 2, minutes_from_now(30));
        assert!(created.ok, "{}", created.message);
        let task = created.task.expect("created task should be returned");
        assert_eq!(task.name, name);
        assert_eq!(task.icon_key, "star");
        assert!(task.countdown_label.starts_with("Time left: "));

        let listed = tasks_list();
        assert!(listed.ok, "{}", listed.message);
        assert!(listed.items.iter().any(|item| item.id == task.id));

        let found = tasks_search(name.to_lowercase());
        assert_eq!(found.items.len(), 1);
        assert_eq!(found.items[0].id, task.id);

        let due = tasks_due_soon();
        assert!(due.items.iter().any(|item| item.id == task.id));

        let deleted = task_delete(task.id);
        assert!(deleted.ok, "{}", deleted.message);
        assert!(tasks_search(name).items.is_empty());
    }

    #[test]
    fn revision_advances_after_each_committed_change() {
        let listed = tasks_list();
        assert!(listed.ok, "{}", listed.message);

        let created = task_add(unique_name(), String::new(), 0, minutes_from_now(45));
        let task = created.task.expect("created task should be returned");
        let after_add = tasks_revision().expect("store should be open");
        assert!(after_add > listed.revision);

        let rejected = task_update(task.id, Some("Bad!".to_string()), None, None, None);
        assert!(!rejected.ok);
        assert!(tasks_list().revision >= after_add);

        task_delete(task.id);
        assert!(tasks_revision().expect("store should be open") > after_add);
    }

    #[test]
    fn task_add_reports_stable_error_codes() {
        let bad_name = task_add("Nope!".to_string(), String::new(), 0, minutes_from_now(5));
        assert_eq!(bad_name.error_code.as_deref(), Some("invalid_name_format"));

        let bad_time = task_add(unique_name(), String::new(), 0, "2026-03-10 14:00".to_string());
        assert_eq!(bad_time.error_code.as_deref(), Some("malformed_timestamp"));

        let bad_icon = task_add(unique_name(), String::new(), 99, minutes_from_now(5));
        assert_eq!(bad_icon.error_code.as_deref(), Some("unknown_icon"));

        let past = task_add(unique_name(), String::new(), 0, "01/01/2000 00:00".to_string());
        assert_eq!(past.error_code.as_deref(), Some("scheduled_in_past"));
        assert!(past.task.is_none());
    }

    #[test]
    fn task_add_rejects_case_insensitive_duplicate() {
        let name = unique_name();
        let first = task_add(name.clone(), String::new(), 0, minutes_from_now(90));
        assert!(first.ok, "{}", first.message);

        let second = task_add(name.to_lowercase(), String::new(), 0, minutes_from_now(90));
        assert!(!second.ok);
        assert_eq!(second.error_code.as_deref(), Some("duplicate_name"));
    }

    #[test]
    fn task_update_keeps_absent_fields() {
        let created = task_add(unique_name(), "keep me".to_string(), 0, minutes_from_now(120));
        let task = created.task.expect("created task should be returned");

        let updated = task_update(task.id, None, None, Some(10), None);
        assert!(updated.ok, "{}", updated.message);
        let updated = updated.task.expect("updated task should be returned");
        assert_eq!(updated.icon_key, "computer");
        assert_eq!(updated.description, "keep me");
        assert_eq!(updated.scheduled_at, task.scheduled_at);
        assert_eq!(updated.created_at, task.created_at);
    }

    #[test]
    fn task_update_and_delete_report_not_found() {
        let updated = task_update(i64::MAX, Some("Ghost".to_string()), None, None, None);
        assert_eq!(updated.error_code.as_deref(), Some("not_found"));

        let deleted = task_delete(i64::MAX);
        assert_eq!(deleted.error_code.as_deref(), Some("not_found"));
    }

    fn unique_name() -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        let counter = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("T{:012}{:03}", nanos % 1_000_000_000_000, counter % 1_000)
    }

    fn minutes_from_now(minutes: i64) -> String {
        format_timestamp(SystemClock.now() + Duration::minutes(minutes))
    }
}

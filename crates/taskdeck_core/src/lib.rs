//! Core domain logic for TaskDeck.
//! This crate is the single source of truth for task invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod time;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::icon::TaskIcon;
pub use model::task::{
    validate_task_name, Task, TaskChanges, TaskDraft, TaskId, TaskValidationError,
    TASK_NAME_MAX_CHARS,
};
pub use repo::memory_repo::InMemoryTaskRepository;
pub use repo::task_repo::{RepoError, RepoResult, SqliteTaskRepository, TaskRepository};
pub use service::task_store::{
    ChangeKind, StoreChange, StoreError, StoreResult, SubscriptionId, TaskStore,
};
pub use time::{
    classify, due_soon_window, format_timestamp, parse_timestamp, remaining_or_overdue, Clock,
    Countdown, FixedClock, SystemClock, TimeStatus, Timestamp, TimestampParseError,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Task domain model and field validation.
//!
//! # Responsibility
//! - Define the canonical `Task` record and its create/update inputs.
//! - Provide context-free validation for task names and schedules.
//!
//! # Invariants
//! - `id` and `created_at` never change after creation.
//! - Names match `^[A-Za-z0-9 ]+$` and are at most 20 characters.
//! - Store-wide rules (uniqueness) are enforced by `TaskStore`, not here.

use crate::model::icon::TaskIcon;
use crate::time::{format_timestamp, Timestamp, TIMESTAMP_MAX_YEAR, TIMESTAMP_MIN_YEAR};
use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum task name length in characters.
pub const TASK_NAME_MAX_CHARS: usize = 20;

static TASK_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9 ]+$").expect("valid task name regex"));

/// Store-assigned stable identifier.
///
/// Ids increase monotonically and are never reused, even after deletion.
pub type TaskId = i64;

/// Canonical task record owned by `TaskStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub icon: TaskIcon,
    /// Wall-clock creation time, truncated to whole seconds.
    pub created_at: Timestamp,
    pub scheduled_at: Timestamp,
}

impl Task {
    /// Returns whether `other` collides with this task's name.
    ///
    /// Comparison is case-insensitive; names are ASCII once validated.
    pub fn name_matches(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }

    /// Scheduled time in the fixed `dd/mm/yyyy HH:MM` display form.
    pub fn scheduled_at_text(&self) -> String {
        format_timestamp(self.scheduled_at)
    }

    /// Creation time in the fixed `dd/mm/yyyy HH:MM` display form.
    pub fn created_at_text(&self) -> String {
        format_timestamp(self.created_at)
    }
}

/// Caller-supplied fields for a new task.
///
/// `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub name: String,
    pub description: String,
    pub icon: TaskIcon,
    pub scheduled_at: Timestamp,
}

impl TaskDraft {
    pub fn new(name: impl Into<String>, scheduled_at: Timestamp) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            icon: TaskIcon::DEFAULT,
            scheduled_at,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_icon(mut self, icon: TaskIcon) -> Self {
        self.icon = icon;
        self
    }
}

/// Partial update for an existing task. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<TaskIcon>,
    pub scheduled_at: Option<Timestamp>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.icon.is_none()
            && self.scheduled_at.is_none()
    }

    /// Applies these changes to a copy of `task`, keeping `id`/`created_at`.
    pub fn apply_to(&self, task: &Task) -> Task {
        Task {
            id: task.id,
            name: self.name.clone().unwrap_or_else(|| task.name.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| task.description.clone()),
            icon: self.icon.unwrap_or(task.icon),
            created_at: task.created_at,
            scheduled_at: self.scheduled_at.unwrap_or(task.scheduled_at),
        }
    }
}

/// Validation failures for task input.
///
/// Variants carry diagnostic data only; user-facing copy belongs to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    /// Name is empty or contains characters outside `[A-Za-z0-9 ]`.
    InvalidNameFormat,
    /// Name exceeds [`TASK_NAME_MAX_CHARS`].
    NameTooLong { chars: usize, max: usize },
    /// Another stored task already uses this name (case-insensitive).
    DuplicateName { existing_id: TaskId },
    /// Scheduled time is strictly earlier than the evaluation time.
    ScheduledInPast {
        scheduled_at: Timestamp,
        now: Timestamp,
    },
    /// Scheduled year has no `dd/mm/yyyy` text form.
    ScheduleOutOfRange { year: i32 },
    /// Icon index outside the catalog.
    UnknownIcon(u32),
}

impl TaskValidationError {
    /// Stable machine-readable code for adapters.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidNameFormat => "invalid_name_format",
            Self::NameTooLong { .. } => "name_too_long",
            Self::DuplicateName { .. } => "duplicate_name",
            Self::ScheduledInPast { .. } => "scheduled_in_past",
            Self::ScheduleOutOfRange { .. } => "schedule_out_of_range",
            Self::UnknownIcon(_) => "unknown_icon",
        }
    }
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNameFormat => {
                write!(f, "task name must be non-empty and match [A-Za-z0-9 ]")
            }
            Self::NameTooLong { chars, max } => {
                write!(f, "task name has {chars} characters; maximum is {max}")
            }
            Self::DuplicateName { existing_id } => {
                write!(f, "task name already used by task {existing_id}")
            }
            Self::ScheduledInPast { scheduled_at, now } => write!(
                f,
                "scheduled_at ({}) must not be earlier than now ({})",
                format_timestamp(*scheduled_at),
                format_timestamp(*now)
            ),
            Self::ScheduleOutOfRange { year } => write!(
                f,
                "scheduled year {year} is outside {TIMESTAMP_MIN_YEAR:04}..={TIMESTAMP_MAX_YEAR}"
            ),
            Self::UnknownIcon(index) => write!(f, "icon index {index} is not in the catalog"),
        }
    }
}

impl Error for TaskValidationError {}

/// Checks name format then length, in that order.
///
/// # Errors
/// - `InvalidNameFormat` when the name is empty or has disallowed characters.
/// - `NameTooLong` when the name exceeds [`TASK_NAME_MAX_CHARS`].
pub fn validate_task_name(name: &str) -> Result<(), TaskValidationError> {
    if !TASK_NAME_RE.is_match(name) {
        return Err(TaskValidationError::InvalidNameFormat);
    }

    let chars = name.chars().count();
    if chars > TASK_NAME_MAX_CHARS {
        return Err(TaskValidationError::NameTooLong {
            chars,
            max: TASK_NAME_MAX_CHARS,
        });
    }

    Ok(())
}

/// Rejects schedules strictly earlier than `now`; equality is accepted.
///
/// Schedules must also stay inside the four-digit years the text form can
/// express, so every stored schedule formats and parses back.
pub fn validate_schedule(
    scheduled_at: Timestamp,
    now: Timestamp,
) -> Result<(), TaskValidationError> {
    if scheduled_at < now {
        return Err(TaskValidationError::ScheduledInPast { scheduled_at, now });
    }
    let year = scheduled_at.year();
    if !(TIMESTAMP_MIN_YEAR..=TIMESTAMP_MAX_YEAR).contains(&year) {
        return Err(TaskValidationError::ScheduleOutOfRange { year });
    }
    Ok(())
}

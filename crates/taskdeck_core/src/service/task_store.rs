//! Authoritative task collection with validated mutations.
//!
//! # Responsibility
//! - Own the ordered in-memory task list and rehydrate it from storage.
//! - Validate every create/update before anything is written.
//! - Derive read views (search, due window, countdowns) on demand.
//! - Notify subscribers after each committed mutation.
//!
//! # Invariants
//! - Order is newest-created first; updates keep a task's position.
//! - Validation order is name format, name length, uniqueness, schedule.
//! - Writers are serialized by the repository lock, held across
//!   validate -> persist -> commit.
//! - Memory is only changed after the repository write succeeded, so a
//!   storage failure leaves the store exactly as it was.
//! - Listeners run after all internal locks are released.

use crate::model::task::{
    validate_schedule, validate_task_name, Task, TaskChanges, TaskDraft, TaskId,
    TaskValidationError,
};
use crate::repo::task_repo::{RepoError, TaskRepository};
use crate::time::{
    due_soon_window, is_due_within, remaining_or_overdue, Clock, Countdown, SystemClock, Timestamp,
};
use chrono::{Duration, SubsecRound};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Errors returned by store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Input violated a task rule; nothing was written.
    Validation(TaskValidationError),
    /// No task with this id exists.
    NotFound(TaskId),
    /// Storage failed; in-memory state was left unchanged.
    Persistence(RepoError),
}

impl StoreError {
    /// Stable machine-readable code for adapters.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.code(),
            Self::NotFound(_) => "not_found",
            Self::Persistence(_) => "persistence_error",
        }
    }

    /// Validation detail, when this is a validation failure.
    pub fn validation(&self) -> Option<&TaskValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::Persistence(err) => write!(f, "task storage failed: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::NotFound(_) => None,
            Self::Persistence(err) => Some(err),
        }
    }
}

impl From<TaskValidationError> for StoreError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Persistence(value)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What a committed mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added(TaskId),
    Updated(TaskId),
    Deleted(TaskId),
}

/// Notification delivered to subscribers after a committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub kind: ChangeKind,
    /// Monotonic commit counter; later changes carry larger values.
    pub revision: u64,
    /// Full collection snapshot right after the commit.
    pub tasks: Vec<Task>,
}

/// Handle returned by [`TaskStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&StoreChange) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

struct StoreState {
    tasks: Vec<Task>,
    next_id: TaskId,
    revision: u64,
}

/// Single source of truth for tasks.
///
/// `TaskStore` is `Sync` whenever `R: Send`, so one instance can be shared
/// behind an `Arc` or a `static`.
pub struct TaskStore<R: TaskRepository> {
    repo: Mutex<R>,
    state: RwLock<StoreState>,
    clock: Arc<dyn Clock>,
    subscribers: Mutex<Subscribers>,
}

impl<R: TaskRepository> TaskStore<R> {
    /// Rehydrates a store from `repo` using the device wall clock.
    pub fn open(repo: R) -> StoreResult<Self> {
        Self::open_with_clock(repo, Arc::new(SystemClock))
    }

    /// Rehydrates a store from `repo` with an injected clock.
    ///
    /// # Errors
    /// - `Persistence` when the repository cannot load its rows.
    pub fn open_with_clock(repo: R, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let tasks = repo.load_all().map_err(|err| {
            error!(
                "event=store_open module=store status=error error_code={} error={}",
                err.code(),
                err
            );
            StoreError::Persistence(err)
        })?;
        let loaded_next = tasks.iter().map(|task| task.id).max().unwrap_or(0) + 1;
        let next_id = repo
            .next_id()
            .map_err(|err| {
                error!(
                    "event=store_open module=store status=error error_code={}",
                    err.code()
                );
                StoreError::Persistence(err)
            })?
            .max(loaded_next);

        info!(
            "event=store_open module=store status=ok task_count={} next_id={}",
            tasks.len(),
            next_id
        );

        Ok(Self {
            repo: Mutex::new(repo),
            state: RwLock::new(StoreState {
                tasks,
                next_id,
                revision: 0,
            }),
            clock,
            subscribers: Mutex::new(Subscribers::default()),
        })
    }

    /// Current time according to the store clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// All tasks in store order.
    pub fn list(&self) -> Vec<Task> {
        self.read_state().tasks.clone()
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.read_state()
            .tasks
            .iter()
            .find(|task| task.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.read_state().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_state().tasks.is_empty()
    }

    /// Number of committed mutations since the store was opened.
    pub fn revision(&self) -> u64 {
        self.read_state().revision
    }

    /// Tasks whose name contains `query`, ignoring case.
    ///
    /// A blank query returns every task. Store order is preserved.
    pub fn filtered_by_query(&self, query: &str) -> Vec<Task> {
        if query.trim().is_empty() {
            return self.list();
        }

        let needle = query.to_lowercase();
        self.read_state()
            .tasks
            .iter()
            .filter(|task| task.name.to_lowercase().contains(needle.as_str()))
            .cloned()
            .collect()
    }

    /// Tasks scheduled strictly inside `(now, now + window)`, in store order.
    pub fn due_within(&self, window: Duration, now: Timestamp) -> Vec<Task> {
        self.read_state()
            .tasks
            .iter()
            .filter(|task| is_due_within(task.scheduled_at, now, window))
            .cloned()
            .collect()
    }

    /// Notification set: tasks due within the next hour of the store clock.
    pub fn due_soon(&self) -> Vec<Task> {
        self.due_within(due_soon_window(), self.now())
    }

    /// Countdown for every task relative to `now`, in store order.
    pub fn countdowns(&self, now: Timestamp) -> Vec<(TaskId, Countdown)> {
        self.read_state()
            .tasks
            .iter()
            .map(|task| (task.id, remaining_or_overdue(task.scheduled_at, now)))
            .collect()
    }

    /// Validates and creates a task, evaluated at the store clock's "now".
    pub fn add(&self, draft: TaskDraft) -> StoreResult<Task> {
        let now = self.now();
        self.add_at(draft, now)
    }

    /// Validates and creates a task, evaluated at `now`.
    ///
    /// # Errors
    /// - `Validation` for the first violated rule; nothing is written.
    /// - `Persistence` when storage rejects the insert; memory is unchanged.
    pub fn add_at(&self, draft: TaskDraft, now: Timestamp) -> StoreResult<Task> {
        let (task, change) = {
            let mut repo = self.lock_repo();

            let task = {
                let state = self.read_state();
                validate_candidate(&draft.name, draft.scheduled_at, None, &state.tasks, now)
                    .inspect_err(|err| log_rejected("task_add", None, err))?;
                Task {
                    id: state.next_id,
                    name: draft.name,
                    description: draft.description,
                    icon: draft.icon,
                    created_at: now.trunc_subsecs(0),
                    scheduled_at: draft.scheduled_at,
                }
            };

            repo.insert(&task)
                .map_err(|err| persistence_failed("task_add", task.id, err))?;

            let mut state = self.write_state();
            state.tasks.insert(0, task.clone());
            state.next_id = task.id + 1;
            info!(
                "event=task_add module=store status=ok task_id={} task_count={}",
                task.id,
                state.tasks.len()
            );
            let change = commit(&mut state, ChangeKind::Added(task.id));
            (task, change)
        };

        self.notify(&change);
        Ok(task)
    }

    /// Validates and applies `changes`, evaluated at the store clock's "now".
    pub fn update(&self, id: TaskId, changes: TaskChanges) -> StoreResult<Task> {
        let now = self.now();
        self.update_at(id, changes, now)
    }

    /// Validates and applies `changes` to task `id`, evaluated at `now`.
    ///
    /// The merged task goes through the same rules as [`TaskStore::add_at`];
    /// the uniqueness check ignores the task itself. `id` and `created_at`
    /// are never changed and the task keeps its position.
    pub fn update_at(
        &self,
        id: TaskId,
        changes: TaskChanges,
        now: Timestamp,
    ) -> StoreResult<Task> {
        let (updated, change) = {
            let mut repo = self.lock_repo();

            let updated = {
                let state = self.read_state();
                let current = state
                    .tasks
                    .iter()
                    .find(|task| task.id == id)
                    .ok_or_else(|| {
                        warn!(
                            "event=task_update module=store status=rejected task_id={id} error_code=not_found"
                        );
                        StoreError::NotFound(id)
                    })?;
                let merged = changes.apply_to(current);
                validate_candidate(&merged.name, merged.scheduled_at, Some(id), &state.tasks, now)
                    .inspect_err(|err| log_rejected("task_update", Some(id), err))?;
                merged
            };

            repo.update(&updated)
                .map_err(|err| persistence_failed("task_update", id, err))?;

            let mut state = self.write_state();
            if let Some(slot) = state.tasks.iter_mut().find(|task| task.id == id) {
                *slot = updated.clone();
            }
            info!("event=task_update module=store status=ok task_id={id}");
            let change = commit(&mut state, ChangeKind::Updated(id));
            (updated, change)
        };

        self.notify(&change);
        Ok(updated)
    }

    /// Removes task `id` from memory and storage.
    ///
    /// # Errors
    /// - `NotFound` when no task has this id; nothing is written.
    /// - `Persistence` when storage rejects the delete; memory is unchanged.
    pub fn delete(&self, id: TaskId) -> StoreResult<()> {
        let change = {
            let mut repo = self.lock_repo();

            if !self.read_state().tasks.iter().any(|task| task.id == id) {
                warn!(
                    "event=task_delete module=store status=rejected task_id={id} error_code=not_found"
                );
                return Err(StoreError::NotFound(id));
            }

            repo.delete(id)
                .map_err(|err| persistence_failed("task_delete", id, err))?;

            let mut state = self.write_state();
            state.tasks.retain(|task| task.id != id);
            info!(
                "event=task_delete module=store status=ok task_id={id} task_count={}",
                state.tasks.len()
            );
            commit(&mut state, ChangeKind::Deleted(id))
        };

        self.notify(&change);
        Ok(())
    }

    /// Registers a listener called after every committed mutation.
    pub fn subscribe(
        &self,
        listener: impl Fn(&StoreChange) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut subscribers = self.lock_subscribers();
        subscribers.next_id += 1;
        let id = SubscriptionId(subscribers.next_id);
        subscribers.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` when it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock_subscribers();
        let before = subscribers.listeners.len();
        subscribers.listeners.retain(|(existing, _)| *existing != id);
        subscribers.listeners.len() != before
    }

    fn notify(&self, change: &StoreChange) {
        let listeners: Vec<Listener> = self
            .lock_subscribers()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(change);
        }
    }

    fn lock_repo(&self) -> MutexGuard<'_, R> {
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs the ordered create/update rules against the current collection.
fn validate_candidate(
    name: &str,
    scheduled_at: Timestamp,
    exclude: Option<TaskId>,
    tasks: &[Task],
    now: Timestamp,
) -> Result<(), TaskValidationError> {
    validate_task_name(name)?;

    if let Some(existing) = tasks
        .iter()
        .find(|task| Some(task.id) != exclude && task.name_matches(name))
    {
        return Err(TaskValidationError::DuplicateName {
            existing_id: existing.id,
        });
    }

    validate_schedule(scheduled_at, now)
}

fn commit(state: &mut StoreState, kind: ChangeKind) -> StoreChange {
    state.revision += 1;
    StoreChange {
        kind,
        revision: state.revision,
        tasks: state.tasks.clone(),
    }
}

fn log_rejected(event: &str, id: Option<TaskId>, err: &TaskValidationError) {
    match id {
        Some(id) => warn!(
            "event={event} module=store status=rejected task_id={id} error_code={}",
            err.code()
        ),
        None => warn!(
            "event={event} module=store status=rejected error_code={}",
            err.code()
        ),
    }
}

fn persistence_failed(event: &str, id: TaskId, err: RepoError) -> StoreError {
    error!(
        "event={event} module=store status=error task_id={id} error_code={} error={}",
        err.code(),
        err
    );
    StoreError::Persistence(err)
}

#[cfg(test)]
mod tests {
    use super::{ChangeKind, StoreError, TaskStore};
    use crate::model::icon::TaskIcon;
    use crate::model::task::{Task, TaskChanges, TaskDraft, TaskValidationError};
    use crate::repo::memory_repo::InMemoryTaskRepository;
    use crate::repo::task_repo::SqliteTaskRepository;
    use crate::time::{parse_timestamp, FixedClock, Timestamp};
    use chrono::Duration;
    use std::sync::{Arc, Mutex};

    fn t0() -> Timestamp {
        parse_timestamp("01/03/2026 09:00").unwrap()
    }

    fn store_at(now: Timestamp) -> (TaskStore<InMemoryTaskRepository>, InMemoryTaskRepository) {
        let repo = InMemoryTaskRepository::new();
        let store =
            TaskStore::open_with_clock(repo.clone(), Arc::new(FixedClock::new(now))).unwrap();
        (store, repo)
    }

    fn draft(name: &str, scheduled_at: Timestamp) -> TaskDraft {
        TaskDraft::new(name, scheduled_at)
    }

    #[test]
    fn store_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TaskStore<SqliteTaskRepository>>();
        assert_send_sync::<TaskStore<InMemoryTaskRepository>>();
    }

    #[test]
    fn add_assigns_increasing_ids_and_prepends() {
        let (store, repo) = store_at(t0());
        let first = store.add(draft("First", t0() + Duration::hours(1))).unwrap();
        let second = store.add(draft("Second", t0() + Duration::hours(2))).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.created_at, t0());
        let names: Vec<String> = store.list().into_iter().map(|task| task.name).collect();
        assert_eq!(names, vec!["Second", "First"]);
        assert_eq!(repo.write_count(), 2);
    }

    #[test]
    fn created_at_drops_sub_second_precision() {
        let now = t0() + Duration::milliseconds(1_750);
        let (store, _) = store_at(now);
        let task = store.add(draft("Precise", now)).unwrap();
        assert_eq!(task.created_at, t0() + Duration::seconds(1));
    }

    #[test]
    fn ids_continue_after_rehydration() {
        let existing = Task {
            id: 41,
            name: "Loaded".to_string(),
            description: String::new(),
            icon: TaskIcon::Deck,
            created_at: t0() - Duration::days(1),
            scheduled_at: t0() + Duration::days(1),
        };
        let repo = InMemoryTaskRepository::with_tasks(vec![existing]);
        let store = TaskStore::open_with_clock(repo, Arc::new(FixedClock::new(t0()))).unwrap();

        let task = store.add(draft("Fresh", t0())).unwrap();
        assert_eq!(task.id, 42);
    }

    #[test]
    fn first_violated_rule_wins() {
        let (store, repo) = store_at(t0());
        store.add(draft("Report", t0() + Duration::hours(1))).unwrap();

        let past = t0() - Duration::minutes(5);
        let err = store.add(draft("report", past)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(TaskValidationError::DuplicateName { existing_id: 1 })
        ));

        let err = store.add(draft("A name that is too long", past)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(TaskValidationError::NameTooLong { .. })
        ));

        let err = store.add(draft("Fresh", past)).unwrap_err();
        assert_eq!(err.code(), "scheduled_in_past");
        assert_eq!(repo.write_count(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_keeps_position_identity_and_creation_time() {
        let (store, _) = store_at(t0());
        let older = store.add(draft("Older", t0() + Duration::hours(3))).unwrap();
        store.add(draft("Newer", t0() + Duration::hours(4))).unwrap();

        let updated = store
            .update(
                older.id,
                TaskChanges {
                    name: Some("OLDER".to_string()),
                    description: Some("now with notes".to_string()),
                    ..TaskChanges::default()
                },
            )
            .unwrap();

        assert_eq!(updated.id, older.id);
        assert_eq!(updated.created_at, older.created_at);
        assert_eq!(updated.name, "OLDER");
        let listed = store.list();
        assert_eq!(listed[1], updated);
        assert_eq!(listed[0].name, "Newer");
    }

    #[test]
    fn update_uniqueness_ignores_self_only() {
        let (store, _) = store_at(t0());
        let report = store.add(draft("Report", t0() + Duration::hours(1))).unwrap();
        store.add(draft("Budget", t0() + Duration::hours(1))).unwrap();

        let rename_to_budget = TaskChanges {
            name: Some("budget".to_string()),
            ..TaskChanges::default()
        };
        let err = store.update(report.id, rename_to_budget).unwrap_err();
        assert_eq!(err.code(), "duplicate_name");
        assert_eq!(store.get(report.id).unwrap(), report);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let (store, repo) = store_at(t0());
        let err = store.update(9, TaskChanges::default()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(9)));
        assert_eq!(repo.write_count(), 0);
    }

    #[test]
    fn persistence_failure_leaves_memory_untouched() {
        let (store, repo) = store_at(t0());
        let kept = store.add(draft("Kept", t0() + Duration::hours(1))).unwrap();
        let revision = store.revision();
        repo.set_fail_writes(true);

        let err = store.add(draft("Lost", t0() + Duration::hours(1))).unwrap_err();
        assert_eq!(err.code(), "persistence_error");

        let err = store
            .update(
                kept.id,
                TaskChanges {
                    name: Some("Changed".to_string()),
                    ..TaskChanges::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Persistence(_)));

        assert!(matches!(store.delete(kept.id), Err(StoreError::Persistence(_))));
        assert_eq!(store.list(), vec![kept.clone()]);
        assert_eq!(store.revision(), revision);

        repo.set_fail_writes(false);
        let next = store.add(draft("Lost", t0() + Duration::hours(1))).unwrap();
        assert_eq!(next.id, kept.id + 1);
        assert_eq!(repo.rows().len(), 2);
    }

    #[test]
    fn subscribers_see_each_commit_once() {
        let (store, _) = store_at(t0());
        let seen: Arc<Mutex<Vec<(ChangeKind, u64, usize)>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let subscription = store.subscribe(move |change| {
            sink.lock()
                .unwrap()
                .push((change.kind, change.revision, change.tasks.len()));
        });

        let task = store.add(draft("Watch", t0() + Duration::hours(1))).unwrap();
        store.add(draft("Watch", t0() + Duration::hours(1))).unwrap_err();
        store
            .update(
                task.id,
                TaskChanges {
                    icon: Some(TaskIcon::Star),
                    ..TaskChanges::default()
                },
            )
            .unwrap();
        store.delete(task.id).unwrap();
        store.delete(task.id).unwrap_err();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (ChangeKind::Added(task.id), 1, 1),
                (ChangeKind::Updated(task.id), 2, 1),
                (ChangeKind::Deleted(task.id), 3, 0),
            ]
        );

        assert!(store.unsubscribe(subscription));
        assert!(!store.unsubscribe(subscription));
        store.add(draft("Quiet", t0() + Duration::hours(1))).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn listeners_may_read_the_store() {
        let (store, _) = store_at(t0());
        let store = Arc::new(store);
        let observed = Arc::new(Mutex::new(0usize));
        let reader = Arc::clone(&store);
        let sink = Arc::clone(&observed);
        store.subscribe(move |_| {
            *sink.lock().unwrap() = reader.len();
        });

        store.add(draft("Reentrant", t0() + Duration::hours(1))).unwrap();
        assert_eq!(*observed.lock().unwrap(), 1);
    }

    #[test]
    fn countdowns_follow_store_order() {
        let (store, _) = store_at(t0());
        let soon = store.add(draft("Soon", t0() + Duration::minutes(30))).unwrap();
        let later = store.add(draft("Later", t0() + Duration::days(2))).unwrap();

        let countdowns = store.countdowns(t0() + Duration::hours(1));
        assert_eq!(countdowns.len(), 2);
        assert_eq!(countdowns[0].0, later.id);
        assert_eq!(countdowns[1].0, soon.id);
        assert!(countdowns[1].1.overdue);
        assert_eq!(countdowns[1].1.minutes, 30);
        assert!(!countdowns[0].1.overdue);
    }

    #[test]
    fn concurrent_adds_never_duplicate_names() {
        let (store, repo) = store_at(t0());
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.add(draft("Contended", t0())).is_ok())
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(repo.rows().len(), 1);
    }
}

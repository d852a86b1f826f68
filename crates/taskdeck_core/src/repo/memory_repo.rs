//! In-memory task repository.
//!
//! Clones share the same backing rows, so a caller can hand one handle to
//! `TaskStore` and keep another to inspect writes or simulate outages.

use crate::model::task::{Task, TaskId};
use crate::repo::task_repo::{RepoError, RepoResult, TaskRepository};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MemoryState {
    rows: Vec<Task>,
    write_count: usize,
    high_water: TaskId,
}

/// Volatile repository backed by a shared vector.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<Mutex<MemoryState>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-populated with `tasks`.
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let repo = Self::default();
        {
            let mut state = repo.lock();
            state.high_water = tasks.iter().map(|task| task.id).max().unwrap_or(0);
            state.rows = tasks;
        }
        repo
    }

    /// Makes every subsequent write fail with `Unavailable` while `true`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes recorded so far.
    pub fn write_count(&self) -> usize {
        self.lock().write_count
    }

    /// Snapshot of the stored rows in storage order.
    pub fn rows(&self) -> Vec<Task> {
        self.lock().rows.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_writable(&self) -> RepoResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable(
                "in-memory repository is rejecting writes".to_string(),
            ));
        }
        Ok(())
    }
}

impl TaskRepository for InMemoryTaskRepository {
    fn load_all(&self) -> RepoResult<Vec<Task>> {
        let mut tasks = self.lock().rows.clone();
        tasks.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(tasks)
    }

    fn insert(&mut self, task: &Task) -> RepoResult<()> {
        self.ensure_writable()?;
        let mut state = self.lock();
        if state.rows.iter().any(|row| row.id == task.id) {
            return Err(RepoError::InvalidData(format!(
                "task id {} already stored",
                task.id
            )));
        }
        state.rows.push(task.clone());
        state.high_water = state.high_water.max(task.id);
        state.write_count += 1;
        Ok(())
    }

    fn update(&mut self, task: &Task) -> RepoResult<()> {
        self.ensure_writable()?;
        let mut state = self.lock();
        let row = state
            .rows
            .iter_mut()
            .find(|row| row.id == task.id)
            .ok_or(RepoError::NotFound(task.id))?;
        *row = task.clone();
        state.write_count += 1;
        Ok(())
    }

    fn delete(&mut self, id: TaskId) -> RepoResult<()> {
        self.ensure_writable()?;
        let mut state = self.lock();
        let before = state.rows.len();
        state.rows.retain(|row| row.id != id);
        if state.rows.len() == before {
            return Err(RepoError::NotFound(id));
        }
        state.write_count += 1;
        Ok(())
    }

    fn next_id(&self) -> RepoResult<TaskId> {
        Ok(self.lock().high_water + 1)
    }
}

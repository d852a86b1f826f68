use chrono::Duration;
use std::sync::Arc;
use taskdeck_core::{
    parse_timestamp, FixedClock, RepoError, SqliteTaskRepository, StoreError, Task, TaskChanges,
    TaskDraft, TaskIcon, TaskRepository, TaskStore, Timestamp,
};

fn now() -> Timestamp {
    parse_timestamp("10/03/2026 14:00").unwrap()
}

fn sample(id: i64, name: &str, created_offset_min: i64) -> Task {
    Task {
        id,
        name: name.to_string(),
        description: format!("about {name}"),
        icon: TaskIcon::Star,
        created_at: now() + Duration::minutes(created_offset_min),
        scheduled_at: now() + Duration::days(1),
    }
}

#[test]
fn insert_update_delete_roundtrip() {
    let mut repo = SqliteTaskRepository::open_in_memory().unwrap();
    let mut task = sample(1, "Draft", 0);
    repo.insert(&task).unwrap();

    task.name = "Final".to_string();
    task.icon = TaskIcon::DirectionsCar;
    task.scheduled_at = now() + Duration::days(2) + Duration::milliseconds(250);
    repo.update(&task).unwrap();

    assert_eq!(repo.load_all().unwrap(), vec![task.clone()]);

    repo.delete(task.id).unwrap();
    assert!(repo.load_all().unwrap().is_empty());
}

#[test]
fn update_and_delete_of_missing_rows_report_not_found() {
    let mut repo = SqliteTaskRepository::open_in_memory().unwrap();
    let ghost = sample(7, "Ghost", 0);

    assert!(matches!(repo.update(&ghost), Err(RepoError::NotFound(7))));
    assert!(matches!(repo.delete(7), Err(RepoError::NotFound(7))));
}

#[test]
fn load_all_orders_newest_first_with_id_tiebreak() {
    let mut repo = SqliteTaskRepository::open_in_memory().unwrap();
    repo.insert(&sample(1, "Oldest", 0)).unwrap();
    repo.insert(&sample(2, "Tied low", 10)).unwrap();
    repo.insert(&sample(3, "Tied high", 10)).unwrap();
    repo.insert(&sample(4, "Newest", 20)).unwrap();

    let ids: Vec<i64> = repo.load_all().unwrap().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![4, 3, 2, 1]);
}

#[test]
fn storage_rejects_case_insensitive_duplicates_as_backstop() {
    let mut repo = SqliteTaskRepository::open_in_memory().unwrap();
    repo.insert(&sample(1, "Report", 0)).unwrap();

    let err = repo.insert(&sample(2, "REPORT", 1)).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
}

#[test]
fn invalid_persisted_rows_are_rejected_on_load() {
    let repo = SqliteTaskRepository::open_in_memory().unwrap();
    repo.connection()
        .execute(
            "INSERT INTO tasks (id, name, description, icon_index, created_at, scheduled_at)
             VALUES (1, 'Fine', '', 42, '2026-03-10T14:00:00', '2026-03-11T14:00:00');",
            [],
        )
        .unwrap();

    let err = repo.load_all().unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("icon_index")));
}

#[test]
fn malformed_persisted_timestamp_is_rejected_on_load() {
    let repo = SqliteTaskRepository::open_in_memory().unwrap();
    repo.connection()
        .execute(
            "INSERT INTO tasks (id, name, description, icon_index, created_at, scheduled_at)
             VALUES (1, 'Fine', '', 0, '10/03/2026 14:00', '2026-03-11T14:00:00');",
            [],
        )
        .unwrap();

    let err = repo.load_all().unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("created_at")));
}

#[test]
fn store_rehydrates_same_order_and_ids_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskdeck.sqlite3");
    let clock = Arc::new(FixedClock::new(now()));

    let before = {
        let store =
            TaskStore::open_with_clock(SqliteTaskRepository::open(&path).unwrap(), clock.clone())
                .unwrap();
        let first = store
            .add(TaskDraft::new("First", now() + Duration::hours(1)))
            .unwrap();
        clock.advance(Duration::minutes(1));
        store
            .add(TaskDraft::new("Second", now() + Duration::hours(2)).with_icon(TaskIcon::Deck))
            .unwrap();
        clock.advance(Duration::minutes(1));
        let third = store
            .add(TaskDraft::new("Third", now() + Duration::hours(3)))
            .unwrap();
        store
            .update(
                first.id,
                TaskChanges {
                    description: Some("edited".to_string()),
                    ..TaskChanges::default()
                },
            )
            .unwrap();
        store.delete(third.id).unwrap();
        store.list()
    };

    let reopened =
        TaskStore::open_with_clock(SqliteTaskRepository::open(&path).unwrap(), clock.clone())
            .unwrap();
    assert_eq!(reopened.list(), before);
    assert_eq!(before[1].description, "edited");

    let next = reopened
        .add(TaskDraft::new("Fourth", now() + Duration::hours(4)))
        .unwrap();
    assert_eq!(next.id, 4);
}

#[test]
fn deleted_newest_id_is_not_reused_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskdeck.sqlite3");
    let clock = Arc::new(FixedClock::new(now()));

    {
        let store =
            TaskStore::open_with_clock(SqliteTaskRepository::open(&path).unwrap(), clock.clone())
                .unwrap();
        let first = store
            .add(TaskDraft::new("First", now() + Duration::hours(1)))
            .unwrap();
        let second = store
            .add(TaskDraft::new("Second", now() + Duration::hours(2)))
            .unwrap();
        assert_eq!((first.id, second.id), (1, 2));
        store.delete(second.id).unwrap();
    }

    let reopened =
        TaskStore::open_with_clock(SqliteTaskRepository::open(&path).unwrap(), clock.clone())
            .unwrap();
    let third = reopened
        .add(TaskDraft::new("Third", now() + Duration::hours(3)))
        .unwrap();
    assert_eq!(third.id, 3);
}

#[test]
fn next_id_tracks_high_water_mark_across_deletes() {
    let mut repo = SqliteTaskRepository::open_in_memory().unwrap();
    assert_eq!(repo.next_id().unwrap(), 1);

    repo.insert(&sample(1, "One", 0)).unwrap();
    repo.insert(&sample(2, "Two", 1)).unwrap();
    repo.delete(2).unwrap();
    repo.delete(1).unwrap();

    assert_eq!(repo.next_id().unwrap(), 3);
}

#[test]
fn store_open_fails_on_corrupt_rows() {
    let repo = SqliteTaskRepository::open_in_memory().unwrap();
    repo.connection()
        .execute(
            "INSERT INTO tasks (id, name, description, icon_index, created_at, scheduled_at)
             VALUES (1, 'Bad name!', '', 0, '2026-03-10T14:00:00', '2026-03-11T14:00:00');",
            [],
        )
        .unwrap();

    let err = match TaskStore::open(repo) {
        Ok(_) => panic!("corrupt rows must not load"),
        Err(err) => err,
    };
    assert!(matches!(err, StoreError::Persistence(RepoError::InvalidData(_))));
}

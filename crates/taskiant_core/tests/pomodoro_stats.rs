use chrono::{NaiveDate, NaiveDateTime};
use taskiant_core::model::{ManualSession, NewTask, RowId, TaskPatch, ValidationError};
use taskiant_core::open_store_in_memory;
use taskiant_core::repo::{
    PomodoroRepository, SqlitePomodoroRepository, SqliteStatsRepository, SqliteTaskRepository,
    StatsRepository, TaskRepository,
};
use taskiant_core::{RepoError, StoreHandle};

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

fn at(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn task(store: &StoreHandle, title: &str) -> RowId {
    SqliteTaskRepository::new(store.conn())
        .create_task(&NewTask::new(title))
        .unwrap()
        .id
}

fn pomo_completed(store: &StoreHandle, id: RowId) -> i64 {
    SqliteTaskRepository::new(store.conn())
        .get_task(id)
        .unwrap()
        .unwrap()
        .pomo_completed
}

#[test]
fn completing_a_session_increments_the_task_once() {
    let store = open_store_in_memory().unwrap();
    let task_id = task(&store, "focus");
    let repo = SqlitePomodoroRepository::new(store.conn());

    let started = repo
        .start_session(task_id, at("2024-01-15 09:00:00"))
        .unwrap();
    assert_eq!(started.task_id, task_id);
    assert_eq!(started.start_time, "2024-01-15 09:00:00");
    assert_eq!(started.end_time, None);
    assert!(!started.was_completed);
    assert_eq!(pomo_completed(&store, task_id), 0);

    let completed = repo
        .complete_session(started.id, at("2024-01-15 09:25:00"))
        .unwrap()
        .unwrap();
    assert!(completed.was_completed);
    assert_eq!(completed.end_time.as_deref(), Some("2024-01-15 09:25:00"));
    assert_eq!(pomo_completed(&store, task_id), 1);

    let again = repo
        .complete_session(started.id, at("2024-01-15 09:30:00"))
        .unwrap()
        .unwrap();
    assert_eq!(again.end_time.as_deref(), Some("2024-01-15 09:25:00"));
    assert_eq!(pomo_completed(&store, task_id), 1);
}

#[test]
fn completing_a_missing_session_changes_nothing() {
    let store = open_store_in_memory().unwrap();
    let task_id = task(&store, "focus");
    let repo = SqlitePomodoroRepository::new(store.conn());

    assert_eq!(
        repo.complete_session(404, at("2024-01-15 09:25:00")).unwrap(),
        None
    );
    assert_eq!(pomo_completed(&store, task_id), 0);
}

#[test]
fn cancel_only_removes_unfinished_sessions() {
    let store = open_store_in_memory().unwrap();
    let task_id = task(&store, "focus");
    let repo = SqlitePomodoroRepository::new(store.conn());

    let running = repo
        .start_session(task_id, at("2024-01-15 10:00:00"))
        .unwrap();
    assert!(repo.cancel_session(running.id).unwrap());
    assert!(repo.sessions_for_task(task_id).unwrap().is_empty());

    let finished = repo
        .start_session(task_id, at("2024-01-15 11:00:00"))
        .unwrap();
    repo.complete_session(finished.id, at("2024-01-15 11:25:00"))
        .unwrap();
    assert!(!repo.cancel_session(finished.id).unwrap());

    let remaining = repo.sessions_for_task(task_id).unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].was_completed);
    assert!(!repo.cancel_session(404).unwrap());
}

#[test]
fn starting_a_session_for_a_missing_task_is_rejected() {
    let store = open_store_in_memory().unwrap();
    let err = SqlitePomodoroRepository::new(store.conn())
        .start_session(404, at("2024-01-15 10:00:00"))
        .unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
}

#[test]
fn manual_sessions_backfill_history() {
    let store = open_store_in_memory().unwrap();
    let task_id = task(&store, "backfill");
    let repo = SqlitePomodoroRepository::new(store.conn());

    let counted = repo
        .add_manual_session(&ManualSession::new(
            task_id,
            "2024-01-14 08:00:00",
            "2024-01-14 08:25:00",
        ))
        .unwrap();
    assert!(counted.was_completed);
    assert_eq!(pomo_completed(&store, task_id), 1);

    let uncounted = repo
        .add_manual_session(&ManualSession {
            was_completed: false,
            ..ManualSession::new(task_id, "2024-01-14 09:00:00", "2024-01-14 09:10:00")
        })
        .unwrap();
    assert!(!uncounted.was_completed);
    assert_eq!(pomo_completed(&store, task_id), 1);

    let err = repo
        .add_manual_session(&ManualSession::new(
            task_id,
            "2024-01-14 10:00:00",
            "2024-01-14 09:00:00",
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::SessionEndsBeforeStart)
    ));

    let history = repo.sessions_for_task(task_id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].start_time, "2024-01-14 09:00:00");
}

#[test]
fn sessions_on_a_day_carry_task_title() {
    let store = open_store_in_memory().unwrap();
    let first = task(&store, "read");
    let second = task(&store, "write");
    let repo = SqlitePomodoroRepository::new(store.conn());

    repo.start_session(first, at("2024-01-15 08:00:00")).unwrap();
    repo.start_session(second, at("2024-01-15 13:00:00")).unwrap();
    repo.start_session(first, at("2024-01-16 08:00:00")).unwrap();

    let day = repo.sessions_on(date("2024-01-15")).unwrap();
    let titles: Vec<&str> = day.iter().map(|item| item.task_title.as_str()).collect();
    assert_eq!(titles, vec!["write", "read"]);
    assert_eq!(day[0].project_id, None);
}

#[test]
fn stats_count_each_dimension_independently() {
    let store = open_store_in_memory().unwrap();
    let tasks = SqliteTaskRepository::new(store.conn());
    let sessions = SqlitePomodoroRepository::new(store.conn());
    let today = date("2024-01-15");

    let due_today = tasks
        .create_task(&NewTask {
            due_date: Some(today),
            ..NewTask::new("due today")
        })
        .unwrap();
    tasks
        .create_task(&NewTask {
            due_date: Some(today),
            ..NewTask::new("also due today")
        })
        .unwrap();
    let older = tasks
        .create_task(&NewTask {
            due_date: Some(date("2024-01-01")),
            ..NewTask::new("older")
        })
        .unwrap();

    let complete = TaskPatch {
        is_completed: Some(true),
        ..TaskPatch::default()
    };
    tasks.update_task(due_today.id, &complete).unwrap();
    tasks.update_task(older.id, &complete).unwrap();
    // Pin completion times so the "completed today" counter is deterministic.
    store
        .conn()
        .execute(
            "UPDATE tasks SET completed_at = '2024-01-15 18:00:00' WHERE id = ?1;",
            [older.id],
        )
        .unwrap();
    store
        .conn()
        .execute(
            "UPDATE tasks SET completed_at = '2024-01-14 18:00:00' WHERE id = ?1;",
            [due_today.id],
        )
        .unwrap();

    let finished = sessions
        .start_session(older.id, at("2024-01-15 09:00:00"))
        .unwrap();
    sessions
        .complete_session(finished.id, at("2024-01-15 09:25:00"))
        .unwrap();
    sessions
        .start_session(older.id, at("2024-01-15 10:00:00"))
        .unwrap();

    let stats = SqliteStatsRepository::new(store.conn())
        .task_stats(today)
        .unwrap();
    assert_eq!(stats.today_total, 2);
    assert_eq!(stats.today_completed, 1);
    assert_eq!(stats.all_total, 3);
    assert_eq!(stats.all_completed, 2);
    assert_eq!(stats.completed_today, 1);
    assert_eq!(stats.pomos_today, 1);
}

#[test]
fn stats_on_an_empty_store_are_zero() {
    let store = open_store_in_memory().unwrap();
    let stats = SqliteStatsRepository::new(store.conn())
        .task_stats(date("2024-01-15"))
        .unwrap();
    assert_eq!(stats.today_total, 0);
    assert_eq!(stats.today_completed, 0);
    assert_eq!(stats.all_completed, 0);
}

#[test]
fn month_summary_groups_by_day_and_rolls_over_december() {
    let store = open_store_in_memory().unwrap();
    let tasks = SqliteTaskRepository::new(store.conn());

    for (title, due) in [
        ("nov", "2024-11-30"),
        ("dec-a", "2024-12-01"),
        ("dec-b", "2024-12-01"),
        ("dec-c", "2024-12-31"),
        ("jan", "2025-01-01"),
    ] {
        tasks
            .create_task(&NewTask {
                due_date: Some(date(due)),
                ..NewTask::new(title)
            })
            .unwrap();
    }
    tasks.toggle_task(2).unwrap();

    let days = SqliteStatsRepository::new(store.conn())
        .month_summary(2024, 12)
        .unwrap();
    assert_eq!(days.len(), 2);
    assert_eq!(days[0].due_date, date("2024-12-01"));
    assert_eq!(days[0].total_tasks, 2);
    assert_eq!(days[0].completed_tasks, 1);
    assert_eq!(days[0].incomplete_tasks, 1);
    assert_eq!(days[1].due_date, date("2024-12-31"));
    assert_eq!(days[1].total_tasks, 1);
}

#[test]
fn month_summary_rejects_invalid_month() {
    let store = open_store_in_memory().unwrap();
    let err = SqliteStatsRepository::new(store.conn())
        .month_summary(2024, 13)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::InvalidMonth { year: 2024, month: 13 })
    ));
}

use chrono::NaiveDate;
use taskiant_core::clock::today;
use taskiant_core::model::{
    ClockTime, NewLabel, NewProject, NewTask, Priority, TaskPatch, TimeBlockPatch, ValidationError,
    MAX_NOTES_CHARS,
};
use taskiant_core::open_store_in_memory;
use taskiant_core::repo::{
    LabelRepository, PomodoroRepository, ProjectRepository, SqliteLabelRepository,
    SqlitePomodoroRepository, SqliteProjectRepository, SqliteTaskRepository, TaskRepository,
};
use taskiant_core::{RepoError, TaskService};

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

fn timestamp(value: &str) -> chrono::NaiveDateTime {
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").unwrap()
}

#[test]
fn create_applies_defaults_and_returns_full_row() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(store.conn());

    let task = repo.create_task(&NewTask::new("  Plan week  ")).unwrap();

    assert_eq!(task.title, "Plan week");
    assert_eq!(task.priority, Priority::LOW);
    assert_eq!(task.pomo_target, 1);
    assert_eq!(task.pomo_completed, 0);
    assert!(!task.is_completed);
    assert!(task.completed_at.is_none());
    assert!(task.notes.is_none());
    assert!(!task.created_at.is_empty());
    assert_eq!(repo.get_task(task.id).unwrap(), Some(task));
}

#[test]
fn create_rejects_invalid_fields_before_writing() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(store.conn());

    let err = repo.create_task(&NewTask::new("   ")).unwrap_err();
    assert!(matches!(err, RepoError::Validation(ValidationError::EmptyTitle)));

    let err = repo
        .create_task(&NewTask {
            priority: Some(5),
            ..NewTask::new("bad priority")
        })
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::PriorityOutOfRange(5))
    ));

    let err = repo
        .create_task(&NewTask {
            notes: Some("x".repeat(MAX_NOTES_CHARS + 1)),
            ..NewTask::new("long notes")
        })
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::NotesTooLong { .. })
    ));

    let count: i64 = store
        .conn()
        .query_row("SELECT count(*) FROM tasks;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn create_with_unknown_parent_is_a_constraint_violation() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(store.conn());

    let err = repo
        .create_task(&NewTask {
            parent_id: Some(404),
            ..NewTask::new("dangling")
        })
        .unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
}

#[test]
fn empty_patch_is_a_no_op() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(store.conn());
    let task = repo.create_task(&NewTask::new("stay")).unwrap();

    assert_eq!(repo.update_task(task.id, &TaskPatch::default()).unwrap(), None);
    assert_eq!(repo.get_task(task.id).unwrap(), Some(task));
}

#[test]
fn update_touches_only_present_fields() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(store.conn());
    let task = repo
        .create_task(&NewTask {
            notes: Some("keep these".to_string()),
            due_date: Some(date("2024-01-15")),
            priority: Some(2),
            ..NewTask::new("original")
        })
        .unwrap();

    let updated = repo
        .update_task(
            task.id,
            &TaskPatch {
                title: Some("renamed".to_string()),
                due_date: Some(None),
                ..TaskPatch::default()
            },
        )
        .unwrap()
        .unwrap();

    assert_eq!(updated.title, "renamed");
    assert_eq!(updated.due_date, None);
    assert_eq!(updated.notes.as_deref(), Some("keep these"));
    assert_eq!(updated.priority, Priority::HIGH);
}

#[test]
fn patch_from_json_distinguishes_null_from_absent() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(store.conn());
    let task = repo
        .create_task(&NewTask {
            notes: Some("n".to_string()),
            start_time: ClockTime::parse("08:15"),
            ..NewTask::new("json")
        })
        .unwrap();

    let patch: TaskPatch = serde_json::from_str(r#"{"notes": null}"#).unwrap();
    let updated = repo.update_task(task.id, &patch).unwrap().unwrap();

    assert_eq!(updated.notes, None);
    assert_eq!(updated.start_time, ClockTime::parse("08:15"));
}

#[test]
fn update_of_missing_task_returns_none() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(store.conn());
    let patch = TaskPatch {
        title: Some("ghost".to_string()),
        ..TaskPatch::default()
    };
    assert_eq!(repo.update_task(999, &patch).unwrap(), None);
    assert_eq!(repo.toggle_task(999).unwrap(), None);
    assert!(!repo.delete_task(999).unwrap());
}

#[test]
fn completion_timestamp_changes_only_on_transition() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(store.conn());
    let task = repo.create_task(&NewTask::new("finish")).unwrap();
    let complete = TaskPatch {
        is_completed: Some(true),
        ..TaskPatch::default()
    };

    let done = repo.update_task(task.id, &complete).unwrap().unwrap();
    assert!(done.is_completed);
    let stamp = done.completed_at.clone().unwrap();

    store
        .conn()
        .execute(
            "UPDATE tasks SET completed_at = '2020-01-01 00:00:00' WHERE id = ?1;",
            [task.id],
        )
        .unwrap();
    let again = repo.update_task(task.id, &complete).unwrap().unwrap();
    assert_eq!(again.completed_at.as_deref(), Some("2020-01-01 00:00:00"));
    assert_ne!(stamp, "");

    let reopened = repo
        .update_task(
            task.id,
            &TaskPatch {
                is_completed: Some(false),
                ..TaskPatch::default()
            },
        )
        .unwrap()
        .unwrap();
    assert!(!reopened.is_completed);
    assert_eq!(reopened.completed_at, None);
}

#[test]
fn toggling_twice_restores_incomplete_state_exactly() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(store.conn());
    let task = repo.create_task(&NewTask::new("toggle me")).unwrap();

    let toggled = repo.toggle_task(task.id).unwrap().unwrap();
    assert!(toggled.is_completed);
    assert!(toggled.completed_at.is_some());

    let restored = repo.toggle_task(task.id).unwrap().unwrap();
    assert_eq!(restored, task);
}

#[test]
fn move_keeps_identity_and_copy_detaches_from_hierarchy() {
    let store = open_store_in_memory().unwrap();
    let project = SqliteProjectRepository::new(store.conn())
        .create_project(&NewProject::new("Home"))
        .unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(store.conn()));

    let parent = service
        .create_task(&NewTask {
            project_id: Some(project.id),
            ..NewTask::new("parent")
        })
        .unwrap();
    let original = service
        .create_task(&NewTask {
            project_id: Some(project.id),
            parent_id: Some(parent.id),
            notes: Some("details".to_string()),
            priority: Some(2),
            pomo_target: Some(3),
            due_date: Some(date("2023-12-31")),
            ..NewTask::new("child")
        })
        .unwrap();

    let moved = service.move_to_today(original.id).unwrap().unwrap();
    assert_eq!(moved.id, original.id);
    assert_eq!(moved.due_date, Some(today()));
    assert_eq!(moved.parent_id, Some(parent.id));

    let copy = service.copy_to_today(original.id).unwrap().unwrap();
    assert_ne!(copy.id, original.id);
    assert_eq!(copy.parent_id, None);
    assert_eq!(copy.project_id, Some(project.id));
    assert_eq!(copy.title, "child");
    assert_eq!(copy.notes.as_deref(), Some("details"));
    assert_eq!(copy.priority, Priority::HIGH);
    assert_eq!(copy.pomo_target, 3);
    assert_eq!(copy.pomo_completed, 0);
    assert!(!copy.is_completed);
    assert_eq!(copy.due_date, Some(today()));

    assert_eq!(service.move_to_today(404).unwrap(), None);
    assert_eq!(service.copy_to_today(404).unwrap(), None);
}

#[test]
fn deleting_project_cascades_to_tasks_and_sessions() {
    let store = open_store_in_memory().unwrap();
    let projects = SqliteProjectRepository::new(store.conn());
    let tasks = SqliteTaskRepository::new(store.conn());
    let sessions = SqlitePomodoroRepository::new(store.conn());

    let project = projects.create_project(&NewProject::new("Doomed")).unwrap();
    let root = tasks
        .create_task(&NewTask {
            project_id: Some(project.id),
            ..NewTask::new("root")
        })
        .unwrap();
    let nested = tasks
        .create_task(&NewTask {
            parent_id: Some(root.id),
            ..NewTask::new("nested without project")
        })
        .unwrap();
    sessions
        .start_session(nested.id, timestamp("2024-01-15 09:00:00"))
        .unwrap();

    assert!(projects.delete_project(project.id).unwrap());

    assert!(tasks.get_task(root.id).unwrap().is_none());
    assert!(tasks.get_task(nested.id).unwrap().is_none());
    assert!(sessions.sessions_for_task(nested.id).unwrap().is_empty());
    assert!(!projects.delete_project(project.id).unwrap());
}

#[test]
fn deleting_task_drops_its_label_links_but_keeps_labels() {
    let store = open_store_in_memory().unwrap();
    let tasks = SqliteTaskRepository::new(store.conn());
    let labels = SqliteLabelRepository::new(store.conn());

    let task = tasks.create_task(&NewTask::new("tagged")).unwrap();
    let label = labels.create_label(&NewLabel::new("errand")).unwrap();
    assert!(labels.add_label_to_task(task.id, label.id).unwrap());

    assert!(tasks.delete_task(task.id).unwrap());

    let links: i64 = store
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM task_labels WHERE task_id = ?1;",
            [task.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(links, 0);
    assert_eq!(labels.list_labels().unwrap().len(), 1);
    assert!(!tasks.delete_task(task.id).unwrap());
}

#[test]
fn active_tasks_skip_completed_and_join_project() {
    let store = open_store_in_memory().unwrap();
    let project = SqliteProjectRepository::new(store.conn())
        .create_project(&NewProject::new("Errands").with_icon("🛒"))
        .unwrap();
    let repo = SqliteTaskRepository::new(store.conn());

    let later = repo
        .create_task(&NewTask {
            project_id: Some(project.id),
            priority: Some(2),
            due_date: Some(date("2024-02-10")),
            ..NewTask::new("later")
        })
        .unwrap();
    repo.create_task(&NewTask {
        priority: Some(2),
        due_date: Some(date("2024-02-01")),
        ..NewTask::new("sooner")
    })
    .unwrap();
    repo.create_task(&NewTask {
        priority: Some(2),
        ..NewTask::new("undated")
    })
    .unwrap();
    let done = repo.create_task(&NewTask::new("done")).unwrap();
    repo.toggle_task(done.id).unwrap();

    let active = repo.list_active().unwrap();
    let titles: Vec<&str> = active.iter().map(|item| item.task.title.as_str()).collect();
    assert_eq!(titles, vec!["sooner", "later", "undated"]);

    let with_project = active.iter().find(|item| item.task.id == later.id).unwrap();
    assert_eq!(with_project.project_name.as_deref(), Some("Errands"));
    assert_eq!(with_project.project_icon.as_deref(), Some("🛒"));
}

#[test]
fn time_block_update_only_touches_schedule_fields() {
    let store = open_store_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(store.conn()));
    let day = date("2024-04-10");
    let task = service
        .create_task(&NewTask {
            notes: Some("keep".to_string()),
            ..NewTask::new("block me")
        })
        .unwrap();

    let scheduled = service
        .update_time_block(
            task.id,
            TimeBlockPatch {
                due_date: Some(Some(day)),
                start_time: Some(ClockTime::parse("10:30")),
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(scheduled.due_date, Some(day));
    assert_eq!(scheduled.start_time.map(|time| time.to_string()).as_deref(), Some("10:30"));
    assert_eq!(scheduled.notes.as_deref(), Some("keep"));
    assert_eq!(service.time_blocked_tasks(day).unwrap().len(), 1);

    let cleared = service
        .update_time_block(
            task.id,
            TimeBlockPatch {
                due_date: None,
                start_time: Some(None),
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(cleared.start_time, None);
    assert_eq!(cleared.due_date, Some(day));
    assert!(service.time_blocked_tasks(day).unwrap().is_empty());

    assert_eq!(
        service
            .update_time_block(task.id, TimeBlockPatch::default())
            .unwrap(),
        None
    );
}

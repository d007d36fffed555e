use taskiant_core::model::{
    NewLabel, NewProject, NewTask, ProjectPatch, ValidationError, DEFAULT_LABEL_COLOR,
    DEFAULT_PROJECT_ICON,
};
use taskiant_core::open_store_in_memory;
use taskiant_core::repo::{
    LabelRepository, ProjectRepository, SettingsRepository, SqliteLabelRepository,
    SqliteProjectRepository, SqliteSettingsRepository, SqliteTaskRepository, TaskRepository,
};
use taskiant_core::RepoError;

#[test]
fn projects_append_in_sort_order() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteProjectRepository::new(store.conn());

    let work = repo
        .create_project(&NewProject::new("Work").with_icon("💼"))
        .unwrap();
    let home = repo.create_project(&NewProject::new("Home")).unwrap();

    assert_eq!(work.sort_order, 0);
    assert_eq!(work.icon, "💼");
    assert_eq!(home.sort_order, 1);
    assert_eq!(home.icon, DEFAULT_PROJECT_ICON);

    // Deleting the first project does not reuse its slot.
    repo.delete_project(work.id).unwrap();
    let errands = repo.create_project(&NewProject::new("Errands")).unwrap();
    assert_eq!(errands.sort_order, 2);
}

#[test]
fn projects_list_by_sort_order() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteProjectRepository::new(store.conn());
    let first = repo.create_project(&NewProject::new("First")).unwrap();
    repo.create_project(&NewProject::new("Second")).unwrap();

    repo.update_project(
        first.id,
        &ProjectPatch {
            sort_order: Some(10),
            ..ProjectPatch::default()
        },
    )
    .unwrap();

    let names: Vec<String> = repo
        .list_projects()
        .unwrap()
        .into_iter()
        .map(|project| project.name)
        .collect();
    assert_eq!(names, vec!["Second".to_string(), "First".to_string()]);
}

#[test]
fn project_update_is_partial_and_empty_patch_is_a_no_op() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteProjectRepository::new(store.conn());
    let project = repo
        .create_project(&NewProject::new("Side").with_icon("🧪"))
        .unwrap();

    assert_eq!(
        repo.update_project(project.id, &ProjectPatch::default())
            .unwrap(),
        None
    );

    let renamed = repo
        .update_project(
            project.id,
            &ProjectPatch {
                name: Some("  Side quest ".to_string()),
                ..ProjectPatch::default()
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(renamed.name, "Side quest");
    assert_eq!(renamed.icon, "🧪");
    assert_eq!(renamed.sort_order, project.sort_order);

    let err = repo
        .update_project(
            project.id,
            &ProjectPatch {
                name: Some(" ".to_string()),
                ..ProjectPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(ValidationError::EmptyName)));

    let missing = repo
        .update_project(
            404,
            &ProjectPatch {
                name: Some("ghost".to_string()),
                ..ProjectPatch::default()
            },
        )
        .unwrap();
    assert_eq!(missing, None);
}

#[test]
fn duplicate_label_name_is_a_constraint_violation() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteLabelRepository::new(store.conn());

    let urgent = repo.create_label(&NewLabel::new("urgent")).unwrap();
    assert_eq!(urgent.color, DEFAULT_LABEL_COLOR);

    let err = repo.create_label(&NewLabel::new("urgent")).unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
    assert_eq!(repo.list_labels().unwrap().len(), 1);
}

#[test]
fn label_association_degrades_to_boolean() {
    let store = open_store_in_memory().unwrap();
    let labels = SqliteLabelRepository::new(store.conn());
    let tasks = SqliteTaskRepository::new(store.conn());

    let task = tasks.create_task(&NewTask::new("tagged")).unwrap();
    let home = labels
        .create_label(&NewLabel {
            name: "home".to_string(),
            color: Some("#10B981".to_string()),
        })
        .unwrap();
    let admin = labels.create_label(&NewLabel::new("admin")).unwrap();

    assert!(labels.add_label_to_task(task.id, home.id).unwrap());
    assert!(!labels.add_label_to_task(task.id, home.id).unwrap());
    assert!(labels.add_label_to_task(task.id, admin.id).unwrap());
    assert!(!labels.add_label_to_task(task.id, 404).unwrap());

    let names: Vec<String> = labels
        .labels_for_task(task.id)
        .unwrap()
        .into_iter()
        .map(|label| label.name)
        .collect();
    assert_eq!(names, vec!["admin".to_string(), "home".to_string()]);

    assert!(labels.remove_label_from_task(task.id, admin.id).unwrap());
    assert!(!labels.remove_label_from_task(task.id, admin.id).unwrap());

    // Deleting a label drops its associations.
    assert!(labels.delete_label(home.id).unwrap());
    assert!(labels.labels_for_task(task.id).unwrap().is_empty());
}

#[test]
fn settings_upsert_and_read_back() {
    let store = open_store_in_memory().unwrap();
    let repo = SqliteSettingsRepository::new(store.conn());

    assert_eq!(repo.get_setting("theme").unwrap().as_deref(), Some("midnight"));
    assert_eq!(repo.get_setting("missing").unwrap(), None);

    repo.set_setting("theme", "daylight").unwrap();
    repo.set_setting("language", "de").unwrap();

    let all = repo.all_settings().unwrap();
    assert_eq!(all.get("theme").map(String::as_str), Some("daylight"));
    assert_eq!(all.get("language").map(String::as_str), Some("de"));
    assert_eq!(all.get("pomo_work").map(String::as_str), Some("25"));
}

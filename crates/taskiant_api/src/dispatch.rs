//! JSON request dispatcher for process-boundary transports.
//!
//! Requests are objects tagged by `op` (camelCase operation name); the
//! remaining keys are the operation's arguments. Every request yields one
//! JSON value, including malformed ones.

use crate::api::{ApiResponse, TaskiantApi};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use taskiant_core::model::{
    ManualSession, NewLabel, NewProject, NewTask, ProjectPatch, RowId, TaskPatch, TimeBlockPatch,
};
use taskiant_core::SessionKind;

/// One boundary operation, tagged by `op`.
#[derive(Clone, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ApiRequest {
    CheckAuthStatus,
    Login {
        password: String,
    },
    LoginWithDeviceKey,
    Logout,
    StoreStatus,

    ListProjects,
    CreateProject(NewProject),
    UpdateProject {
        id: RowId,
        #[serde(default)]
        patch: ProjectPatch,
    },
    DeleteProject {
        id: RowId,
    },

    GetTasks {
        #[serde(default)]
        project_id: Option<RowId>,
    },
    GetTasksToday,
    GetTasksByDate {
        date: NaiveDate,
    },
    GetTasksForDate {
        date: NaiveDate,
    },
    CreateTask(NewTask),
    UpdateTask {
        id: RowId,
        #[serde(default)]
        patch: TaskPatch,
    },
    DeleteTask {
        id: RowId,
    },
    ToggleTask {
        id: RowId,
    },
    MoveToToday {
        id: RowId,
    },
    CopyToToday {
        id: RowId,
    },
    GetAllActiveTasks,

    GetLabels,
    CreateLabel(NewLabel),
    DeleteLabel {
        id: RowId,
    },
    AddLabelToTask {
        task_id: RowId,
        label_id: RowId,
    },
    RemoveLabelFromTask {
        task_id: RowId,
        label_id: RowId,
    },
    GetTaskLabels {
        task_id: RowId,
    },

    GetSettings,
    GetSetting {
        key: String,
    },
    SetSetting {
        key: String,
        value: String,
    },

    CreateBackup,
    ListBackups,
    RestoreBackup {
        path: PathBuf,
    },

    GetStats,

    StartPomodoro {
        task_id: RowId,
    },
    CompletePomodoro {
        session_id: RowId,
    },
    CancelPomodoro {
        session_id: RowId,
    },
    GetTaskPomodoros {
        task_id: RowId,
    },
    GetTodayPomodoros,
    AddManualPomodoro(ManualSession),
    NotifyPomodoro {
        kind: SessionKind,
        #[serde(default)]
        task_title: String,
        #[serde(default)]
        session_number: u32,
    },

    GetTasksForMonth {
        year: i32,
        month: u32,
    },
    UpdateTaskTimeBlock {
        id: RowId,
        #[serde(default)]
        patch: TimeBlockPatch,
    },
    GetTimeBlockedTasks {
        date: NaiveDate,
    },
}

impl TaskiantApi {
    /// Runs one request and serializes its envelope.
    pub fn dispatch(&mut self, request: ApiRequest) -> Value {
        match request {
            ApiRequest::CheckAuthStatus => to_json(self.check_auth_status()),
            ApiRequest::Login { password } => to_json(self.login(&password)),
            ApiRequest::LoginWithDeviceKey => to_json(self.login_with_device_key()),
            ApiRequest::Logout => to_json(self.logout()),
            ApiRequest::StoreStatus => to_json(self.store_status()),

            ApiRequest::ListProjects => to_json(self.list_projects()),
            ApiRequest::CreateProject(project) => to_json(self.create_project(&project)),
            ApiRequest::UpdateProject { id, patch } => to_json(self.update_project(id, &patch)),
            ApiRequest::DeleteProject { id } => to_json(self.delete_project(id)),

            ApiRequest::GetTasks { project_id } => to_json(self.get_tasks(project_id)),
            ApiRequest::GetTasksToday => to_json(self.get_tasks_today()),
            ApiRequest::GetTasksByDate { date } => to_json(self.get_tasks_by_date(date)),
            ApiRequest::GetTasksForDate { date } => to_json(self.get_tasks_for_date(date)),
            ApiRequest::CreateTask(task) => to_json(self.create_task(&task)),
            ApiRequest::UpdateTask { id, patch } => to_json(self.update_task(id, &patch)),
            ApiRequest::DeleteTask { id } => to_json(self.delete_task(id)),
            ApiRequest::ToggleTask { id } => to_json(self.toggle_task(id)),
            ApiRequest::MoveToToday { id } => to_json(self.move_to_today(id)),
            ApiRequest::CopyToToday { id } => to_json(self.copy_to_today(id)),
            ApiRequest::GetAllActiveTasks => to_json(self.get_all_active_tasks()),

            ApiRequest::GetLabels => to_json(self.get_labels()),
            ApiRequest::CreateLabel(label) => to_json(self.create_label(&label)),
            ApiRequest::DeleteLabel { id } => to_json(self.delete_label(id)),
            ApiRequest::AddLabelToTask { task_id, label_id } => {
                to_json(self.add_label_to_task(task_id, label_id))
            }
            ApiRequest::RemoveLabelFromTask { task_id, label_id } => {
                to_json(self.remove_label_from_task(task_id, label_id))
            }
            ApiRequest::GetTaskLabels { task_id } => to_json(self.get_task_labels(task_id)),

            ApiRequest::GetSettings => to_json(self.get_settings()),
            ApiRequest::GetSetting { key } => to_json(self.get_setting(&key)),
            ApiRequest::SetSetting { key, value } => to_json(self.set_setting(&key, &value)),

            ApiRequest::CreateBackup => to_json(self.create_backup()),
            ApiRequest::ListBackups => to_json(self.list_backups()),
            ApiRequest::RestoreBackup { path } => to_json(self.restore_backup(path)),

            ApiRequest::GetStats => to_json(self.get_stats()),

            ApiRequest::StartPomodoro { task_id } => to_json(self.start_pomodoro(task_id)),
            ApiRequest::CompletePomodoro { session_id } => {
                to_json(self.complete_pomodoro(session_id))
            }
            ApiRequest::CancelPomodoro { session_id } => to_json(self.cancel_pomodoro(session_id)),
            ApiRequest::GetTaskPomodoros { task_id } => to_json(self.get_task_pomodoros(task_id)),
            ApiRequest::GetTodayPomodoros => to_json(self.get_today_pomodoros()),
            ApiRequest::AddManualPomodoro(session) => to_json(self.add_manual_pomodoro(&session)),
            ApiRequest::NotifyPomodoro {
                kind,
                task_title,
                session_number,
            } => to_json(self.pomodoro_notification(kind, &task_title, session_number)),

            ApiRequest::GetTasksForMonth { year, month } => {
                to_json(self.get_tasks_for_month(year, month))
            }
            ApiRequest::UpdateTaskTimeBlock { id, patch } => {
                to_json(self.update_task_time_block(id, patch))
            }
            ApiRequest::GetTimeBlockedTasks { date } => {
                to_json(self.get_time_blocked_tasks(date))
            }
        }
    }

    /// Parses `raw`, dispatches it and returns the serialized envelope.
    ///
    /// Malformed requests produce a failure envelope, never an error.
    pub fn dispatch_json(&mut self, raw: &str) -> String {
        let response = match serde_json::from_str::<ApiRequest>(raw) {
            Ok(request) => self.dispatch(request),
            Err(err) => {
                log::warn!("event=api_dispatch module=api status=error error_code=bad_request");
                to_json(ApiResponse::<()>::failure(format!("invalid request: {err}")))
            }
        };
        response.to_string()
    }
}

fn to_json<T: Serialize>(response: T) -> Value {
    serde_json::to_value(response).unwrap_or_else(|err| {
        json!({
            "ok": false,
            "data": null,
            "error": format!("failed to encode response: {err}"),
        })
    })
}

//! Boundary facade between the presentation tier and the data layer.
//!
//! # Responsibility
//! - Own the single store handle, the backup manager and the key vault.
//! - Expose each data-layer operation as a synchronous, typed call.
//! - Turn every outcome into an envelope the caller can render.
//!
//! # Invariants
//! - No call panics across this boundary; panics inside an operation are
//!   caught and reported as failures.
//! - At most one store handle is open; a new login closes the previous one.
//! - A failed post-login backup never fails the login.

use chrono::NaiveDate;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;
use taskiant_core::model::{
    Label, ManualSession, MonthDaySummary, NewLabel, NewProject, NewTask, PomodoroSession,
    Project, ProjectPatch, RowId, SessionWithTask, Task, TaskNode, TaskPatch, TaskStats,
    TaskWithProject, TimeBlockPatch,
};
use taskiant_core::repo::{
    LabelRepository, ProjectRepository, SettingsRepository, SqliteLabelRepository,
    SqlitePomodoroRepository, SqliteProjectRepository, SqliteSettingsRepository,
    SqliteStatsRepository, SqliteTaskRepository, StatsRepository,
};
use taskiant_core::{
    check_exists, clock, open_store, BackupEntry, BackupManager, CoreConfig, DbError, KeyVault,
    KeyringSecureStorage, PomodoroNotification, PomodoroService, RepoError, RepoResult,
    SecureStorage, SessionKind, StoreHandle, StoreSecret, TaskService,
};

const BACKUP_ENABLED_KEY: &str = "backup_enabled";

/// Result envelope for every data operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    /// No store file yet; the caller should offer "create" rather than "unlock".
    pub needs_setup: bool,
    pub store_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginResponse {
    fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum StoreStatus {
    Closed,
    Open,
    Failed { reason: String },
}

enum StoreState {
    Closed,
    Open(StoreHandle),
    Failed(String),
}

/// The data layer as seen by the presentation tier.
pub struct TaskiantApi {
    config: CoreConfig,
    backups: BackupManager,
    vault: KeyVault<Box<dyn SecureStorage>>,
    store: StoreState,
}

impl TaskiantApi {
    /// Facade over the OS credential store.
    pub fn new(config: CoreConfig) -> Self {
        Self::with_secure_storage(config, Box::new(KeyringSecureStorage::default()))
    }

    pub fn with_secure_storage(config: CoreConfig, storage: Box<dyn SecureStorage>) -> Self {
        let backups = BackupManager::new(&config.paths.backup_dir, config.max_backups);
        let vault = KeyVault::new(&config.paths.key_path, storage, config.key_fallback);
        Self {
            config,
            backups,
            vault,
            store: StoreState::Closed,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Starts file logging under the configured directory.
    pub fn init_logging(&self) -> ApiResponse<()> {
        match taskiant_core::init_logging(&self.config.log_level, &self.config.paths.log_dir) {
            Ok(()) => ApiResponse::success(()),
            Err(err) => ApiResponse::failure(err.to_string()),
        }
    }

    pub fn check_auth_status(&self) -> AuthStatus {
        AuthStatus {
            needs_setup: !check_exists(self.config.store_path()),
            store_path: self.config.store_path().display().to_string(),
        }
    }

    /// Opens (or creates) the store under `password`.
    pub fn login(&mut self, password: &str) -> LoginResponse {
        if password.is_empty() {
            return LoginResponse::failure("password must not be empty");
        }
        self.open_with(StoreSecret::Password(password.to_string()))
    }

    /// Opens (or creates) the store under the key vault's device key.
    pub fn login_with_device_key(&mut self) -> LoginResponse {
        match self.vault.get_or_create_key() {
            Ok(key) => self.open_with(StoreSecret::DeviceKey(key)),
            Err(err) => {
                error!("event=api_login module=api status=error error_code=key_unavailable");
                self.store = StoreState::Failed(err.to_string());
                LoginResponse::failure(err.to_string())
            }
        }
    }

    /// Closes the open store, if any.
    pub fn logout(&mut self) -> ApiResponse<bool> {
        match std::mem::replace(&mut self.store, StoreState::Closed) {
            StoreState::Open(handle) => match handle.close() {
                Ok(()) => ApiResponse::success(true),
                Err(err) => ApiResponse::failure(err.to_string()),
            },
            StoreState::Closed | StoreState::Failed(_) => ApiResponse::success(false),
        }
    }

    pub fn store_status(&self) -> StoreStatus {
        match &self.store {
            StoreState::Closed => StoreStatus::Closed,
            StoreState::Open(_) => StoreStatus::Open,
            StoreState::Failed(reason) => StoreStatus::Failed {
                reason: reason.clone(),
            },
        }
    }

    fn open_with(&mut self, secret: StoreSecret) -> LoginResponse {
        if let Some(message) = self.logout().error {
            warn!("event=api_login module=api status=degraded error_code=db_close_failed error={message}");
        }
        let path = self.config.store_path().to_path_buf();

        match catch_unwind(AssertUnwindSafe(|| open_store(&path, &secret))) {
            Ok(Ok(handle)) => {
                self.backup_after_login(&handle);
                self.store = StoreState::Open(handle);
                info!("event=api_login module=api status=ok");
                LoginResponse::success()
            }
            Ok(Err(err)) => {
                let message = err.to_string();
                self.store = StoreState::Failed(message.clone());
                LoginResponse::failure(message)
            }
            Err(_) => {
                error!("event=api_login module=api status=error error_code=panic");
                self.store = StoreState::Failed("internal error while opening store".to_string());
                LoginResponse::failure("internal error while opening store")
            }
        }
    }

    fn backup_after_login(&self, handle: &StoreHandle) {
        let enabled = match SqliteSettingsRepository::new(handle.conn()).get_setting(BACKUP_ENABLED_KEY)
        {
            Ok(value) => value.map_or(true, |value| value.trim().eq_ignore_ascii_case("true")),
            Err(err) => {
                warn!(
                    "event=api_login module=api status=degraded error_code=settings_unreadable error={err}"
                );
                false
            }
        };
        if enabled && !self.backups.create_backup_from_store(handle) {
            warn!("event=api_login module=api status=degraded error_code=backup_failed");
        }
    }

    pub fn list_projects(&self) -> ApiResponse<Vec<Project>> {
        self.with_store("listProjects", |store| {
            SqliteProjectRepository::new(store.conn()).list_projects()
        })
    }

    pub fn create_project(&self, project: &NewProject) -> ApiResponse<Project> {
        self.with_store("createProject", |store| {
            SqliteProjectRepository::new(store.conn()).create_project(project)
        })
    }

    pub fn update_project(&self, id: RowId, patch: &ProjectPatch) -> ApiResponse<Option<Project>> {
        self.with_store("updateProject", |store| {
            SqliteProjectRepository::new(store.conn()).update_project(id, patch)
        })
    }

    pub fn delete_project(&self, id: RowId) -> ApiResponse<bool> {
        self.with_store("deleteProject", |store| {
            SqliteProjectRepository::new(store.conn()).delete_project(id)
        })
    }

    /// Hierarchy of a project; `None` lists tasks without a project.
    pub fn get_tasks(&self, project_id: Option<RowId>) -> ApiResponse<Vec<TaskNode>> {
        self.with_tasks("getTasks", |tasks| tasks.project_tasks(project_id))
    }

    pub fn get_tasks_today(&self) -> ApiResponse<Vec<TaskNode>> {
        self.with_tasks("getTasksToday", |tasks| tasks.tasks_today())
    }

    pub fn get_tasks_by_date(&self, date: NaiveDate) -> ApiResponse<Vec<TaskNode>> {
        self.with_tasks("getTasksByDate", |tasks| tasks.tasks_due_on(date))
    }

    pub fn get_tasks_for_date(&self, date: NaiveDate) -> ApiResponse<Vec<TaskNode>> {
        self.with_tasks("getTasksForDate", |tasks| tasks.tasks_for_time_grid(date))
    }

    pub fn create_task(&self, task: &NewTask) -> ApiResponse<Task> {
        self.with_tasks("createTask", |tasks| tasks.create_task(task))
    }

    pub fn update_task(&self, id: RowId, patch: &TaskPatch) -> ApiResponse<Option<Task>> {
        self.with_tasks("updateTask", |tasks| tasks.update_task(id, patch))
    }

    pub fn delete_task(&self, id: RowId) -> ApiResponse<bool> {
        self.with_tasks("deleteTask", |tasks| tasks.delete_task(id))
    }

    pub fn toggle_task(&self, id: RowId) -> ApiResponse<Option<Task>> {
        self.with_tasks("toggleTask", |tasks| tasks.toggle_task(id))
    }

    pub fn move_to_today(&self, id: RowId) -> ApiResponse<Option<Task>> {
        self.with_tasks("moveToToday", |tasks| tasks.move_to_today(id))
    }

    pub fn copy_to_today(&self, id: RowId) -> ApiResponse<Option<Task>> {
        self.with_tasks("copyToToday", |tasks| tasks.copy_to_today(id))
    }

    pub fn get_all_active_tasks(&self) -> ApiResponse<Vec<TaskWithProject>> {
        self.with_tasks("getAllActiveTasks", |tasks| tasks.active_tasks())
    }

    pub fn update_task_time_block(
        &self,
        id: RowId,
        patch: TimeBlockPatch,
    ) -> ApiResponse<Option<Task>> {
        self.with_tasks("updateTaskTimeBlock", |tasks| {
            tasks.update_time_block(id, patch)
        })
    }

    pub fn get_time_blocked_tasks(&self, date: NaiveDate) -> ApiResponse<Vec<TaskWithProject>> {
        self.with_tasks("getTimeBlockedTasks", |tasks| tasks.time_blocked_tasks(date))
    }

    pub fn get_tasks_for_month(&self, year: i32, month: u32) -> ApiResponse<Vec<MonthDaySummary>> {
        self.with_store("getTasksForMonth", |store| {
            SqliteStatsRepository::new(store.conn()).month_summary(year, month)
        })
    }

    pub fn get_labels(&self) -> ApiResponse<Vec<Label>> {
        self.with_store("getLabels", |store| {
            SqliteLabelRepository::new(store.conn()).list_labels()
        })
    }

    pub fn create_label(&self, label: &NewLabel) -> ApiResponse<Label> {
        self.with_store("createLabel", |store| {
            SqliteLabelRepository::new(store.conn()).create_label(label)
        })
    }

    pub fn delete_label(&self, id: RowId) -> ApiResponse<bool> {
        self.with_store("deleteLabel", |store| {
            SqliteLabelRepository::new(store.conn()).delete_label(id)
        })
    }

    pub fn add_label_to_task(&self, task_id: RowId, label_id: RowId) -> ApiResponse<bool> {
        self.with_store("addLabelToTask", |store| {
            SqliteLabelRepository::new(store.conn()).add_label_to_task(task_id, label_id)
        })
    }

    pub fn remove_label_from_task(&self, task_id: RowId, label_id: RowId) -> ApiResponse<bool> {
        self.with_store("removeLabelFromTask", |store| {
            SqliteLabelRepository::new(store.conn()).remove_label_from_task(task_id, label_id)
        })
    }

    pub fn get_task_labels(&self, task_id: RowId) -> ApiResponse<Vec<Label>> {
        self.with_store("getTaskLabels", |store| {
            SqliteLabelRepository::new(store.conn()).labels_for_task(task_id)
        })
    }

    pub fn get_settings(&self) -> ApiResponse<BTreeMap<String, String>> {
        self.with_store("getSettings", |store| {
            SqliteSettingsRepository::new(store.conn()).all_settings()
        })
    }

    pub fn get_setting(&self, key: &str) -> ApiResponse<Option<String>> {
        self.with_store("getSetting", |store| {
            SqliteSettingsRepository::new(store.conn()).get_setting(key)
        })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> ApiResponse<bool> {
        self.with_store("setSetting", |store| {
            SqliteSettingsRepository::new(store.conn())
                .set_setting(key, value)
                .map(|()| true)
        })
    }

    /// Snapshots the open store; `false` when no store is open or the copy fails.
    pub fn create_backup(&self) -> ApiResponse<bool> {
        match &self.store {
            StoreState::Open(handle) => {
                ApiResponse::success(self.backups.create_backup_from_store(handle))
            }
            StoreState::Closed | StoreState::Failed(_) => ApiResponse::success(false),
        }
    }

    pub fn list_backups(&self) -> ApiResponse<Vec<BackupEntry>> {
        ApiResponse::success(self.backups.list_backups())
    }

    /// Replaces the store file with `backup`.
    ///
    /// Closes the open handle first; the caller must log in again afterwards.
    pub fn restore_backup(&mut self, backup: impl AsRef<Path>) -> ApiResponse<bool> {
        let backup: PathBuf = backup.as_ref().to_path_buf();
        if !backup.is_file() {
            return ApiResponse::success(false);
        }
        if let StoreState::Open(_) = self.store {
            let closed = self.logout();
            if !closed.ok {
                return ApiResponse::failure(
                    closed
                        .error
                        .unwrap_or_else(|| "failed to close store".to_string()),
                );
            }
        }
        let restored = self
            .backups
            .restore_backup(&backup, self.config.store_path());
        ApiResponse::success(restored)
    }

    pub fn get_stats(&self) -> ApiResponse<TaskStats> {
        self.with_store("getStats", |store| {
            SqliteStatsRepository::new(store.conn()).task_stats(clock::today())
        })
    }

    pub fn start_pomodoro(&self, task_id: RowId) -> ApiResponse<PomodoroSession> {
        self.with_pomodoro("startPomodoro", |pomodoro| pomodoro.start(task_id))
    }

    pub fn complete_pomodoro(&self, session_id: RowId) -> ApiResponse<Option<PomodoroSession>> {
        self.with_pomodoro("completePomodoro", |pomodoro| pomodoro.complete(session_id))
    }

    pub fn cancel_pomodoro(&self, session_id: RowId) -> ApiResponse<bool> {
        self.with_pomodoro("cancelPomodoro", |pomodoro| pomodoro.cancel(session_id))
    }

    pub fn get_task_pomodoros(&self, task_id: RowId) -> ApiResponse<Vec<PomodoroSession>> {
        self.with_pomodoro("getTaskPomodoros", |pomodoro| {
            pomodoro.task_sessions(task_id)
        })
    }

    pub fn get_today_pomodoros(&self) -> ApiResponse<Vec<SessionWithTask>> {
        self.with_pomodoro("getTodayPomodoros", |pomodoro| pomodoro.today_sessions())
    }

    pub fn add_manual_pomodoro(&self, session: &ManualSession) -> ApiResponse<PomodoroSession> {
        self.with_pomodoro("addManualPomodoro", |pomodoro| pomodoro.add_manual(session))
    }

    pub fn pomodoro_notification(
        &self,
        kind: SessionKind,
        task_title: &str,
        session_number: u32,
    ) -> ApiResponse<PomodoroNotification> {
        ApiResponse::success(PomodoroNotification::for_session(
            kind,
            task_title,
            session_number,
        ))
    }

    fn with_tasks<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&TaskService<SqliteTaskRepository<'_>>) -> RepoResult<T>,
    ) -> ApiResponse<T> {
        self.with_store(op, |store| {
            f(&TaskService::new(SqliteTaskRepository::new(store.conn())))
        })
    }

    fn with_pomodoro<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&PomodoroService<SqlitePomodoroRepository<'_>>) -> RepoResult<T>,
    ) -> ApiResponse<T> {
        self.with_store(op, |store| {
            f(&PomodoroService::new(SqlitePomodoroRepository::new(
                store.conn(),
            )))
        })
    }

    fn with_store<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&StoreHandle) -> RepoResult<T>,
    ) -> ApiResponse<T> {
        let StoreState::Open(store) = &self.store else {
            warn!("event=api_call module=api status=error op={op} error_code=store_not_open");
            return ApiResponse::failure("store is not open");
        };

        let started_at = Instant::now();
        match catch_unwind(AssertUnwindSafe(|| f(store))) {
            Ok(Ok(value)) => {
                debug!(
                    "event=api_call module=api status=ok op={op} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                ApiResponse::success(value)
            }
            Ok(Err(err)) => {
                warn!(
                    "event=api_call module=api status=error op={op} duration_ms={} error_code={}",
                    started_at.elapsed().as_millis(),
                    error_code(&err)
                );
                ApiResponse::failure(err.to_string())
            }
            Err(_) => {
                error!("event=api_call module=api status=error op={op} error_code=panic");
                ApiResponse::failure(format!("internal error in {op}"))
            }
        }
    }
}

fn error_code(err: &RepoError) -> &'static str {
    match err {
        RepoError::Db(DbError::InvalidCredentials) => "invalid_credentials",
        RepoError::Db(DbError::Io(_)) => "io_error",
        RepoError::Db(_) => "db_error",
        RepoError::ConstraintViolation(_) => "constraint_violation",
        RepoError::Validation(_) => "validation",
        RepoError::InvalidData(_) => "invalid_data",
    }
}

//! Pomodoro use-case service: stamps sessions with the local clock.

use crate::clock::{now, today};
use crate::model::{ManualSession, PomodoroSession, RowId, SessionWithTask};
use crate::repo::{PomodoroRepository, RepoResult};

pub struct PomodoroService<R: PomodoroRepository> {
    repo: R,
}

impl<R: PomodoroRepository> PomodoroService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn start(&self, task_id: RowId) -> RepoResult<PomodoroSession> {
        self.repo.start_session(task_id, now())
    }

    /// `None` when the session does not exist.
    pub fn complete(&self, session_id: RowId) -> RepoResult<Option<PomodoroSession>> {
        self.repo.complete_session(session_id, now())
    }

    /// `false` when nothing was deleted (missing or already completed).
    pub fn cancel(&self, session_id: RowId) -> RepoResult<bool> {
        self.repo.cancel_session(session_id)
    }

    pub fn task_sessions(&self, task_id: RowId) -> RepoResult<Vec<PomodoroSession>> {
        self.repo.sessions_for_task(task_id)
    }

    pub fn today_sessions(&self) -> RepoResult<Vec<SessionWithTask>> {
        self.repo.sessions_on(today())
    }

    pub fn add_manual(&self, session: &ManualSession) -> RepoResult<PomodoroSession> {
        self.repo.add_manual_session(session)
    }
}

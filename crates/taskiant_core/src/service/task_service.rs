//! Task use-case service.
//!
//! # Responsibility
//! - Resolve "today" from the local clock for date-relative operations.
//! - Guard hierarchy edits before they reach persistence.
//!
//! # Invariants
//! - A task is never re-parented under itself or one of its descendants.
//! - Service APIs never bypass repository validation.

use crate::clock::today;
use crate::model::{
    NewTask, RowId, Task, TaskNode, TaskPatch, TaskWithProject, TimeBlockPatch, ValidationError,
};
use crate::repo::{RepoResult, TaskRepository, TaskTreeScope};
use chrono::NaiveDate;
use std::collections::HashSet;

pub struct TaskService<R: TaskRepository> {
    repo: R,
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn get_task(&self, id: RowId) -> RepoResult<Option<Task>> {
        self.repo.get_task(id)
    }

    pub fn create_task(&self, task: &NewTask) -> RepoResult<Task> {
        self.repo.create_task(task)
    }

    /// Applies a partial update.
    ///
    /// # Errors
    /// - `Validation(SelfParent)` / `Validation(ParentCycle)` when the new
    ///   parent is the task itself or lies in its subtree.
    pub fn update_task(&self, id: RowId, patch: &TaskPatch) -> RepoResult<Option<Task>> {
        if let Some(Some(parent_id)) = patch.parent_id {
            if parent_id == id {
                return Err(ValidationError::SelfParent(id).into());
            }
            if self.would_create_cycle(id, parent_id)? {
                return Err(ValidationError::ParentCycle {
                    task_id: id,
                    parent_id,
                }
                .into());
            }
        }
        self.repo.update_task(id, patch)
    }

    pub fn delete_task(&self, id: RowId) -> RepoResult<bool> {
        self.repo.delete_task(id)
    }

    pub fn toggle_task(&self, id: RowId) -> RepoResult<Option<Task>> {
        self.repo.toggle_task(id)
    }

    pub fn move_to_today(&self, id: RowId) -> RepoResult<Option<Task>> {
        self.repo.move_to_date(id, today())
    }

    pub fn copy_to_today(&self, id: RowId) -> RepoResult<Option<Task>> {
        self.repo.copy_to_date(id, today())
    }

    /// Hierarchy of a project, or of unassigned tasks for `None`.
    pub fn project_tasks(&self, project_id: Option<RowId>) -> RepoResult<Vec<TaskNode>> {
        self.repo.list_tree(TaskTreeScope::Project(project_id))
    }

    pub fn tasks_today(&self) -> RepoResult<Vec<TaskNode>> {
        self.tasks_due_on(today())
    }

    pub fn tasks_due_on(&self, date: NaiveDate) -> RepoResult<Vec<TaskNode>> {
        self.repo.list_tree(TaskTreeScope::DueOn(date))
    }

    /// Hierarchy for the time-blocking grid of `date`.
    pub fn tasks_for_time_grid(&self, date: NaiveDate) -> RepoResult<Vec<TaskNode>> {
        self.repo.list_tree(TaskTreeScope::TimeBlock(date))
    }

    pub fn update_time_block(&self, id: RowId, patch: TimeBlockPatch) -> RepoResult<Option<Task>> {
        self.repo.update_task(id, &TaskPatch::from(patch))
    }

    pub fn time_blocked_tasks(&self, date: NaiveDate) -> RepoResult<Vec<TaskWithProject>> {
        self.repo.list_time_blocked(date)
    }

    pub fn active_tasks(&self) -> RepoResult<Vec<TaskWithProject>> {
        self.repo.list_active()
    }

    fn would_create_cycle(&self, task_id: RowId, candidate_parent: RowId) -> RepoResult<bool> {
        let mut visited = HashSet::new();
        let mut cursor = Some(candidate_parent);
        while let Some(current) = cursor {
            if current == task_id || !visited.insert(current) {
                return Ok(true);
            }
            // A missing ancestor ends the walk; the foreign key rejects it.
            cursor = self.repo.parent_of(current)?.flatten();
        }
        Ok(false)
    }
}

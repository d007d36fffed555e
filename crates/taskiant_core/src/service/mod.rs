//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Supply the local clock so repositories stay deterministic.

pub mod pomodoro_service;
pub mod task_service;

pub use pomodoro_service::PomodoroService;
pub use task_service::TaskService;

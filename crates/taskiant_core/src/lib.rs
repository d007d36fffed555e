//! Local encrypted data layer for Taskiant.
//!
//! Key vault, store lifecycle, schema, backups and the task query engine.
//! This crate is the single source of truth for data invariants; callers
//! reach it through an explicit [`StoreHandle`], never ambient state.

pub mod backup;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notification;
pub mod repo;
pub mod service;
pub mod vault;

pub use backup::{BackupEntry, BackupManager};
pub use config::{AppPaths, CoreConfig};
pub use db::{check_exists, open_store, open_store_in_memory, DbError, StoreHandle, StoreSecret};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use notification::{PomodoroNotification, SessionKind};
pub use repo::{RepoError, RepoResult};
pub use service::{PomodoroService, TaskService};
pub use vault::{
    KeyFallbackPolicy, KeyVault, KeyringSecureStorage, SecureStorage, SecureStorageError,
    SymmetricKey, VaultError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

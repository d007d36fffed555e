//! Runtime configuration for the data layer.
//!
//! # Responsibility
//! - Resolve where the store, backups, key file and logs live.
//! - Carry retention and key-fallback policy to the components that use them.
//!
//! # Invariants
//! - `max_backups` is always at least 1.
//! - Fallback key policy is only enabled by an explicit opt-in.

use crate::logging::default_log_level;
use crate::vault::KeyFallbackPolicy;
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "TASKIANT_DATA_DIR";
pub const MAX_BACKUPS_ENV: &str = "TASKIANT_MAX_BACKUPS";
pub const ALLOW_FALLBACK_KEY_ENV: &str = "TASKIANT_ALLOW_FALLBACK_KEY";
pub const LOG_LEVEL_ENV: &str = "TASKIANT_LOG_LEVEL";

pub const STORE_FILE_NAME: &str = "storage.db";
pub const BACKUP_DIR_NAME: &str = "backups";
pub const KEY_FILE_NAME: &str = "db-key.enc";
pub const LOG_DIR_NAME: &str = "logs";
pub const DEFAULT_MAX_BACKUPS: usize = 7;

const DEFAULT_DATA_DIR_NAME: &str = ".taskiant";

/// File-system layout under one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub store_path: PathBuf,
    pub backup_dir: PathBuf,
    pub key_path: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            store_path: data_dir.join(STORE_FILE_NAME),
            backup_dir: data_dir.join(BACKUP_DIR_NAME),
            key_path: data_dir.join(KEY_FILE_NAME),
            log_dir: data_dir.join(LOG_DIR_NAME),
            data_dir,
        }
    }
}

/// Resolved configuration shared by vault, store, backups and the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub paths: AppPaths,
    pub max_backups: usize,
    pub key_fallback: KeyFallbackPolicy,
    pub log_level: String,
}

impl CoreConfig {
    /// Defaults rooted at `data_dir`: 7 backups, fail-hard key policy.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            paths: AppPaths::for_data_dir(data_dir),
            max_backups: DEFAULT_MAX_BACKUPS,
            key_fallback: KeyFallbackPolicy::Fail,
            log_level: default_log_level().to_string(),
        }
    }

    /// Resolves configuration from `TASKIANT_*` environment variables.
    ///
    /// Unset, blank or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let data_dir = value(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let mut config = Self::for_data_dir(data_dir);

        if let Some(max) = value(MAX_BACKUPS_ENV).and_then(|raw| raw.parse::<usize>().ok()) {
            config.max_backups = max.max(1);
        }
        if let Some(flag) = value(ALLOW_FALLBACK_KEY_ENV) {
            if matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes") {
                config.key_fallback = KeyFallbackPolicy::DevelopmentFallback;
            }
        }
        if let Some(level) = value(LOG_LEVEL_ENV) {
            config.log_level = level;
        }
        config
    }

    pub fn store_path(&self) -> &Path {
        &self.paths.store_path
    }
}

fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(DEFAULT_DATA_DIR_NAME),
        _ => std::env::temp_dir().join(DEFAULT_DATA_DIR_NAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn paths_derive_from_data_dir() {
        let paths = AppPaths::for_data_dir("/var/taskiant");
        assert_eq!(paths.store_path, PathBuf::from("/var/taskiant/storage.db"));
        assert_eq!(paths.backup_dir, PathBuf::from("/var/taskiant/backups"));
        assert_eq!(paths.key_path, PathBuf::from("/var/taskiant/db-key.enc"));
        assert_eq!(paths.log_dir, PathBuf::from("/var/taskiant/logs"));
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = CoreConfig::from_lookup(lookup(&[
            (DATA_DIR_ENV, " /srv/tasks "),
            (MAX_BACKUPS_ENV, "3"),
            (ALLOW_FALLBACK_KEY_ENV, "TRUE"),
            (LOG_LEVEL_ENV, "warn"),
        ]));
        assert_eq!(config.paths.data_dir, PathBuf::from("/srv/tasks"));
        assert_eq!(config.max_backups, 3);
        assert_eq!(config.key_fallback, KeyFallbackPolicy::DevelopmentFallback);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[
            (MAX_BACKUPS_ENV, "many"),
            (ALLOW_FALLBACK_KEY_ENV, "nope"),
        ]));
        assert_eq!(config.max_backups, DEFAULT_MAX_BACKUPS);
        assert_eq!(config.key_fallback, KeyFallbackPolicy::Fail);
    }

    #[test]
    fn zero_backups_is_clamped_to_one() {
        let config = CoreConfig::from_lookup(lookup(&[(MAX_BACKUPS_ENV, "0")]));
        assert_eq!(config.max_backups, 1);
    }
}

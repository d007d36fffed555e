//! Encrypted SQLite store bootstrap and schema entry points.
//!
//! # Responsibility
//! - Open SQLCipher-encrypted stores under a password or device key.
//! - Verify credentials before handing out a handle.
//! - Apply the idempotent schema on every open.
//!
//! # Invariants
//! - A `StoreHandle` only exists for a verified, migrated connection.
//! - Failed opens release the connection before returning.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

pub mod migrations;
mod open;

pub use open::{check_exists, open_store, open_store_in_memory, StoreHandle, StoreSecret};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Io(io::Error),
    /// Secret cannot decrypt the store (wrong password, wrong key, or a
    /// corrupted file; SQLCipher cannot tell these apart).
    InvalidCredentials,
    /// A schema step failed; `step` names which one.
    Migration {
        step: &'static str,
        source: rusqlite::Error,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::InvalidCredentials => write!(f, "invalid password or corrupted database"),
            Self::Migration { step, source } => {
                write!(f, "schema step `{step}` failed: {source}")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::InvalidCredentials => None,
            Self::Migration { source, .. } => Some(source),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<io::Error> for DbError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

//! Store open/verify/close lifecycle.
//!
//! `Closed -> Opening -> (Open | Failed)`; `Open -> Closed` via
//! [`StoreHandle::close`]. Only the `Open` state is represented by a value.

use super::migrations::ensure_schema;
use super::{DbError, DbResult};
use crate::vault::SymmetricKey;
use log::{error, info, warn};
use rusqlite::{Connection, ErrorCode};
use std::fmt::{Debug, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const SQLCIPHER_COMPATIBILITY: i64 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Secret used to decrypt the store.
#[derive(Clone)]
pub enum StoreSecret {
    /// User password; SQLCipher derives the page key from it.
    Password(String),
    /// Device key from the key vault, applied as a raw key.
    DeviceKey(SymmetricKey),
}

impl StoreSecret {
    fn pragma_value(&self) -> String {
        match self {
            Self::Password(password) => password.clone(),
            Self::DeviceKey(key) => key.sqlcipher_raw_key(),
        }
    }

    fn mode(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::DeviceKey(_) => "device_key",
        }
    }
}

impl Debug for StoreSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoreSecret::{}(<redacted>)", self.mode())
    }
}

/// An open, verified, migrated store.
///
/// Owns the only connection to its file. Dropping the handle closes the
/// connection; [`StoreHandle::close`] does so while surfacing errors.
pub struct StoreHandle {
    conn: Connection,
    path: Option<PathBuf>,
}

impl StoreHandle {
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Folds the write-ahead log into the main file.
    ///
    /// Holding `&self` means no other operation is mid-write on this handle,
    /// so after this returns the main file is a consistent snapshot.
    pub fn checkpoint(&self) -> DbResult<()> {
        if self.path.is_none() {
            return Ok(());
        }
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE);", [], |_| Ok(()))?;
        Ok(())
    }

    pub fn close(self) -> DbResult<()> {
        let mode = if self.path.is_some() { "file" } else { "memory" };
        self.conn.close().map_err(|(_, err)| {
            error!("event=db_close module=db status=error mode={mode} error={err}");
            DbError::Sqlite(err)
        })?;
        info!("event=db_close module=db status=ok mode={mode}");
        Ok(())
    }
}

impl Debug for StoreHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Whether a store file exists at `path`. Needs no secret.
pub fn check_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
}

/// Opens (or creates) the encrypted store at `path`.
///
/// # Errors
/// - [`DbError::InvalidCredentials`] when `secret` cannot read the catalog.
/// - [`DbError::Io`] when the file or its directory cannot be created/opened.
/// - [`DbError::Migration`] / [`DbError::Sqlite`] for later bootstrap failures.
pub fn open_store(path: impl AsRef<Path>, secret: &StoreSecret) -> DbResult<StoreHandle> {
    let path = path.as_ref();
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=file secret={}",
        secret.mode()
    );

    let result = open_file(path, secret);
    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode=file duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(DbError::InvalidCredentials) => warn!(
            "event=db_open module=db status=error mode=file duration_ms={} error_code=invalid_credentials",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

/// Opens an unencrypted in-memory store with the full schema applied.
pub fn open_store_in_memory() -> DbResult<StoreHandle> {
    let mut conn = Connection::open_in_memory()?;
    configure_connection(&conn, false)?;
    ensure_schema(&mut conn)?;
    info!("event=db_open module=db status=ok mode=memory");
    Ok(StoreHandle { conn, path: None })
}

fn open_file(path: &Path, secret: &StoreSecret) -> DbResult<StoreHandle> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut conn = Connection::open(path).map_err(classify_open_error)?;

    let catalog_entries = match apply_secret_and_verify(&conn, secret) {
        Ok(count) => count,
        Err(err) => {
            // Never leave a half-open handle behind.
            let _ = conn.close();
            return Err(err);
        }
    };

    if let Err(err) = configure_connection(&conn, true).and_then(|()| ensure_schema(&mut conn)) {
        let _ = conn.close();
        return Err(err);
    }

    if catalog_entries == 0 {
        info!("event=db_schema module=db status=ok fresh_store=true");
    }

    Ok(StoreHandle {
        conn,
        path: Some(path.to_path_buf()),
    })
}

fn apply_secret_and_verify(conn: &Connection, secret: &StoreSecret) -> DbResult<i64> {
    conn.pragma_update(None, "key", secret.pragma_value())?;
    conn.pragma_update(None, "cipher_compatibility", SQLCIPHER_COMPATIBILITY)?;
    conn.query_row("SELECT count(*) FROM sqlite_master;", [], |row| row.get(0))
        .map_err(|_| DbError::InvalidCredentials)
}

fn configure_connection(conn: &Connection, file_backed: bool) -> DbResult<()> {
    if file_backed {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            warn!("event=db_pragma module=db status=degraded journal_mode={mode}");
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    }
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

fn classify_open_error(err: rusqlite::Error) -> DbError {
    match err.sqlite_error_code() {
        Some(ErrorCode::CannotOpen) | Some(ErrorCode::PermissionDenied) => {
            DbError::Io(io::Error::new(io::ErrorKind::Other, err.to_string()))
        }
        _ => DbError::Sqlite(err),
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension, params};
use tracing::{debug, warn};

use super::{KvStore, OpenOptions};
use crate::error::{DuskError, Result};

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS blobs (
        key   BLOB PRIMARY KEY,
        value BLOB NOT NULL
    ) WITHOUT ROWID;
";

/// SQLite-backed store with a single `blobs(key, value)` table
///
/// A writable session runs inside one transaction that is committed on
/// close, which keeps bulk indexing fast and makes the session atomic.
pub struct SqliteStore {
    conn: Option<Connection>,
    path: PathBuf,
    in_transaction: bool,
}

impl SqliteStore {
    pub fn open(path: &Path, options: OpenOptions) -> Result<Self> {
        let writable = options.is_writable();

        if writable && options.force && path.exists() {
            debug!(path = %path.display(), "removing existing database");
            fs::remove_file(path).map_err(|e| DuskError::from_io(e, path))?;
        }

        if !path.exists() && !(writable && options.create) {
            return Err(DuskError::NotFound(path.to_path_buf()));
        }

        if writable
            && let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| DuskError::from_io(e, parent))?;
        }

        let flags = if writable {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
        };

        let conn = Connection::open_with_flags(path, flags).map_err(|e| map_error(e, path))?;

        if writable {
            conn.execute_batch(CREATE_SCHEMA)
                .map_err(|e| map_error(e, path))?;
            conn.execute_batch("BEGIN").map_err(|e| map_error(e, path))?;
        } else {
            let has_table: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'blobs'",
                    [],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| map_error(e, path))?;
            if has_table.is_none() {
                return Err(DuskError::Corrupt(format!(
                    "{}: no blobs table",
                    path.display()
                )));
            }
        }

        debug!(path = %path.display(), writable, "sqlite store opened");

        Ok(Self {
            conn: Some(conn),
            path: path.to_path_buf(),
            in_transaction: writable,
        })
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| DuskError::Backend(format!("store {} is closed", self.path.display())))
    }
}

impl KvStore for SqliteStore {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached("INSERT OR REPLACE INTO blobs (key, value) VALUES (?1, ?2)")
            .map_err(|e| map_error(e, &self.path))?;
        stmt.execute(params![key, value])
            .map_err(|e| map_error(e, &self.path))?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached("SELECT value FROM blobs WHERE key = ?1")
            .map_err(|e| map_error(e, &self.path))?;
        stmt.query_row(params![key], |row| row.get::<_, Vec<u8>>(0))
            .optional()
            .map_err(|e| map_error(e, &self.path))
    }

    fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        if self.in_transaction {
            self.in_transaction = false;
            conn.execute_batch("COMMIT")
                .map_err(|e| map_error(e, &self.path))?;
        }

        conn.close().map_err(|(_, e)| map_error(e, &self.path))?;
        debug!(path = %self.path.display(), "sqlite store closed");
        Ok(())
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "failed to close sqlite store");
        }
    }
}

/// Translate SQLite failures into the crate's error kinds
fn map_error(err: rusqlite::Error, path: &Path) -> DuskError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        match failure.code {
            ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt => {
                return DuskError::Corrupt(format!("{}: {}", path.display(), err));
            }
            ErrorCode::CannotOpen => return DuskError::NotFound(path.to_path_buf()),
            ErrorCode::PermissionDenied | ErrorCode::ReadOnly => {
                return DuskError::PermissionDenied(path.to_path_buf());
            }
            _ => {}
        }
    }
    DuskError::Backend(err.to_string())
}

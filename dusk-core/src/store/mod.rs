//! Byte-key / byte-value storage behind the index database
//!
//! Every backend exposes the same small surface ([`KvStore`]); the record
//! store, indexer and query engine never see which one is in use. The
//! backend is picked at run time through [`Backend`].
//!
//! Durability: the file and sqlite backends buffer a read-write session
//! and make it durable on [`KvStore::close`]. Treat "open for write, then
//! close" as the unit of durability.

mod file;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::{DuskError, Result};

/// Reserved key holding the schema version string
pub const VERSION_KEY: &[u8] = b"dusk_db_version";

/// Schema version written to and expected from every database
pub const SCHEMA_VERSION: &str = "1";

/// Minimal persistent map used by the record store
pub trait KvStore {
    /// Store `value` under `key`, replacing any previous value
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Fetch the bytes last stored under `key`
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Flush and release the backend; calling it twice is a no-op
    fn close(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// How a store is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    pub mode: AccessMode,
    /// Create the database if it does not exist (read-write only)
    pub create: bool,
    /// Discard any existing database content (read-write only)
    pub force: bool,
}

impl OpenOptions {
    pub fn read_only() -> Self {
        Self {
            mode: AccessMode::ReadOnly,
            create: false,
            force: false,
        }
    }

    /// Read-write, creating the database when missing
    pub fn read_write() -> Self {
        Self {
            mode: AccessMode::ReadWrite,
            create: true,
            force: false,
        }
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn is_writable(&self) -> bool {
        self.mode == AccessMode::ReadWrite
    }
}

/// Storage engine selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
    /// Single snapshot file, loaded on open and rewritten on close
    #[default]
    File,
    /// SQLite database with one key/value table
    #[cfg(feature = "sqlite")]
    Sqlite,
    /// Process-local map, nothing is persisted
    Memory,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::File => "file",
            #[cfg(feature = "sqlite")]
            Backend::Sqlite => "sqlite",
            Backend::Memory => "memory",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Backend::File),
            #[cfg(feature = "sqlite")]
            "sqlite" => Ok(Backend::Sqlite),
            "memory" => Ok(Backend::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Open a store with `backend` at `path` and validate its schema version
pub fn open_store(backend: Backend, path: &Path, options: OpenOptions) -> Result<Box<dyn KvStore>> {
    debug!(backend = %backend, path = %path.display(), ?options, "opening store");

    let mut store: Box<dyn KvStore> = match backend {
        Backend::File => Box::new(FileStore::open(path, options)?),
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => Box::new(SqliteStore::open(path, options)?),
        Backend::Memory => Box::new(MemoryStore::new()),
    };

    if let Err(e) = check_version(store.as_mut(), options) {
        let _ = store.close();
        return Err(e);
    }

    Ok(store)
}

/// Compare the stored schema version with ours, stamping it on fresh writable stores
pub fn check_version(store: &mut dyn KvStore, options: OpenOptions) -> Result<()> {
    match store.get(VERSION_KEY)? {
        Some(found) if found == SCHEMA_VERSION.as_bytes() => Ok(()),
        Some(found) => Err(DuskError::VersionMismatch {
            expected: SCHEMA_VERSION.to_string(),
            found: String::from_utf8_lossy(&found).into_owned(),
        }),
        None if options.is_writable() => store.put(VERSION_KEY, SCHEMA_VERSION.as_bytes()),
        None => Ok(()),
    }
}

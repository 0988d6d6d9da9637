//! Database location and backend selection

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{DuskError, Result};
use crate::store::Backend;

/// Environment variable naming the default database file
pub const DATABASE_ENV: &str = "DUSK_DATABASE";

/// File name used under the user cache directory
pub const DEFAULT_DB_NAME: &str = "dusk.db";

/// Where the index lives and which engine reads it
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// Explicit database path; falls back to `DUSK_DATABASE`, then the cache dir
    pub path: Option<PathBuf>,

    pub backend: Backend,
}

impl DbConfig {
    pub fn builder() -> DbConfigBuilder {
        DbConfigBuilder::default()
    }

    /// Resolve the database path against the environment and cache directory
    pub fn resolve_path(&self) -> Result<PathBuf> {
        resolve_db_path(
            self.path.as_deref(),
            env::var_os(DATABASE_ENV),
            dirs::cache_dir(),
        )
        .ok_or_else(|| DuskError::NotFound(PathBuf::from(DEFAULT_DB_NAME)))
    }
}

#[derive(Debug, Default)]
pub struct DbConfigBuilder {
    path: Option<PathBuf>,
    backend: Option<Backend>,
}

impl DbConfigBuilder {
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn build(self) -> DbConfig {
        DbConfig {
            path: self.path,
            backend: self.backend.unwrap_or_default(),
        }
    }
}

/// Pick the database path: explicit, then environment, then `<cache>/dusk/dusk.db`
pub fn resolve_db_path(
    explicit: Option<&Path>,
    env_value: Option<OsString>,
    cache_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(value) = env_value
        && !value.is_empty()
    {
        return Some(PathBuf::from(value));
    }
    cache_dir.map(|dir| dir.join("dusk").join(DEFAULT_DB_NAME))
}

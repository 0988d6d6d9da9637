//! Directory record store
//!
//! Maps a directory's [`DevIno`] to its encoded [`DirRecord`] and a root
//! path to its encoded [`IndexReport`], on top of any [`KvStore`].
//!
//! Key layout:
//!
//! ```text
//! "<dev hex>/<ino hex>"   -> DirRecord
//! "/abs/root/path"        -> IndexReport
//! "dusk_index_reports"    -> string(path)*   (registry, insertion order)
//! "dusk_db_version"       -> schema version
//! ```
//!
//! Directory keys never start with '/', and report paths always do, so
//! the two namespaces cannot collide.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::codec::{Decoder, Encoder};
use crate::config::DbConfig;
use crate::error::{DuskError, Result};
use crate::model::{DevIno, DirRecord, IndexReport};
use crate::store::{self, Backend, KvStore, MemoryStore, OpenOptions};

/// Registry of every indexed root path
pub const REPORTS_KEY: &[u8] = b"dusk_index_reports";

/// Key under which the record for `devino` is stored
pub fn devino_key(devino: DevIno) -> Vec<u8> {
    format!("{:x}/{:x}", devino.dev, devino.ino).into_bytes()
}

/// An open index database
pub struct Database {
    store: Box<dyn KvStore>,
    path: Option<PathBuf>,
    writable: bool,
}

impl Database {
    /// Open the database described by `config`
    pub fn open(config: &DbConfig, options: OpenOptions) -> Result<Self> {
        if config.backend == Backend::Memory {
            return Self::in_memory();
        }
        let path = config.resolve_path()?;
        Self::open_path(&path, config.backend, options)
    }

    pub fn open_path(path: &Path, backend: Backend, options: OpenOptions) -> Result<Self> {
        let store = store::open_store(backend, path, options)?;
        info!(path = %path.display(), backend = %backend, writable = options.is_writable(), "database opened");
        Ok(Self {
            store,
            path: Some(path.to_path_buf()),
            writable: options.is_writable(),
        })
    }

    /// Fresh writable database that lives only as long as the value
    pub fn in_memory() -> Result<Self> {
        Self::from_store(Box::new(MemoryStore::new()), OpenOptions::read_write())
    }

    /// Wrap an already opened store, validating its schema version
    pub fn from_store(mut store: Box<dyn KvStore>, options: OpenOptions) -> Result<Self> {
        store::check_version(store.as_mut(), options)?;
        Ok(Self {
            store,
            path: None,
            writable: options.is_writable(),
        })
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn put_dir(&mut self, devino: DevIno, record: &DirRecord) -> Result<()> {
        let bytes = record.to_bytes()?;
        self.store.put(&devino_key(devino), &bytes)
    }

    pub fn get_dir(&self, devino: DevIno) -> Result<Option<DirRecord>> {
        match self.store.get(&devino_key(devino))? {
            Some(bytes) => DirRecord::from_bytes(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Store a report under its root path and register the path
    ///
    /// A path already present in the registry is not added twice; the
    /// report itself is always replaced.
    pub fn write_report(&mut self, report: &IndexReport) -> Result<()> {
        let bytes = report.to_bytes()?;
        let key = report.path.as_bytes();

        if self.store.get(key)?.is_none() {
            let mut registry = self.store.get(REPORTS_KEY)?.unwrap_or_default();
            let mut enc = Encoder::new();
            enc.put_str(&report.path)?;
            registry.extend_from_slice(enc.as_bytes());
            self.store.put(REPORTS_KEY, &registry)?;
            debug!(path = %report.path, "registered new index root");
        }

        self.store.put(key, &bytes)
    }

    pub fn read_report(&self, path: &str) -> Result<Option<IndexReport>> {
        match self.store.get(path.as_bytes())? {
            Some(bytes) => IndexReport::from_bytes(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Registered root paths in the order they were first indexed
    pub fn report_paths(&self) -> Result<Vec<String>> {
        let Some(registry) = self.store.get(REPORTS_KEY)? else {
            return Ok(Vec::new());
        };
        let mut dec = Decoder::new(&registry);
        let mut paths: Vec<String> = Vec::new();
        while !dec.is_empty() {
            let path = dec.get_string()?;
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// The `id`-th registered report
    pub fn get_report(&self, id: usize) -> Result<Option<IndexReport>> {
        match self.report_paths()?.get(id) {
            Some(path) => self.read_report(path),
            None => Ok(None),
        }
    }

    /// Every registered report, in registry order
    pub fn reports(&self) -> Result<Vec<IndexReport>> {
        let mut reports = Vec::new();
        for path in self.report_paths()? {
            match self.read_report(&path)? {
                Some(report) => reports.push(report),
                None => {
                    return Err(DuskError::Corrupt(format!(
                        "registered path {} has no report",
                        path
                    )));
                }
            }
        }
        Ok(reports)
    }

    /// Flush and release the backend
    pub fn close(mut self) -> Result<()> {
        self.store.close()?;
        if let Some(path) = &self.path {
            debug!(path = %path.display(), "database closed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("writable", &self.writable)
            .finish_non_exhaustive()
    }
}

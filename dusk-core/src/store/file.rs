use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{KvStore, OpenOptions};
use crate::error::{DuskError, Result};

/// Magic bytes at the start of every snapshot file
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"DUSK";

/// Container format version, independent of the schema version key
pub const SNAPSHOT_VERSION: u32 = 1;

// magic(4) + version(4) + payload_len(8) + checksum(4)
const MIN_SNAPSHOT_LEN: usize = 20;

/// Snapshot payload as written
#[derive(Serialize)]
struct SnapshotRef<'a> {
    entries: &'a BTreeMap<Vec<u8>, Vec<u8>>,
}

/// Snapshot payload as read back
#[derive(Deserialize)]
struct Snapshot {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// Store kept entirely in memory and persisted as one snapshot file
///
/// File format:
/// [4B] Magic "DUSK"
/// [4B] Version (u32 LE)
/// [8B] Payload length (u64 LE)
/// [NB] Payload (postcard, sorted key/value map)
/// [4B] CRC32 checksum of all preceding bytes
///
/// The snapshot is rewritten atomically (temp file then rename) when a
/// writable store is closed, so a crash mid-session leaves the previous
/// snapshot untouched.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    writable: bool,
    dirty: bool,
    closed: bool,
}

impl FileStore {
    pub fn open(path: &Path, options: OpenOptions) -> Result<Self> {
        let writable = options.is_writable();
        let exists = path.exists();

        let (entries, dirty) = if writable && options.force {
            debug!(path = %path.display(), "discarding existing snapshot");
            (BTreeMap::new(), true)
        } else if exists {
            (load_snapshot(path)?, false)
        } else if writable && options.create {
            (BTreeMap::new(), true)
        } else {
            return Err(DuskError::NotFound(path.to_path_buf()));
        };

        debug!(path = %path.display(), entries = entries.len(), writable, "snapshot opened");

        Ok(Self {
            path: path.to_path_buf(),
            entries,
            writable,
            dirty,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(DuskError::Backend(format!(
                "store {} is closed",
                self.path.display()
            )));
        }
        Ok(())
    }
}

impl KvStore for FileStore {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if !self.writable {
            return Err(DuskError::PermissionDenied(self.path.clone()));
        }
        self.entries.insert(key.to_vec(), value.to_vec());
        self.dirty = true;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.entries.get(key).cloned())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.writable && self.dirty {
            save_snapshot(&self.path, &self.entries)?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "failed to write snapshot on drop");
        }
    }
}

fn save_snapshot(path: &Path, entries: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| DuskError::from_io(e, parent))?;
    }

    let payload = postcard::to_allocvec(&SnapshotRef { entries })
        .map_err(|e| DuskError::Backend(format!("Failed to serialize snapshot: {}", e)))?;

    let mut data = Vec::with_capacity(payload.len() + MIN_SNAPSHOT_LEN);
    data.extend_from_slice(&SNAPSHOT_MAGIC);
    data.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    data.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    data.extend_from_slice(&payload);

    let checksum = crc32fast::hash(&data);
    data.extend_from_slice(&checksum.to_le_bytes());

    let temp_path = temp_path_for(path);
    let mut file = File::create(&temp_path).map_err(|e| DuskError::from_io(e, &temp_path))?;
    file.write_all(&data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;

    debug!(path = %path.display(), bytes = data.len(), entries = entries.len(), "snapshot written");
    Ok(())
}

/// Sibling path for the in-progress snapshot, `index.dusk` -> `index.dusk.tmp`
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn load_snapshot(path: &Path) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DuskError::NotFound(path.to_path_buf()),
        _ => DuskError::from_io(e, path),
    })?;

    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    if data.len() < MIN_SNAPSHOT_LEN {
        return Err(DuskError::Corrupt(format!(
            "{}: snapshot too small ({} bytes)",
            path.display(),
            data.len()
        )));
    }

    let checksum_offset = data.len() - 4;
    let stored_checksum = read_u32(&data[checksum_offset..]);
    let computed_checksum = crc32fast::hash(&data[..checksum_offset]);
    if stored_checksum != computed_checksum {
        return Err(DuskError::Corrupt(format!(
            "{}: snapshot checksum mismatch",
            path.display()
        )));
    }

    if data[..4] != SNAPSHOT_MAGIC {
        return Err(DuskError::Corrupt(format!(
            "{}: not a dusk snapshot",
            path.display()
        )));
    }

    let version = read_u32(&data[4..8]);
    if version != SNAPSHOT_VERSION {
        return Err(DuskError::VersionMismatch {
            expected: SNAPSHOT_VERSION.to_string(),
            found: version.to_string(),
        });
    }

    let payload_len = read_u64(&data[8..16]);
    let payload_end = 16u64.saturating_add(payload_len);
    if payload_end != checksum_offset as u64 {
        return Err(DuskError::Corrupt(format!(
            "{}: invalid payload length {}",
            path.display(),
            payload_len
        )));
    }

    let snapshot: Snapshot = postcard::from_bytes(&data[16..checksum_offset]).map_err(|e| {
        DuskError::Corrupt(format!("{}: failed to decode snapshot: {}", path.display(), e))
    })?;
    Ok(snapshot.entries)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

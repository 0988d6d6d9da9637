use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DuskError, Result};

/// Mount tables tried in order
const MOUNT_TABLES: [&str; 2] = ["/proc/self/mounts", "/etc/mtab"];

/// Mount point to filesystem type, as listed by the system mount table
#[derive(Debug, Default, Clone)]
pub struct MountTable {
    types: HashMap<PathBuf, String>,
}

impl MountTable {
    pub fn load() -> Result<Self> {
        let mut errors = Vec::new();
        for source in MOUNT_TABLES {
            match fs::read_to_string(source) {
                Ok(contents) => {
                    let table = Self::parse(&contents);
                    debug!(source, mounts = table.len(), "mount table loaded");
                    return Ok(table);
                }
                Err(e) => errors.push(format!("{}: {}", source, e)),
            }
        }
        Err(DuskError::MountTable(errors.join(", ")))
    }

    /// Parse `fstab`-style lines: device, mount point, type, ...
    ///
    /// A later line for the same mount point shadows earlier ones.
    pub fn parse(contents: &str) -> Self {
        let mut types = HashMap::new();
        for line in contents.lines() {
            let mut fields = line.split_whitespace();
            let (Some(_device), Some(mount_point), Some(fstype)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            types.insert(PathBuf::from(unescape(mount_point)), fstype.to_string());
        }
        Self { types }
    }

    /// Filesystem type mounted exactly at `mount_point`
    pub fn fstype(&self, mount_point: &Path) -> Option<&str> {
        self.types.get(mount_point).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Undo the octal escapes (`\040` for space) the kernel writes in mount paths
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && let Some(digits) = field.get(i + 1..i + 4)
            && digits.bytes().all(|b| (b'0'..=b'7').contains(&b))
            && let Ok(value) = u8::from_str_radix(digits, 8)
        {
            out.push(value);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Include/exclude lists of filesystem types
#[derive(Debug, Default, Clone)]
pub struct FsTypeFilter {
    include: HashSet<String>,
    exclude: HashSet<String>,
}

impl FsTypeFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        Self {
            include: include.iter().cloned().collect(),
            exclude: exclude.iter().cloned().collect(),
        }
    }

    /// False when both lists are empty and every type is allowed
    pub fn is_active(&self) -> bool {
        !self.include.is_empty() || !self.exclude.is_empty()
    }

    pub fn allows(&self, fstype: &str) -> bool {
        if self.exclude.contains(fstype) {
            return false;
        }
        self.include.is_empty() || self.include.contains(fstype)
    }
}

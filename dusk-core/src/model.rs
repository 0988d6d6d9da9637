use std::fs::{FileType as FsFileType, Metadata};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[cfg(unix)]
use std::os::unix::fs::{FileTypeExt, MetadataExt};

use crate::size::Size;

/// Device id and inode number identifying one filesystem object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DevIno {
    pub dev: u64,
    pub ino: u64,
}

impl DevIno {
    /// Parent link stored for an index root
    pub const NONE: DevIno = DevIno { dev: 0, ino: 0 };

    pub fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }

    /// Non-unix platforms have no inode numbers, every object collapses to 0/0
    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &Metadata) -> Self {
        Self::NONE
    }

    pub fn is_none(&self) -> bool {
        self.dev == 0 && self.ino == 0
    }
}

/// Type of filesystem entry; discriminants are the on-disk type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FileType {
    Block = 0,
    Char = 1,
    Directory = 2,
    Fifo = 3,
    Symlink = 4,
    Regular = 5,
    Socket = 6,
    Unknown = 7,
}

impl FileType {
    pub fn from_tag(tag: u64) -> Option<Self> {
        Some(match tag {
            0 => FileType::Block,
            1 => FileType::Char,
            2 => FileType::Directory,
            3 => FileType::Fifo,
            4 => FileType::Symlink,
            5 => FileType::Regular,
            6 => FileType::Socket,
            7 => FileType::Unknown,
            _ => return None,
        })
    }

    pub fn tag(self) -> u64 {
        self as u64
    }

    pub fn from_fs(file_type: FsFileType) -> Self {
        if file_type.is_dir() {
            return FileType::Directory;
        }
        if file_type.is_symlink() {
            return FileType::Symlink;
        }
        if file_type.is_file() {
            return FileType::Regular;
        }
        #[cfg(unix)]
        {
            if file_type.is_block_device() {
                return FileType::Block;
            }
            if file_type.is_char_device() {
                return FileType::Char;
            }
            if file_type.is_fifo() {
                return FileType::Fifo;
            }
            if file_type.is_socket() {
                return FileType::Socket;
            }
        }
        FileType::Unknown
    }

    /// One-letter marker in the style of `ls -F`
    pub fn indicator(&self) -> char {
        match self {
            FileType::Block => 'b',
            FileType::Char => 'c',
            FileType::Directory => '/',
            FileType::Fifo => '|',
            FileType::Symlink => '@',
            FileType::Regular => ' ',
            FileType::Socket => '=',
            FileType::Unknown => '?',
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// One child of a directory, as recorded at index time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub file_type: FileType,
    pub size: Size,
    /// Only meaningful for directories
    pub devino: DevIno,
}

impl DirEntry {
    pub fn file(name: impl Into<String>, file_type: FileType, size: Size) -> Self {
        Self {
            name: name.into(),
            file_type,
            size,
            devino: DevIno::NONE,
        }
    }

    pub fn directory(name: impl Into<String>, size: Size, devino: DevIno) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::Directory,
            size,
            devino,
        }
    }
}

/// Persisted listing of one directory, keyed by its own DevIno
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirRecord {
    pub parent: DevIno,
    /// Directory mtime in seconds since the epoch, 0 if unknown
    pub mtime: u64,
    pub entries: Vec<DirEntry>,
}

impl DirRecord {
    pub fn new(parent: DevIno, mtime: u64) -> Self {
        Self {
            parent,
            mtime,
            entries: Vec::new(),
        }
    }

    /// Parent link, `None` at an index root
    pub fn parent(&self) -> Option<DevIno> {
        if self.parent.dev != 0 && self.parent.ino != 0 {
            Some(self.parent)
        } else {
            None
        }
    }

    /// Sum of the sizes of all listed entries
    pub fn total_size(&self) -> Size {
        let mut total = Size::ZERO;
        for entry in &self.entries {
            total += &entry.size;
        }
        total
    }
}

/// Wall clock time with microsecond resolution, as stored in reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub secs: u64,
    pub micros: u64,
}

impl Timestamp {
    pub fn now() -> Self {
        SystemTime::now().into()
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later
    pub fn since(&self, earlier: Timestamp) -> Duration {
        let to_micros = |t: &Timestamp| t.secs.saturating_mul(1_000_000).saturating_add(t.micros);
        Duration::from_micros(to_micros(self).saturating_sub(to_micros(&earlier)))
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            secs: since_epoch.as_secs(),
            micros: since_epoch.subsec_micros() as u64,
        }
    }
}

/// Summary of one top-level index run over one path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Canonical indexed path, also the report's storage key
    pub path: String,
    /// Identity of the indexed root directory
    pub devino: DevIno,
    pub time_start: Timestamp,
    pub time_stop: Timestamp,
    pub file_count: u64,
    pub dir_count: u64,
    /// Total size of everything below the root
    pub size: Size,
}

impl IndexReport {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            time_start: Timestamp::now(),
            ..Default::default()
        }
    }

    pub fn duration(&self) -> Duration {
        self.time_stop.since(self.time_start)
    }
}

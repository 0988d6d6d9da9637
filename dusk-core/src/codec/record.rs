//! Composite record layouts
//!
//! ```text
//! DevIno      = varint(dev) varint(ino)
//! Size        = varint(apparent) varint(actual) varint(count)
//! DirEntry    = string(name) Size varint(type) [DevIno if type == dir]
//! DirRecord   = DevIno(parent) varint(mtime) DirEntry*
//! IndexReport = string(path) DevIno varint(start s) varint(start us)
//!               varint(stop s) varint(stop us) varint(files) varint(dirs) Size
//! ```

use super::buffer::{Decoder, Encoder};
use crate::error::{DuskError, Result};
use crate::model::{DevIno, DirEntry, DirRecord, FileType, IndexReport, Timestamp};
use crate::size::Size;

impl Encoder {
    pub fn put_devino(&mut self, devino: &DevIno) {
        self.put_varint(devino.dev);
        self.put_varint(devino.ino);
    }

    pub fn put_size(&mut self, size: &Size) {
        self.put_varint(size.apparent);
        self.put_varint(size.actual);
        self.put_varint(size.count);
    }

    fn put_timestamp(&mut self, ts: &Timestamp) {
        self.put_varint(ts.secs);
        self.put_varint(ts.micros);
    }

    pub fn put_dirent(&mut self, entry: &DirEntry) -> Result<()> {
        self.put_str(&entry.name)?;
        self.put_size(&entry.size);
        self.put_varint(entry.file_type.tag());
        if entry.file_type.is_directory() {
            self.put_devino(&entry.devino);
        }
        Ok(())
    }
}

impl Decoder<'_> {
    pub fn get_devino(&mut self) -> Result<DevIno> {
        let dev = self.get_varint()?;
        let ino = self.get_varint()?;
        Ok(DevIno { dev, ino })
    }

    pub fn get_size(&mut self) -> Result<Size> {
        let apparent = self.get_varint()?;
        let actual = self.get_varint()?;
        let count = self.get_varint()?;
        Ok(Size {
            apparent,
            actual,
            count,
        })
    }

    fn get_timestamp(&mut self) -> Result<Timestamp> {
        let secs = self.get_varint()?;
        let micros = self.get_varint()?;
        Ok(Timestamp { secs, micros })
    }

    pub fn get_dirent(&mut self) -> Result<DirEntry> {
        let name = self.get_string()?;
        let size = self.get_size()?;
        let tag = self.get_varint()?;
        let file_type = FileType::from_tag(tag)
            .ok_or_else(|| DuskError::Corrupt(format!("unknown file type tag {}", tag)))?;
        let devino = if file_type.is_directory() {
            self.get_devino()?
        } else {
            DevIno::NONE
        };
        Ok(DirEntry {
            name,
            file_type,
            size,
            devino,
        })
    }
}

impl DirRecord {
    /// Serialize the record; fails only if an entry name is over 255 bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::with_capacity(16 + self.entries.len() * 24);
        enc.put_devino(&self.parent);
        enc.put_varint(self.mtime);
        for entry in &self.entries {
            enc.put_dirent(entry)?;
        }
        Ok(enc.into_bytes())
    }

    /// Parse a stored record; entries run until the value is exhausted
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(bytes);
        let parent = dec.get_devino()?;
        let mtime = dec.get_varint()?;
        let mut entries = Vec::new();
        while !dec.is_empty() {
            entries.push(dec.get_dirent()?);
        }
        Ok(Self {
            parent,
            mtime,
            entries,
        })
    }
}

impl IndexReport {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::with_capacity(self.path.len() + 48);
        enc.put_str(&self.path)?;
        enc.put_devino(&self.devino);
        enc.put_timestamp(&self.time_start);
        enc.put_timestamp(&self.time_stop);
        enc.put_varint(self.file_count);
        enc.put_varint(self.dir_count);
        enc.put_size(&self.size);
        Ok(enc.into_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(bytes);
        Ok(Self {
            path: dec.get_string()?,
            devino: dec.get_devino()?,
            time_start: dec.get_timestamp()?,
            time_stop: dec.get_timestamp()?,
            file_count: dec.get_varint()?,
            dir_count: dec.get_varint()?,
            size: dec.get_size()?,
        })
    }
}

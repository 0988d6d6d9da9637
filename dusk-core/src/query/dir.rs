use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::db::Database;
use crate::error::{DuskError, Result};
use crate::model::{DevIno, DirEntry, DirRecord};
use crate::path::{self, canonicalize_path, path_key};
use crate::size::{Size, SizeType};

/// Listing order for [`DirHandle::read`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Largest first
    #[default]
    Size,
    /// Byte-wise ascending name
    Name,
}

/// Cursor over one stored directory listing
#[derive(Debug, Clone)]
pub struct DirHandle {
    devino: DevIno,
    path: String,
    record: DirRecord,
    size: Size,
    cursor: usize,
    sorted_by: Option<(SizeType, SortBy)>,
}

impl DirHandle {
    fn new(devino: DevIno, path: String, record: DirRecord, size: Size) -> Self {
        Self {
            devino,
            path,
            record,
            size,
            cursor: 0,
            sorted_by: None,
        }
    }

    /// Absolute path this handle was resolved to
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn devino(&self) -> DevIno {
        self.devino
    }

    /// Aggregate size of the directory as recorded by its parent
    ///
    /// At an index root this is the report total. It can exceed the sum of
    /// `entries()` when files were left out of a depth-limited listing.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Number of listed entries
    pub fn count(&self) -> usize {
        self.record.entries.len()
    }

    /// Parent directory, `None` at an index root
    pub fn parent(&self) -> Option<DevIno> {
        self.record.parent()
    }

    pub fn mtime(&self) -> u64 {
        self.record.mtime
    }

    /// Entries in their current order
    pub fn entries(&self) -> &[DirEntry] {
        &self.record.entries
    }

    /// Current cursor position
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Look up a child by exact name
    pub fn find(&self, name: &str) -> Option<&DirEntry> {
        self.record.entries.iter().find(|e| e.name == name)
    }

    /// Return the entry at the cursor and advance it
    ///
    /// The listing is re-sorted only when `size_type` or `sort` differ from
    /// the previous call; the cursor position is kept across re-sorts.
    pub fn read(&mut self, size_type: SizeType, sort: SortBy) -> Option<&DirEntry> {
        self.sort(size_type, sort);
        let entry = self.record.entries.get(self.cursor)?;
        self.cursor += 1;
        Some(entry)
    }

    /// Sort the whole listing and return it, leaving the cursor untouched
    pub fn sorted(&mut self, size_type: SizeType, sort: SortBy) -> &[DirEntry] {
        self.sort(size_type, sort);
        &self.record.entries
    }

    /// Move the cursor; `offset == count()` is the end position
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        let count = self.count();
        if offset > count {
            return Err(DuskError::SeekOutOfRange { offset, count });
        }
        self.cursor = offset;
        Ok(())
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Release the handle
    pub fn close(self) {}

    fn sort(&mut self, size_type: SizeType, sort: SortBy) {
        if self.sorted_by == Some((size_type, sort)) {
            return;
        }
        match sort {
            SortBy::Size => self
                .record
                .entries
                .sort_by(|a, b| compare_by_size(a, b, size_type)),
            SortBy::Name => self.record.entries.sort_by(|a, b| a.name.cmp(&b.name)),
        }
        self.sorted_by = Some((size_type, sort));
    }
}

/// Descending primary size, then descending secondary size, then ascending name
fn compare_by_size(a: &DirEntry, b: &DirEntry, size_type: SizeType) -> Ordering {
    b.size
        .get(size_type)
        .cmp(&a.size.get(size_type))
        .then_with(|| b.size.secondary(size_type).cmp(&a.size.secondary(size_type)))
        .then_with(|| a.name.cmp(&b.name))
}

impl Database {
    /// Resolve an absolute or relative path to a stored directory
    ///
    /// The longest prefix of the canonical path that has an index report
    /// gives the starting directory; the remaining components are followed
    /// through the stored listings.
    pub fn open_dir(&self, path: impl AsRef<Path>) -> Result<DirHandle> {
        let canonical = canonicalize_path(path.as_ref())?;
        let key = path_key(&canonical);

        let mut start = None;
        for prefix in path::prefixes(&key) {
            if let Some(report) = self.read_report(prefix)? {
                debug!(path = %key, root = %prefix, "resolved index root");
                start = Some((prefix.len(), report.devino, report.size));
                break;
            }
        }
        let Some((prefix_len, mut devino, mut size)) = start else {
            return Err(DuskError::PathNotFound(canonical));
        };

        let mut record = self.load_dir(devino, &canonical)?;
        for component in key[prefix_len..].split('/').filter(|c| !c.is_empty()) {
            let child = record
                .entries
                .iter()
                .find(|e| e.name == component && e.file_type.is_directory())
                .ok_or_else(|| DuskError::PathNotFound(canonical.clone()))?;
            devino = child.devino;
            size = child.size;
            record = self.load_dir(devino, &canonical)?;
        }

        Ok(DirHandle::new(devino, key, record, size))
    }

    /// Open the parent (`".."`) or a named child directory of `dir`
    ///
    /// Returns `None` for `".."` at an index root and for a name that is not
    /// a directory in the listing.
    pub fn open_dir_at(&self, dir: &DirHandle, name: &str) -> Result<Option<DirHandle>> {
        if name == ".." {
            let Some(parent) = dir.parent() else {
                return Ok(None);
            };
            let path = path::dirname(&dir.path).to_string();
            let record = self.load_dir(parent, Path::new(&path))?;
            let size = self.recorded_size(parent, &record, &path)?;
            return Ok(Some(DirHandle::new(parent, path, record, size)));
        }

        match dir.find(name) {
            Some(entry) if entry.file_type.is_directory() => self.open_dir_entry(dir, entry).map(Some),
            _ => Ok(None),
        }
    }

    /// Descend into a directory entry read from `dir`
    pub fn open_dir_entry(&self, dir: &DirHandle, entry: &DirEntry) -> Result<DirHandle> {
        let path = path::join(&dir.path, &entry.name);
        if !entry.file_type.is_directory() {
            return Err(DuskError::NotADirectory(PathBuf::from(path)));
        }
        let record = self.load_dir(entry.devino, Path::new(&path))?;
        Ok(DirHandle::new(entry.devino, path, record, entry.size))
    }

    /// Size of `devino` from its parent's entry, or its report at an index root
    fn recorded_size(&self, devino: DevIno, record: &DirRecord, path: &str) -> Result<Size> {
        match record.parent() {
            Some(parent) => {
                if let Some(parent_record) = self.get_dir(parent)?
                    && let Some(entry) = parent_record
                        .entries
                        .iter()
                        .find(|e| e.file_type.is_directory() && e.devino == devino)
                {
                    return Ok(entry.size);
                }
            }
            None => {
                if let Some(report) = self.read_report(path)?
                    && report.devino == devino
                {
                    return Ok(report.size);
                }
            }
        }
        Ok(record.total_size())
    }

    fn load_dir(&self, devino: DevIno, path: &Path) -> Result<DirRecord> {
        self.get_dir(devino)?
            .ok_or_else(|| DuskError::PathNotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileType, IndexReport};

    fn handle(entries: Vec<DirEntry>) -> DirHandle {
        let mut record = DirRecord::new(DevIno::NONE, 0);
        record.entries = entries;
        let size = record.total_size();
        DirHandle::new(DevIno::new(1, 1), "/t".to_string(), record, size)
    }

    fn names(handle: &mut DirHandle, size_type: SizeType, sort: SortBy) -> Vec<String> {
        handle.rewind();
        let mut out = Vec::new();
        while let Some(entry) = handle.read(size_type, sort) {
            out.push(entry.name.clone());
        }
        out
    }

    fn file(name: &str, apparent: u64, actual: u64) -> DirEntry {
        DirEntry::file(name, FileType::Regular, Size::new(apparent, actual, 1))
    }

    #[test]
    fn test_size_sort_ties_broken_by_name() {
        let mut h = handle(vec![
            file("b", 10, 4096),
            file("c", 30, 4096),
            file("a", 10, 4096),
            file("d", 20, 4096),
        ]);
        assert_eq!(names(&mut h, SizeType::Apparent, SortBy::Size), ["c", "d", "a", "b"]);
        // same order on repeat
        assert_eq!(names(&mut h, SizeType::Apparent, SortBy::Size), ["c", "d", "a", "b"]);
    }

    #[test]
    fn test_secondary_key_before_name() {
        let mut h = handle(vec![file("a", 1, 512), file("b", 2, 4096), file("c", 3, 4096)]);
        // actual ties between b and c, broken by apparent
        assert_eq!(names(&mut h, SizeType::Actual, SortBy::Size), ["c", "b", "a"]);
        assert_eq!(names(&mut h, SizeType::Apparent, SortBy::Size), ["c", "b", "a"]);
    }

    #[test]
    fn test_name_sort_and_resort() {
        let mut h = handle(vec![file("b", 1, 0), file("a", 5, 0), file("c", 3, 0)]);
        assert_eq!(names(&mut h, SizeType::Apparent, SortBy::Name), ["a", "b", "c"]);
        assert_eq!(names(&mut h, SizeType::Apparent, SortBy::Size), ["a", "c", "b"]);
    }

    #[test]
    fn test_seek_and_rewind() {
        let mut h = handle(vec![file("a", 3, 0), file("b", 2, 0), file("c", 1, 0)]);
        h.seek(2).unwrap();
        assert_eq!(h.read(SizeType::Apparent, SortBy::Size).unwrap().name, "c");
        assert!(h.read(SizeType::Apparent, SortBy::Size).is_none());

        h.seek(3).unwrap();
        assert!(h.read(SizeType::Apparent, SortBy::Size).is_none());
        assert!(matches!(
            h.seek(4),
            Err(DuskError::SeekOutOfRange { offset: 4, count: 3 })
        ));

        h.rewind();
        assert_eq!(h.position(), 0);
        assert_eq!(h.read(SizeType::Apparent, SortBy::Size).unwrap().name, "a");
    }

    #[test]
    fn test_accessors() {
        let h = handle(vec![file("a", 3, 512), file("b", 2, 1024)]);
        assert_eq!(h.count(), 2);
        assert_eq!(h.size(), Size::new(5, 1536, 2));
        assert_eq!(h.path(), "/t");
        assert!(h.parent().is_none());
        assert!(h.find("b").is_some());
        h.close();
    }

    /// "/a" indexed, containing b/c/d directories
    fn indexed_db() -> Database {
        let mut db = Database::in_memory().unwrap();
        let (a, b, c, d) = (
            DevIno::new(9, 1),
            DevIno::new(9, 2),
            DevIno::new(9, 3),
            DevIno::new(9, 4),
        );
        let dir = |name: &str, devino| DirEntry::directory(name, Size::new(0, 0, 1), devino);

        let mut ra = DirRecord::new(DevIno::NONE, 0);
        ra.entries = vec![dir("b", b), file("notes", 1, 1)];
        let mut rb = DirRecord::new(a, 0);
        rb.entries = vec![dir("c", c)];
        let mut rc = DirRecord::new(b, 0);
        rc.entries = vec![dir("d", d)];
        let rd = DirRecord::new(c, 0);

        db.put_dir(a, &ra).unwrap();
        db.put_dir(b, &rb).unwrap();
        db.put_dir(c, &rc).unwrap();
        db.put_dir(d, &rd).unwrap();

        let mut report = IndexReport::new("/a");
        report.devino = a;
        db.write_report(&report).unwrap();
        db
    }

    #[test]
    fn test_open_dir_follows_components() {
        let db = indexed_db();
        let h = db.open_dir("/a/b/c/d").unwrap();
        assert_eq!(h.path(), "/a/b/c/d");
        assert_eq!(h.devino(), DevIno::new(9, 4));

        let root = db.open_dir("/a//b/../").unwrap();
        assert_eq!(root.path(), "/a");
    }

    #[test]
    fn test_open_dir_missing_component() {
        let db = indexed_db();
        assert!(matches!(db.open_dir("/a/b/x"), Err(DuskError::PathNotFound(_))));
        assert!(matches!(db.open_dir("/a/notes"), Err(DuskError::PathNotFound(_))));
        assert!(matches!(db.open_dir("/elsewhere"), Err(DuskError::PathNotFound(_))));
    }

    #[test]
    fn test_navigation() {
        let db = indexed_db();
        let c = db.open_dir("/a/b/c").unwrap();

        let b = db.open_dir_at(&c, "..").unwrap().unwrap();
        assert_eq!(b.path(), "/a/b");
        let a = db.open_dir_at(&b, "..").unwrap().unwrap();
        assert_eq!(a.path(), "/a");
        assert!(db.open_dir_at(&a, "..").unwrap().is_none());

        let b_again = db.open_dir_at(&a, "b").unwrap().unwrap();
        assert_eq!(b_again.devino(), b.devino());
        assert!(db.open_dir_at(&a, "notes").unwrap().is_none());
        assert!(db.open_dir_at(&a, "zzz").unwrap().is_none());

        let entry = c.find("d").unwrap().clone();
        let d = db.open_dir_entry(&c, &entry).unwrap();
        assert_eq!(d.path(), "/a/b/c/d");

        let notes = a.find("notes").unwrap().clone();
        assert!(matches!(
            db.open_dir_entry(&a, &notes),
            Err(DuskError::NotADirectory(_))
        ));
    }

    /// "/r" with a subdirectory whose listing was truncated at index time
    fn truncated_db() -> Database {
        let mut db = Database::in_memory().unwrap();
        let (r, s) = (DevIno::new(3, 1), DevIno::new(3, 2));

        let sub_size = Size::new(75, 12288, 3);
        let mut rr = DirRecord::new(DevIno::NONE, 0);
        rr.entries = vec![
            DirEntry::directory("s", sub_size, s),
            file("top", 10, 4096),
        ];
        db.put_dir(r, &rr).unwrap();
        db.put_dir(s, &DirRecord::new(r, 0)).unwrap();

        let mut report = IndexReport::new("/r");
        report.devino = r;
        report.size = Size::new(85, 16384, 4);
        db.write_report(&report).unwrap();
        db
    }

    #[test]
    fn test_size_comes_from_recorded_aggregate() {
        let db = truncated_db();

        let root = db.open_dir("/r").unwrap();
        assert_eq!(root.size(), Size::new(85, 16384, 4));

        let entry = root.find("s").unwrap().clone();
        let by_entry = db.open_dir_entry(&root, &entry).unwrap();
        assert_eq!(by_entry.count(), 0);
        assert_eq!(by_entry.size(), entry.size);

        let by_path = db.open_dir("/r/s").unwrap();
        assert_eq!(by_path.size(), entry.size);

        let by_name = db.open_dir_at(&root, "s").unwrap().unwrap();
        assert_eq!(by_name.size(), entry.size);

        let back = db.open_dir_at(&by_path, "..").unwrap().unwrap();
        assert_eq!(back.size(), root.size());
    }

    #[test]
    fn test_parent_size_from_grandparent_entry() {
        let db = indexed_db();
        let c = db.open_dir("/a/b/c").unwrap();
        let b = db.open_dir_at(&c, "..").unwrap().unwrap();
        let a = db.open_dir("/a").unwrap();
        assert_eq!(b.size(), a.find("b").unwrap().size);
    }
}

use std::collections::HashSet;
use std::fs::{self, Metadata, ReadDir};
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use glob::Pattern;
use tracing::{debug, info, warn};

use super::fstype::{FsTypeFilter, MountTable};
use super::options::IndexOptions;
use super::progress::{ProgressFn, ProgressThrottle};
use crate::codec::MAX_STRING_LEN;
use crate::db::Database;
use crate::error::{DuskError, Result};
use crate::model::{DevIno, DirEntry, DirRecord, FileType, IndexReport, Timestamp};
use crate::path::{canonicalize_path, path_key};
use crate::size::Size;

/// Name stored for files when names are hidden
pub const HIDDEN_FILE_NAME: &str = "<FILE>";

/// Per-run traversal state, threaded through the recursion
struct Run {
    root_dev: u64,
    seen: HashSet<DevIno>,
    /// Directories on the current recursion path
    active: HashSet<DevIno>,
    report: IndexReport,
    throttle: ProgressThrottle,
}

impl Run {
    fn new(root: DevIno, report: IndexReport, throttle: ProgressThrottle) -> Self {
        Self {
            root_dev: root.dev,
            seen: HashSet::new(),
            active: HashSet::from([root]),
            report,
            throttle,
        }
    }

    /// Mark a directory as being walked; false if it already is
    fn enter(&mut self, devino: DevIno) -> bool {
        self.active.insert(devino)
    }

    fn leave(&mut self, devino: DevIno) {
        self.active.remove(&devino);
    }
}

/// Directory currently being walked
struct Frame<'p> {
    path: &'p Path,
    devino: DevIno,
    parent: DevIno,
    mtime: u64,
    depth: usize,
}

/// Walks directory trees and writes their listings to a database
pub struct Indexer<'a> {
    db: &'a mut Database,
    options: IndexOptions,
    excludes: Vec<Pattern>,
    fs_filter: FsTypeFilter,
    mounts: MountTable,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> Indexer<'a> {
    pub fn new(db: &'a mut Database, options: IndexOptions) -> Result<Self> {
        let excludes = options
            .exclude
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| DuskError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let fs_filter = FsTypeFilter::new(&options.fs_include, &options.fs_exclude);
        let mounts = if fs_filter.is_active() {
            MountTable::load()?
        } else {
            MountTable::default()
        };

        Ok(Self {
            db,
            options,
            excludes,
            fs_filter,
            mounts,
            progress: None,
        })
    }

    /// Receive the live report every `progress_interval` and once at the end
    pub fn with_progress(mut self, callback: impl FnMut(&IndexReport) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Index one root directory and store its report
    pub fn index(&mut self, path: impl AsRef<Path>) -> Result<IndexReport> {
        let root = canonicalize_path(path.as_ref())?;
        let key = path_key(&root);
        if key.len() > MAX_STRING_LEN {
            return Err(DuskError::StringTooLong(key.len()));
        }

        let metadata = fs::metadata(&root).map_err(|e| DuskError::from_io(e, &root))?;
        if !metadata.is_dir() {
            return Err(DuskError::NotADirectory(root));
        }
        let read_dir = fs::read_dir(&root).map_err(|e| DuskError::from_io(e, &root))?;

        let devino = DevIno::from_metadata(&metadata);
        let mut report = IndexReport::new(key);
        report.devino = devino;

        let throttle = ProgressThrottle::new(self.options.progress_interval);
        let mut run = Run::new(devino, report, throttle);

        info!(path = %root.display(), dry_run = self.options.dry_run, "indexing");

        let frame = Frame {
            path: &root,
            devino,
            parent: DevIno::NONE,
            mtime: mtime_secs(&metadata),
            depth: 0,
        };
        let total = self.walk_dir(&mut run, &frame, Some(read_dir))?;

        let mut report = run.report;
        report.size = total;
        report.time_stop = Timestamp::now();

        if let Some(progress) = self.progress.as_mut() {
            progress(&report);
        }

        if self.options.dry_run {
            debug!(path = %report.path, "dry run, report not stored");
        } else {
            self.db.write_report(&report)?;
        }

        info!(
            path = %report.path,
            files = report.file_count,
            dirs = report.dir_count,
            bytes = report.size.actual,
            "index complete"
        );
        Ok(report)
    }

    /// Index several roots; a failing root does not stop the others
    pub fn index_all<I, P>(&mut self, paths: I) -> Vec<Result<IndexReport>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .map(|path| {
                let result = self.index(path.as_ref());
                if let Err(e) = &result {
                    warn!(path = %path.as_ref().display(), error = %e, "failed to index");
                }
                result
            })
            .collect()
    }

    /// Post-order walk of one directory; returns the total size of its contents
    fn walk_dir(&mut self, run: &mut Run, frame: &Frame<'_>, read_dir: Option<ReadDir>) -> Result<Size> {
        let mut record = DirRecord::new(frame.parent, frame.mtime);
        let mut total = Size::ZERO;
        let list_files = self
            .options
            .max_depth
            .is_none_or(|max| max == 0 || frame.depth < max);

        for item in read_dir.into_iter().flatten() {
            let dirent = match item {
                Ok(dirent) => dirent,
                Err(e) => {
                    warn!(path = %frame.path.display(), error = %e, "failed to read directory entry");
                    continue;
                }
            };

            let file_name = dirent.file_name();
            let name = file_name.to_string_lossy();
            let child_path = dirent.path();

            if self.is_excluded(&name) {
                debug!(path = %child_path.display(), "excluded");
                continue;
            }
            if name.len() > MAX_STRING_LEN {
                warn!(path = %child_path.display(), len = name.len(), "name too long to store, skipping");
                continue;
            }

            let metadata = match fs::symlink_metadata(&child_path) {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %child_path.display(), error = %e, "failed to stat");
                    continue;
                }
            };

            let devino = DevIno::from_metadata(&metadata);
            if devino.dev != frame.devino.dev && !self.fstype_allowed(&child_path) {
                continue;
            }

            if let Some(uid) = self.options.uid
                && owner_uid(&metadata).is_some_and(|owner| owner != uid)
            {
                debug!(path = %child_path.display(), "not owned by uid {}", uid);
                continue;
            }

            let file_type = FileType::from_fs(metadata.file_type());
            let own = Size::new(metadata.len(), get_disk_usage(&metadata), 1);

            if file_type.is_directory() {
                if !stays_on_filesystem(self.options.one_file_system, run.root_dev, devino.dev) {
                    info!(path = %child_path.display(), "not crossing filesystem boundary");
                    continue;
                }
                if !run.enter(devino) {
                    warn!(path = %child_path.display(), "directory is its own ancestor, skipping");
                    continue;
                }

                let child_read = match fs::read_dir(&child_path) {
                    Ok(rd) => Some(rd),
                    Err(e) => {
                        warn!(path = %child_path.display(), error = %e, "failed to open directory");
                        None
                    }
                };
                let child = Frame {
                    path: &child_path,
                    devino,
                    parent: frame.devino,
                    mtime: mtime_secs(&metadata),
                    depth: frame.depth + 1,
                };

                let walked = self.walk_dir(run, &child, child_read);
                run.leave(devino);

                let mut size = Size::new(0, own.actual, 1);
                size += walked?;

                run.report.dir_count += 1;
                total += size;
                record
                    .entries
                    .push(DirEntry::directory(name.into_owned(), size, devino));
            } else {
                if self.options.check_hard_links
                    && link_count(&metadata) > 1
                    && !run.seen.insert(devino)
                {
                    debug!(path = %child_path.display(), "hard link already counted");
                    continue;
                }

                run.report.file_count += 1;
                run.report.size += own;
                total += own;

                if list_files {
                    let name = if self.options.hide_file_names {
                        HIDDEN_FILE_NAME.to_string()
                    } else {
                        name.into_owned()
                    };
                    record.entries.push(DirEntry::file(name, file_type, own));
                }
            }
        }

        if !self.options.dry_run {
            self.db.put_dir(frame.devino, &record)?;
        }

        if run.throttle.dir_done()
            && let Some(progress) = self.progress.as_mut()
        {
            progress(&run.report);
        }

        Ok(total)
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.excludes.iter().any(|pattern| pattern.matches(name))
    }

    /// Check the filesystem type of an entry on another device than its parent
    fn fstype_allowed(&self, path: &Path) -> bool {
        if !self.fs_filter.is_active() {
            return true;
        }
        let real = match fs::canonicalize(path) {
            Ok(real) => real,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot resolve mount point, skipping");
                return false;
            }
        };
        let Some(fstype) = self.mounts.fstype(&real) else {
            warn!(path = %path.display(), "unable to determine filesystem type, skipping");
            return false;
        };
        if !self.fs_filter.allows(fstype) {
            info!(path = %path.display(), fstype, "filesystem type filtered out");
            return false;
        }
        true
    }
}

/// Whether an entry on `dev` may be walked when the run started on `root_dev`
fn stays_on_filesystem(one_file_system: bool, root_dev: u64, dev: u64) -> bool {
    !one_file_system || dev == root_dev
}

/// Get actual disk usage for a file (accounts for sparse files and block size)
#[cfg(unix)]
fn get_disk_usage(metadata: &Metadata) -> u64 {
    // st_blocks is in 512-byte units
    metadata.blocks() * 512
}

#[cfg(not(unix))]
fn get_disk_usage(metadata: &Metadata) -> u64 {
    metadata.len()
}

#[cfg(unix)]
fn link_count(metadata: &Metadata) -> u64 {
    metadata.nlink()
}

#[cfg(not(unix))]
fn link_count(_metadata: &Metadata) -> u64 {
    1
}

#[cfg(unix)]
fn owner_uid(metadata: &Metadata) -> Option<u32> {
    Some(metadata.uid())
}

#[cfg(not(unix))]
fn owner_uid(_metadata: &Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
fn mtime_secs(metadata: &Metadata) -> u64 {
    metadata.mtime().max(0) as u64
}

#[cfg(not(unix))]
fn mtime_secs(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .map(|t| Timestamp::from(t).secs)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// root/
    ///   a.txt      100 bytes
    ///   skip.tmp     7 bytes
    ///   sub/
    ///     b.txt     50 bytes
    ///     c.txt     25 bytes
    fn sample_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), vec![0u8; 100]).unwrap();
        fs::write(temp.path().join("skip.tmp"), vec![0u8; 7]).unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/b.txt"), vec![0u8; 50]).unwrap();
        fs::write(temp.path().join("sub/c.txt"), vec![0u8; 25]).unwrap();
        temp
    }

    fn run_index(db: &mut Database, root: &Path, options: IndexOptions) -> IndexReport {
        Indexer::new(db, options).unwrap().index(root).unwrap()
    }

    fn find<'r>(record: &'r DirRecord, name: &str) -> &'r DirEntry {
        record
            .entries
            .iter()
            .find(|e| e.name == name)
            .unwrap_or_else(|| panic!("no entry named {name}"))
    }

    #[test]
    fn test_sizes_are_additive() {
        let temp = sample_tree();
        let mut db = Database::in_memory().unwrap();
        let report = run_index(&mut db, temp.path(), IndexOptions::default());

        assert_eq!(report.file_count, 4);
        assert_eq!(report.dir_count, 1);
        assert_eq!(report.size.apparent, 182);

        let root = db.get_dir(report.devino).unwrap().unwrap();
        assert_eq!(root.parent(), None);
        assert_eq!(root.entries.len(), 3);
        assert_eq!(root.total_size(), report.size);

        let sub_entry = find(&root, "sub");
        assert_eq!(sub_entry.file_type, FileType::Directory);
        assert_eq!(sub_entry.size.apparent, 75);
        assert_eq!(sub_entry.size.count, 3);

        let sub = db.get_dir(sub_entry.devino).unwrap().unwrap();
        assert_eq!(sub.parent, report.devino);
        assert_eq!(sub.total_size().apparent, sub_entry.size.apparent);
        assert_eq!(sub.total_size().count + 1, sub_entry.size.count);
    }

    #[test]
    fn test_report_is_stored_under_canonical_path() {
        let temp = sample_tree();
        let mut db = Database::in_memory().unwrap();
        let dotted = temp.path().join("sub").join("..");
        let report = run_index(&mut db, &dotted, IndexOptions::default());

        let expected = canonicalize_path(temp.path()).unwrap();
        assert_eq!(report.path, path_key(&expected));
        assert_eq!(db.read_report(&report.path).unwrap(), Some(report.clone()));
        assert_eq!(db.report_paths().unwrap().len(), 1);
    }

    #[test]
    fn test_exclude_patterns() {
        let temp = sample_tree();
        let mut db = Database::in_memory().unwrap();
        let report = run_index(&mut db, temp.path(), IndexOptions::default().exclude("*.tmp"));

        assert_eq!(report.file_count, 3);
        assert_eq!(report.size.apparent, 175);
        let root = db.get_dir(report.devino).unwrap().unwrap();
        assert!(root.entries.iter().all(|e| e.name != "skip.tmp"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut db = Database::in_memory().unwrap();
        let err = Indexer::new(&mut db, IndexOptions::default().exclude("[")).err().unwrap();
        assert!(matches!(err, DuskError::InvalidPattern { .. }));
    }

    #[test]
    fn test_max_depth_truncates_listings_not_sizes() {
        let temp = sample_tree();
        let mut db = Database::in_memory().unwrap();
        let report = run_index(&mut db, temp.path(), IndexOptions::default().max_depth(1));

        assert_eq!(report.file_count, 4);
        let root = db.get_dir(report.devino).unwrap().unwrap();
        assert_eq!(root.entries.len(), 3);

        let sub_entry = find(&root, "sub");
        assert_eq!(sub_entry.size.apparent, 75);
        let sub = db.get_dir(sub_entry.devino).unwrap().unwrap();
        assert!(sub.entries.is_empty());
    }

    #[test]
    fn test_hide_file_names() {
        let temp = sample_tree();
        let mut db = Database::in_memory().unwrap();
        let report = run_index(&mut db, temp.path(), IndexOptions::default().hide_file_names(true));

        let root = db.get_dir(report.devino).unwrap().unwrap();
        let hidden = root.entries.iter().filter(|e| e.name == HIDDEN_FILE_NAME).count();
        assert_eq!(hidden, 2);
        assert_eq!(find(&root, "sub").file_type, FileType::Directory);
    }

    #[cfg(unix)]
    #[test]
    fn test_hard_links_counted_once_when_checked() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("x"), vec![1u8; 4096]).unwrap();
        fs::hard_link(temp.path().join("x"), temp.path().join("y")).unwrap();

        let mut db = Database::in_memory().unwrap();
        let deduped = run_index(&mut db, temp.path(), IndexOptions::default().check_hard_links(true));
        assert_eq!(deduped.file_count, 1);
        assert_eq!(deduped.size.apparent, 4096);

        let counted = run_index(&mut db, temp.path(), IndexOptions::default());
        assert_eq!(counted.file_count, 2);
        assert_eq!(counted.size.apparent, 8192);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp = sample_tree();
        let mut db = Database::in_memory().unwrap();
        let report = run_index(&mut db, temp.path(), IndexOptions::default().dry_run(true));

        assert_eq!(report.file_count, 4);
        assert!(db.read_report(&report.path).unwrap().is_none());
        assert!(db.get_dir(report.devino).unwrap().is_none());
    }

    #[test]
    fn test_root_errors() {
        let temp = sample_tree();
        let mut db = Database::in_memory().unwrap();
        let mut indexer = Indexer::new(&mut db, IndexOptions::default()).unwrap();

        let missing = indexer.index(temp.path().join("missing")).unwrap_err();
        assert!(matches!(missing, DuskError::PathNotFound(_)));

        let file = indexer.index(temp.path().join("a.txt")).unwrap_err();
        assert!(matches!(file, DuskError::NotADirectory(_)));
    }

    #[test]
    fn test_index_all_continues_after_failure() {
        let temp = sample_tree();
        let mut db = Database::in_memory().unwrap();
        let mut indexer = Indexer::new(&mut db, IndexOptions::default()).unwrap();

        let results = indexer.index_all([temp.path().join("missing"), temp.path().join("sub")]);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert_eq!(results[1].as_ref().unwrap().file_count, 2);
    }

    #[test]
    fn test_progress_fires_at_completion() {
        let temp = sample_tree();
        let mut db = Database::in_memory().unwrap();
        let mut seen = Vec::new();
        {
            let mut indexer = Indexer::new(&mut db, IndexOptions::default())
                .unwrap()
                .with_progress(|report| seen.push(report.file_count));
            indexer.index(temp.path()).unwrap();
        }
        assert_eq!(seen.last(), Some(&4));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let temp = sample_tree();
        std::os::unix::fs::symlink(temp.path().join("sub"), temp.path().join("link")).unwrap();

        let mut db = Database::in_memory().unwrap();
        let report = run_index(&mut db, temp.path(), IndexOptions::default());
        assert_eq!(report.dir_count, 1);

        let root = db.get_dir(report.devino).unwrap().unwrap();
        assert_eq!(find(&root, "link").file_type, FileType::Symlink);
    }

    #[test]
    fn test_max_depth_zero_means_unlimited() {
        let temp = sample_tree();
        let mut db = Database::in_memory().unwrap();
        let report = run_index(&mut db, temp.path(), IndexOptions::default().max_depth(0));

        let root = db.get_dir(report.devino).unwrap().unwrap();
        assert_eq!(root.entries.len(), 3);
        assert_eq!(root.total_size(), report.size);
        let sub = db.get_dir(find(&root, "sub").devino).unwrap().unwrap();
        assert_eq!(sub.entries.len(), 2);
    }

    #[test]
    fn test_stays_on_filesystem() {
        assert!(stays_on_filesystem(false, 1, 1));
        assert!(stays_on_filesystem(false, 1, 2));
        assert!(stays_on_filesystem(true, 1, 1));
        assert!(!stays_on_filesystem(true, 1, 2));
    }

    #[test]
    fn test_one_file_system_walks_single_device_tree() {
        let temp = sample_tree();
        let mut db = Database::in_memory().unwrap();
        let report = run_index(&mut db, temp.path(), IndexOptions::default().one_file_system(true));
        assert_eq!(report.file_count, 4);
        assert_eq!(report.dir_count, 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_fs_type_filter_leaves_same_device_entries_alone() {
        let temp = sample_tree();
        let mut db = Database::in_memory().unwrap();
        let options = IndexOptions::default().fs_exclude("ext4,xfs,btrfs,tmpfs,overlay");
        let report = run_index(&mut db, temp.path(), options);
        assert_eq!(report.file_count, 4);
        assert_eq!(report.dir_count, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_uid_filter() {
        let temp = sample_tree();
        let owner = fs::metadata(temp.path()).unwrap().uid();
        let mut db = Database::in_memory().unwrap();

        let mine = run_index(&mut db, temp.path(), IndexOptions::default().uid(owner));
        assert_eq!(mine.file_count, 4);

        let nobody = owner.wrapping_add(12345);
        let report = run_index(&mut db, temp.path(), IndexOptions::default().uid(nobody));
        assert_eq!(report.file_count, 0);
        assert_eq!(report.dir_count, 0);
        assert_eq!(report.size, Size::ZERO);
        let root = db.get_dir(report.devino).unwrap().unwrap();
        assert!(root.entries.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp = sample_tree();
        let locked = temp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden"), vec![0u8; 999]).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // root ignores permissions
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let mut db = Database::in_memory().unwrap();
        let result = Indexer::new(&mut db, IndexOptions::default()).unwrap().index(temp.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let report = result.unwrap();
        assert_eq!(report.file_count, 4);
        assert_eq!(report.dir_count, 2);

        let root = db.get_dir(report.devino).unwrap().unwrap();
        let entry = find(&root, "locked");
        assert_eq!(entry.file_type, FileType::Directory);
        assert_eq!(entry.size.apparent, 0);
        assert_eq!(entry.size.count, 1);
        let listing = db.get_dir(entry.devino).unwrap().unwrap();
        assert!(listing.entries.is_empty());
    }

    #[test]
    fn test_directory_on_recursion_path_is_not_reentered() {
        let root = DevIno::new(1, 2);
        let child = DevIno::new(1, 3);
        let mut run = Run::new(
            root,
            IndexReport::new("/r"),
            ProgressThrottle::new(std::time::Duration::from_millis(100)),
        );

        assert!(!run.enter(root));
        assert!(run.enter(child));
        assert!(!run.enter(child));
        run.leave(child);
        // finished directories may be entered again
        assert!(run.enter(child));
    }
}

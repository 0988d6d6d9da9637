use std::time::Duration;

/// Indexer configuration
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Depth below which plain files are left out of listings
    ///
    /// `None` and `Some(0)` both mean unlimited. Directories are still
    /// descended and counted; only the per-file entries of deep directories
    /// are dropped to save space.
    pub max_depth: Option<usize>,
    /// Glob patterns matched against entry names; matches are skipped
    pub exclude: Vec<String>,
    /// Stay on the filesystem of the root (don't cross mount points)
    pub one_file_system: bool,
    /// Only cross into mounts of these filesystem types (empty = any)
    pub fs_include: Vec<String>,
    /// Never cross into mounts of these filesystem types
    pub fs_exclude: Vec<String>,
    /// Store "<FILE>" instead of real file names
    pub hide_file_names: bool,
    /// Count a file with several hard links only once
    pub check_hard_links: bool,
    /// Walk and report but write nothing to the database
    pub dry_run: bool,
    /// Only index entries owned by this user id
    pub uid: Option<u32>,
    /// Minimum time between two progress callbacks
    pub progress_interval: Duration,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            exclude: Vec::new(),
            one_file_system: false,
            fs_include: Vec::new(),
            fs_exclude: Vec::new(),
            hide_file_names: false,
            check_hard_links: false,
            dry_run: false,
            uid: None,
            progress_interval: Duration::from_millis(100),
        }
    }
}

impl IndexOptions {
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn one_file_system(mut self, yes: bool) -> Self {
        self.one_file_system = yes;
        self
    }

    /// Add comma separated filesystem types to the include list
    pub fn fs_include(mut self, types: &str) -> Self {
        self.fs_include.extend(split_types(types));
        self
    }

    /// Add comma separated filesystem types to the exclude list
    pub fn fs_exclude(mut self, types: &str) -> Self {
        self.fs_exclude.extend(split_types(types));
        self
    }

    pub fn hide_file_names(mut self, yes: bool) -> Self {
        self.hide_file_names = yes;
        self
    }

    pub fn check_hard_links(mut self, yes: bool) -> Self {
        self.check_hard_links = yes;
        self
    }

    pub fn dry_run(mut self, yes: bool) -> Self {
        self.dry_run = yes;
        self
    }

    pub fn uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }
}

fn split_types(types: &str) -> impl Iterator<Item = String> + '_ {
    types
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

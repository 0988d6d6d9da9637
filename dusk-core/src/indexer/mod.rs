//! Recursive filesystem indexer
//!
//! Walks a tree depth-first, post-order: each directory's listing is
//! written once all of its children are accounted for, keyed by the
//! directory's own device/inode pair. The walk runs on the caller's
//! thread from start to finish.

mod fstype;
mod options;
mod progress;
mod walker;

pub use fstype::{FsTypeFilter, MountTable};
pub use options::IndexOptions;
pub use progress::ProgressFn;
pub use walker::{HIDDEN_FILE_NAME, Indexer};

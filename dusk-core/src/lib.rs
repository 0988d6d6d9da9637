pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod indexer;
pub mod model;
pub mod path;
pub mod query;
pub mod size;
pub mod store;

pub use config::{DATABASE_ENV, DbConfig, resolve_db_path};
pub use db::Database;
pub use error::{DuskError, Result};
pub use indexer::{IndexOptions, Indexer};
pub use model::{DevIno, DirEntry, DirRecord, FileType, IndexReport, Timestamp};
pub use query::{DirHandle, Histogram, HistogramBin, SortBy};
pub use size::{Size, SizeType, format_count, format_duration, format_size, size_percentage};
pub use store::{Backend, KvStore, OpenOptions};

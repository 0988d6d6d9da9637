//! Read side of the index: path resolution, directory handles, histograms

mod dir;
mod histogram;

pub use dir::{DirHandle, SortBy};
pub use histogram::{Histogram, HistogramBin};

//! Lexical path handling shared by the indexer and the query engine
//!
//! Paths are made absolute against the working directory and normalized
//! without touching the filesystem: repeated separators and `.` segments
//! are dropped and `..` removes the previous segment. Symlinks are never
//! resolved, so `/a/link/..` is `/a`.

use std::env;
use std::path::{Component, Path, PathBuf};

use crate::error::Result;

/// Absolute, normalized form of `path`
pub fn canonicalize_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };
    Ok(normalize(&absolute))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // popping at the root is a no-op, "/.." stays "/"
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

/// Canonical path as the string used for report keys
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Candidate report keys for `path`, longest first, ending with "/"
///
/// `"/a/b/c"` yields `"/a/b/c"`, `"/a/b"`, `"/a"`, `"/"`.
pub fn prefixes(path: &str) -> impl Iterator<Item = &str> {
    let mut end = if path.is_empty() { None } else { Some(path.len()) };
    std::iter::from_fn(move || {
        let current = end?;
        let candidate = &path[..current];
        end = match candidate.rfind('/') {
            Some(0) if current > 1 => Some(1),
            Some(0) | None => None,
            Some(i) => Some(i),
        };
        Some(candidate)
    })
}

/// Path of the directory containing `path`; "/" is its own parent
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// Append one name to a directory path without doubling separators
pub fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

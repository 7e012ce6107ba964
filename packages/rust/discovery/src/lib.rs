//! Artifact discovery across the toolchain's directory layouts.
//!
//! Two traversal policies cover every caller: a recursive walk that accepts
//! files at any depth (dictionary files, manual documents) and a
//! single-level listing (test fixtures, link groups). Sorting is by file
//! name within each directory, applied before descending, so discovery
//! order is stable across runs and platforms.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

/// Traversal policy for [`scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Order entries by file name within each directory.
    pub sorted: bool,
}

impl ScanOptions {
    /// Full recursive walk, sorted.
    pub const RECURSIVE: Self = Self {
        recursive: true,
        sorted: true,
    };

    /// One directory, no descent, sorted.
    pub const FLAT: Self = Self {
        recursive: false,
        sorted: true,
    };
}

/// Find every file below `root` whose extension is `extension` (no dot).
///
/// A missing root yields an empty list. Entries that cannot be read are
/// logged and skipped.
#[instrument(skip_all, fields(root = %root.display(), extension = %extension, recursive = opts.recursive))]
pub fn scan(root: &Path, extension: &str, opts: ScanOptions) -> Vec<PathBuf> {
    let files: Vec<PathBuf> = walk(root, opts)
        .filter(|path| path.is_file() && has_extension(path, extension))
        .collect();

    debug!(count = files.len(), "scan complete");
    files
}

/// List the immediate subdirectories of `root`, sorted by name.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn scan_dirs(root: &Path) -> Vec<PathBuf> {
    let dirs: Vec<PathBuf> = walk(root, ScanOptions::FLAT)
        .filter(|path| path.is_dir())
        .collect();

    debug!(count = dirs.len(), "directory scan complete");
    dirs
}

/// Whether `path` ends in `.<extension>`.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}

fn walk(root: &Path, opts: ScanOptions) -> impl Iterator<Item = PathBuf> {
    let missing_root = !root.exists();
    if missing_root {
        debug!(root = %root.display(), "scan root does not exist");
    }

    let mut walker = WalkDir::new(root).min_depth(1);
    if !opts.recursive {
        walker = walker.max_depth(1);
    }
    if opts.sorted {
        walker = walker.sort_by_file_name();
    }

    walker.into_iter().filter_map(move |entry| match entry {
        Ok(entry) => Some(entry.into_path()),
        Err(e) => {
            if !missing_root {
                warn!(error = %e, "skipping unreadable entry");
            }
            None
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

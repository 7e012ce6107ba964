//! Output tree helpers: directory reset, recursive copy, tree digest.

use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use docbuild_shared::{DocBuildError, Result};

/// Remove `dir` if present and recreate it empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(DocBuildError::io(dir, e)),
    }
    std::fs::create_dir_all(dir).map_err(|e| DocBuildError::io(dir, e))
}

/// Copy the tree under `from` into `to`, creating directories as needed.
///
/// Returns the number of files copied.
pub fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| DocBuildError::io(from, e.into()))?;
        let Ok(rel) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| DocBuildError::io(&target, e))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| DocBuildError::io(&target, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// SHA-256 over every file below `root`: relative path and contents, in
/// sorted order. Equal digests mean byte-identical trees.
pub fn digest_tree(root: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| DocBuildError::io(root, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let contents =
            std::fs::read(entry.path()).map_err(|e| DocBuildError::io(entry.path(), e))?;

        let rel: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        hasher.update(rel.join("/").as_bytes());
        hasher.update([0]);
        hasher.update((contents.len() as u64).to_le_bytes());
        hasher.update(&contents);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

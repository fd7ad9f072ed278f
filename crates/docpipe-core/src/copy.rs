//! Pattern-based file tree copying.
//!
//! Only files are copied; directories are created on demand for the files
//! that land in them, so an empty source directory never shows up in the
//! destination.

use crate::{Error, Result};
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Compile include patterns; `*` does not cross `/`.
pub(crate) fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob: Glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| Error::configuration(format!("invalid pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::configuration(format!("invalid pattern set: {e}")))
}

/// Files under `root` whose relative path matches `set`, sorted.
pub(crate) fn matching_files(root: &Path, set: &GlobSet) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(root, &e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        if set.is_match(rel) {
            files.push(rel.to_path_buf());
        }
    }
    Ok(files)
}

fn walk_error(root: &Path, e: &walkdir::Error) -> Error {
    let path = e
        .path()
        .map_or_else(|| root.to_path_buf(), Path::to_path_buf);
    Error::io(std::io::Error::other(e.to_string()), path, "walk")
}

pub(crate) fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
    }
    fs::copy(from, to).map_err(|e| Error::io(e, from, "copy"))?;
    Ok(())
}

/// Copy files under `src` matching any of `includes` into `dst`, keeping relative paths.
///
/// Returns the number of files copied.
pub(crate) fn copy_matching(src: &Path, dst: &Path, includes: &[String]) -> Result<usize> {
    let set = build_globset(includes)?;
    let files = matching_files(src, &set)?;
    for rel in &files {
        copy_file(&src.join(rel), &dst.join(rel))?;
    }
    tracing::debug!(
        from = %src.display(),
        to = %dst.display(),
        files = files.len(),
        "Copied matching files"
    );
    Ok(files.len())
}

/// Copy every file under `src` into `dst`.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    copy_matching(src, dst, &["**".to_string()])
}

/// Remove a directory tree if it exists.
pub(crate) fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(e, dir, "remove_dir_all")),
    }
}

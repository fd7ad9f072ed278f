//! Writing captured command output to disk.

use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of materializing bytes to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    /// File that was written
    pub path: PathBuf,
    /// Number of bytes written
    pub bytes_written: usize,
}

/// Write `bytes` to `path`, creating parent directories and replacing any existing file.
///
/// # Errors
///
/// Returns an I/O error if the parent chain cannot be created or the file
/// cannot be written.
pub fn materialize(bytes: &[u8], path: &Path) -> Result<WriteResult> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
    }
    fs::write(path, bytes).map_err(|e| Error::io(e, path, "write"))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Materialized output");
    Ok(WriteResult {
        path: path.to_path_buf(),
        bytes_written: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_parent_chain() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("a/b/c/options.txt");
        let result = materialize(b"--help", &target).unwrap();
        assert_eq!(result.bytes_written, 6);
        assert_eq!(result.path, target);
        assert_eq!(fs::read(&target).unwrap(), b"--help");
    }

    #[test]
    fn overwrites_existing_content() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("table.adoc");
        materialize(b"a much longer first version", &target).unwrap();
        materialize(b"short", &target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "short");
    }

    #[test]
    fn empty_output_creates_empty_file() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("empty.txt");
        let result = materialize(b"", &target).unwrap();
        assert_eq!(result.bytes_written, 0);
        assert!(target.is_file());
    }

    #[test]
    fn unwritable_destination_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = materialize(b"y", &blocker.join("child.txt")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}

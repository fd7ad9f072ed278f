//! Fingerprint computation over declared task inputs

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const ABSENT: &str = "<absent>";

/// A single declared input of a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintInput {
    /// A file whose content is hashed
    File(PathBuf),
    /// A directory whose listing and file contents are hashed
    Directory(PathBuf),
    /// A named scalar value (version string, URL map, flag)
    Value {
        /// Name of the value
        name: String,
        /// Rendered value
        value: String,
    },
}

impl FingerprintInput {
    /// Convenience constructor for a scalar value
    pub fn value(name: impl Into<String>, value: impl ToString) -> Self {
        Self::Value {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// Canonical form of everything that went into a fingerprint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct FingerprintEnvelope {
    task: String,
    inputs: BTreeMap<String, String>,
    docpipe_version: String,
}

/// Digest over a task's declared inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Hex-encoded SHA-256 of the canonical envelope
    pub digest: String,
    /// Per-input summary (`file:`, `dir:` and `value:` keys)
    pub inputs_summary: BTreeMap<String, String>,
}

/// Stream a file through SHA-256, returning the hex digest and byte count
pub fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let _span = tracing::trace_span!("sha256_file", path = %path.display()).entered();
    let mut file = fs::File::open(path).map_err(|e| Error::io(e, path, "open"))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1024 * 64];
    let mut total: u64 = 0;
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::io(e, path, "read"))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((hex::encode(hasher.finalize()), total))
}

fn summarize_directory(dir: &Path, summary: &mut BTreeMap<String, String>) -> Result<()> {
    let key_prefix = format!("dir:{}", dir.display());
    if !dir.is_dir() {
        summary.insert(key_prefix, ABSENT.to_string());
        return Ok(());
    }
    let mut entries = 0usize;
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
            Error::io(std::io::Error::other(e.to_string()), path, "walk")
        })?;
        let Ok(rel) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let rel = rel.to_string_lossy().replace('\\', "/");
        let key = format!("{key_prefix}/{rel}");
        if entry.file_type().is_dir() {
            summary.insert(key, "dir".to_string());
        } else {
            let (hash, _) = sha256_file(entry.path())?;
            summary.insert(key, hash);
        }
        entries += 1;
    }
    summary.insert(key_prefix, format!("entries={entries}"));
    Ok(())
}

/// Compute the fingerprint of a task from its declared inputs.
///
/// The result does not depend on the order in which inputs are declared.
pub fn compute_fingerprint(task: &str, inputs: &[FingerprintInput]) -> Result<Fingerprint> {
    let span = tracing::debug_span!("fingerprint", task, input_count = inputs.len());
    let _guard = span.enter();

    let mut summary = BTreeMap::new();
    for input in inputs {
        match input {
            FingerprintInput::File(path) => {
                let key = format!("file:{}", path.display());
                let value = if path.is_file() {
                    sha256_file(path)?.0
                } else {
                    ABSENT.to_string()
                };
                summary.insert(key, value);
            }
            FingerprintInput::Directory(dir) => summarize_directory(dir, &mut summary)?,
            FingerprintInput::Value { name, value } => {
                summary.insert(format!("value:{name}"), value.clone());
            }
        }
    }

    let envelope = FingerprintEnvelope {
        task: task.to_string(),
        inputs: summary,
        docpipe_version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let bytes = serde_json::to_vec(&envelope)
        .map_err(|e| Error::serialization(format!("Failed to encode fingerprint: {e}")))?;
    let digest = hex::encode(Sha256::digest(bytes));
    tracing::debug!(%digest, "Computed fingerprint");

    Ok(Fingerprint {
        digest,
        inputs_summary: envelope.inputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn sha256_file_matches_known_digest() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        write(&file, "abc");
        let (hash, size) = sha256_file(&file).unwrap();
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(size, 3);
    }

    #[test]
    fn fingerprint_is_stable_and_order_invariant() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("style.css");
        write(&file, "body {}");
        let a = vec![
            FingerprintInput::File(file.clone()),
            FingerprintInput::value("version", "1.2.0"),
        ];
        let b = vec![
            FingerprintInput::value("version", "1.2.0"),
            FingerprintInput::File(file),
        ];
        assert_eq!(
            compute_fingerprint("t", &a).unwrap(),
            compute_fingerprint("t", &b).unwrap()
        );
    }

    #[test]
    fn fingerprint_changes_with_file_content() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("overview.html");
        write(&file, "one");
        let inputs = vec![FingerprintInput::File(file.clone())];
        let before = compute_fingerprint("t", &inputs).unwrap();
        write(&file, "two");
        let after = compute_fingerprint("t", &inputs).unwrap();
        assert_ne!(before.digest, after.digest);
    }

    #[test]
    fn fingerprint_changes_when_directory_gains_a_file() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("src");
        write(&dir.join("a/One.java"), "class One {}");
        let inputs = vec![FingerprintInput::Directory(dir.clone())];
        let before = compute_fingerprint("t", &inputs).unwrap();
        write(&dir.join("a/Two.java"), "class Two {}");
        let after = compute_fingerprint("t", &inputs).unwrap();
        assert_ne!(before.digest, after.digest);
    }

    #[test]
    fn fingerprint_changes_with_value() {
        let a = compute_fingerprint("t", &[FingerprintInput::value("url", "https://a/")]).unwrap();
        let b = compute_fingerprint("t", &[FingerprintInput::value("url", "https://b/")]).unwrap();
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn fingerprint_differs_between_tasks() {
        let a = compute_fingerprint("render-html", &[]).unwrap();
        let b = compute_fingerprint("render-pdf", &[]).unwrap();
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn missing_inputs_are_recorded_as_absent() {
        let tmp = TempDir::new().unwrap();
        let missing_file = tmp.path().join("nope.txt");
        let missing_dir = tmp.path().join("nowhere");
        let fp = compute_fingerprint(
            "t",
            &[
                FingerprintInput::File(missing_file.clone()),
                FingerprintInput::Directory(missing_dir.clone()),
            ],
        )
        .unwrap();
        assert_eq!(
            fp.inputs_summary[&format!("file:{}", missing_file.display())],
            ABSENT
        );
        assert_eq!(
            fp.inputs_summary[&format!("dir:{}", missing_dir.display())],
            ABSENT
        );

        write(&missing_file, "now here");
        let after = compute_fingerprint(
            "t",
            &[
                FingerprintInput::File(missing_file),
                FingerprintInput::Directory(missing_dir),
            ],
        )
        .unwrap();
        assert_ne!(fp.digest, after.digest);
    }
}

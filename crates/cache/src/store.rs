//! Persisted fingerprints of each task's last successful run

use crate::{Error, Fingerprint, Result};
use chrono::{DateTime, Utc};
use dirs::{cache_dir, home_dir};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Record of a task's last successful run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FingerprintRecord {
    /// Name of the task
    pub task_name: String,
    /// Fingerprint digest of the declared inputs
    pub fingerprint: String,
    /// Per-input summary, kept for `--explain`-style debugging
    pub inputs_summary: BTreeMap<String, String>,
    /// Declared outputs at the time of the run
    pub outputs: Vec<String>,
    /// When the run finished
    pub created_at: DateTime<Utc>,
    /// Execution duration in milliseconds
    pub duration_ms: u128,
    /// Version of docpipe that wrote the record
    pub docpipe_version: String,
}

impl FingerprintRecord {
    /// Build a record for a finished run
    #[must_use]
    pub fn new(
        task_name: &str,
        fingerprint: &Fingerprint,
        outputs: &[PathBuf],
        duration_ms: u128,
    ) -> Self {
        Self {
            task_name: task_name.to_string(),
            fingerprint: fingerprint.digest.clone(),
            inputs_summary: fingerprint.inputs_summary.clone(),
            outputs: outputs.iter().map(|p| p.display().to_string()).collect(),
            created_at: Utc::now(),
            duration_ms,
            docpipe_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Inputs for determining cache root directory
#[derive(Debug, Clone)]
struct CacheInputs {
    docpipe_cache_dir: Option<PathBuf>,
    xdg_cache_home: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    temp_dir: PathBuf,
}

fn cache_root_from_inputs(inputs: CacheInputs) -> Result<PathBuf> {
    // Resolution order (first writable wins):
    // 1) DOCPIPE_CACHE_DIR (explicit override)
    // 2) XDG_CACHE_HOME/docpipe/fingerprints
    // 3) OS cache dir/docpipe/fingerprints
    // 4) ~/.docpipe/cache/fingerprints
    // 5) TMPDIR/docpipe/cache/fingerprints
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(dir) = inputs
        .docpipe_cache_dir
        .filter(|p| !p.as_os_str().is_empty())
    {
        candidates.push(dir);
    }
    if let Some(xdg) = inputs.xdg_cache_home {
        candidates.push(xdg.join("docpipe/fingerprints"));
    }
    if let Some(os_cache) = inputs.os_cache_dir {
        candidates.push(os_cache.join("docpipe/fingerprints"));
    }
    if let Some(home) = inputs.home_dir {
        candidates.push(home.join(".docpipe/cache/fingerprints"));
    }
    candidates.push(inputs.temp_dir.join("docpipe/cache/fingerprints"));

    for path in candidates {
        if path.starts_with("/homeless-shelter") {
            continue;
        }
        // Existing directories may still be read-only in CI.
        if path.exists() {
            let probe = path.join(".write_probe");
            if fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&probe)
                .is_ok()
            {
                let _ = fs::remove_file(&probe);
                return Ok(path);
            }
            continue;
        }
        if fs::create_dir_all(&path).is_ok() {
            return Ok(path);
        }
    }
    Err(Error::configuration(
        "Failed to determine a writable cache directory",
    ))
}

/// Resolve the user-level cache root for fingerprint stores
pub fn cache_root() -> Result<PathBuf> {
    let from_env = |key: &str| {
        std::env::var(key)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    };
    cache_root_from_inputs(CacheInputs {
        docpipe_cache_dir: from_env("DOCPIPE_CACHE_DIR"),
        xdg_cache_home: from_env("XDG_CACHE_HOME"),
        os_cache_dir: cache_dir(),
        home_dir: home_dir(),
        temp_dir: std::env::temp_dir(),
    })
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}

/// Directory of per-task fingerprint records
///
/// Every task reads and writes only its own record file, so concurrent tasks
/// never contend on shared state.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    root: PathBuf,
}

impl FingerprintStore {
    /// Use `root` directly as the store directory
    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open the store for a project, under the user cache root unless overridden
    pub fn open(root_override: Option<&Path>, project_root: &Path) -> Result<Self> {
        let root = if let Some(root) = root_override {
            root.to_path_buf()
        } else {
            cache_root()?.join(short_hash(&project_root.to_string_lossy()))
        };
        tracing::debug!(root = %root.display(), "Opened fingerprint store");
        Ok(Self { root })
    }

    /// Root directory of the store
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record file for a task
    #[must_use]
    pub fn record_path(&self, task_name: &str) -> PathBuf {
        let readable: String = task_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root
            .join(format!("{readable}-{}.json", short_hash(task_name)))
    }

    /// Load the record of a task's last successful run
    pub fn load(&self, task_name: &str) -> Result<Option<FingerprintRecord>> {
        let path = self.record_path(task_name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| Error::io(e, &path, "read"))?;
        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(
                    task = task_name,
                    path = %path.display(),
                    "Ignoring unreadable fingerprint record: {e}"
                );
                Ok(None)
            }
        }
    }

    /// Persist a record, replacing any previous one for the same task
    pub fn save(&self, record: &FingerprintRecord) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| Error::io(e, &self.root, "create_dir_all"))?;
        let path = self.record_path(&record.task_name);
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| Error::serialization(format!("Failed to encode record: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| Error::io(e, &self.root, "create temp file"))?;
        tmp.write_all(&json)
            .map_err(|e| Error::io(e, tmp.path(), "write"))?;
        tmp.persist(&path)
            .map_err(|e| Error::io(e.error, &path, "persist"))?;
        tracing::trace!(task = %record.task_name, path = %path.display(), "Saved fingerprint");
        Ok(())
    }

    /// Forget a task's record so its next run is forced
    pub fn invalidate(&self, task_name: &str) -> Result<()> {
        let path = self.record_path(task_name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(e, &path, "remove")),
        }
    }

    /// Remove every record in the store
    pub fn clear(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)
                .map_err(|e| Error::io(e, &self.root, "remove_dir_all"))?;
        }
        Ok(())
    }
}

//! Content-hash fingerprints for docpipe tasks
//!
//! This crate decides whether a pipeline task may be skipped:
//! - [`compute_fingerprint`] digests a task's declared inputs (file contents,
//!   directory listings, scalar values) into one SHA-256 value
//! - [`FingerprintStore`] persists the fingerprint of each task's last
//!   successful run, one JSON record per task
//!
//! # Fingerprint Computation
//!
//! A fingerprint covers:
//! - SHA-256 of every declared input file
//! - Relative path and content hash of every file below declared input directories
//! - Declared scalar values (versions, URLs, flags)
//! - The task name and the docpipe version
//!
//! Missing inputs are recorded as absent rather than failing, so a file that
//! appears later changes the fingerprint.

#![expect(
    clippy::missing_errors_doc,
    reason = "Error documentation to be added incrementally"
)]

mod error;
pub mod fingerprint;
pub mod store;

pub use error::{Error, Result};

pub use fingerprint::{Fingerprint, FingerprintInput, compute_fingerprint, sha256_file};
pub use store::{FingerprintRecord, FingerprintStore, cache_root};

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

//! Core of docpipe: an incremental documentation pipeline.
//!
//! The pipeline aggregates API documentation for several modules, converts
//! prose documents to HTML and PDF, fixes cross-reference links, packages
//! everything into a versioned directory and publishes it to a git branch.
//!
//! - [`config`]: the immutable [`PipelineConfig`] loaded from `docpipe.toml`
//! - [`runner`] and [`materialize`]: run external commands and write their
//!   captured output to disk
//! - [`tasks`]: the [`Task`](tasks::Task) trait, the [`Pipeline`](tasks::Pipeline)
//!   registry and the [`Scheduler`](tasks::Scheduler) that skips up-to-date work
//! - [`publish`]: git-based publishing that preserves unrelated content
//! - [`pipeline`]: wiring of the standard documentation pipeline

pub mod config;
mod copy;
mod error;
pub mod materialize;
pub mod pipeline;
pub mod publish;
pub mod runner;
pub mod tasks;

pub use config::PipelineConfig;
pub use error::{Error, Result};

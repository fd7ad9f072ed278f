//! Task graph DAG algorithms and dependency ordering for docpipe.
//!
//! This crate provides a directed acyclic graph (DAG) of named pipeline
//! tasks backed by petgraph. It knows nothing about what a task does; it
//! only orders them and rejects graphs that cannot be ordered.
//!
//! # Key Types
//!
//! - [`TaskGraph`]: The graph structure for building and querying task dependencies
//! - [`TaskNodeData`]: Trait that task types must implement to be stored in the graph
//! - [`GraphNode`]: A node in the graph containing the task name and data
//!
//! # Example
//!
//! ```ignore
//! use docpipe_task_graph::{TaskGraph, TaskNodeData};
//!
//! #[derive(Clone)]
//! struct Step {
//!     depends_on: Vec<String>,
//! }
//!
//! impl TaskNodeData for Step {
//!     fn dependency_names(&self) -> impl Iterator<Item = &str> {
//!         self.depends_on.iter().map(String::as_str)
//!     }
//! }
//!
//! let mut graph = TaskGraph::new();
//! graph.add_task("aggregate-api-docs", Step { depends_on: vec![] })?;
//! graph.add_task("fix-api-docs", Step { depends_on: vec!["aggregate-api-docs".into()] })?;
//! graph.add_dependency_edges()?;
//!
//! let sorted = graph.topological_sort()?;
//! ```

mod error;
mod graph;
mod validation;

pub use error::{Error, Result};
pub use graph::{GraphNode, TaskGraph};
pub use validation::ValidationResult;

/// Trait for task data that can be stored in the task graph.
///
/// Implement this trait for your task type to enable it to be stored
/// in a [`TaskGraph`] and participate in dependency ordering.
pub trait TaskNodeData: Clone {
    /// Returns the names of tasks this task depends on.
    fn dependency_names(&self) -> impl Iterator<Item = &str>;
}

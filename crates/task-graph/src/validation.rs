//! Validation utilities for task graphs.

use crate::{Error, TaskGraph, TaskNodeData};

/// Result of graph validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the graph is valid (no cycles).
    pub is_valid: bool,
    /// List of validation errors, if any.
    pub errors: Vec<Error>,
}

impl ValidationResult {
    /// Create a valid result.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    /// Create an invalid result with errors.
    #[must_use]
    pub fn invalid(errors: Vec<Error>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }

    /// Convert into a `Result`, returning the first error if invalid.
    ///
    /// # Errors
    ///
    /// Returns the first recorded validation error.
    pub fn into_result(self) -> crate::Result<()> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<T: TaskNodeData> TaskGraph<T> {
    /// Validate the graph structure.
    ///
    /// Missing dependencies are caught during `add_dependency_edges()`,
    /// so this checks for cycles once edges are in place.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        match self.find_cycle() {
            Some(tasks) => ValidationResult::invalid(vec![Error::CycleDetected { tasks }]),
            None => ValidationResult::valid(),
        }
    }
}

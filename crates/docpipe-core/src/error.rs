//! Error types for pipeline configuration and task execution.

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running the pipeline.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The pipeline configuration or task graph is invalid.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(docpipe::core::config))]
    Configuration {
        /// What is wrong
        message: String,
        /// How to fix it, when known
        #[help]
        help: Option<String>,
    },

    /// An external command exited unsuccessfully.
    #[error("Command '{program}' failed{}", exit_code.map_or_else(|| " (terminated by signal)".to_string(), |c| format!(" with exit code {c}")))]
    #[diagnostic(code(docpipe::core::execution))]
    Execution {
        /// The program that was run
        program: String,
        /// Exit code, if the process exited normally
        exit_code: Option<i32>,
        /// Captured standard error
        #[help]
        stderr: String,
    },

    /// A file system operation failed.
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(docpipe::core::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed
        operation: String,
    },

    /// Downloading a remote resource failed.
    #[error("Failed to fetch {url}: {message}")]
    #[diagnostic(
        code(docpipe::core::network),
        help("Check network access or run once online to populate the element-list cache")
    )]
    Network {
        /// The URL that was requested
        url: String,
        /// What went wrong
        message: String,
    },

    /// A task finished without producing one of its declared outputs.
    #[error("Task '{task}' did not produce declared output {}", path.display())]
    #[diagnostic(code(docpipe::core::missing_output))]
    MissingOutput {
        /// The task that ran
        task: String,
        /// The missing output
        path: PathBuf,
    },

    /// A task failed; wraps the first failure of a run.
    #[error("Task '{task}' failed")]
    #[diagnostic(code(docpipe::core::task_failed))]
    TaskFailed {
        /// The failing task
        task: String,
        /// Why it failed
        #[source]
        source: Box<Error>,
    },

    /// Fingerprint store error.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] docpipe_cache::Error),
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            help: None,
        }
    }

    /// Create a configuration error with a hint
    #[must_use]
    pub fn configuration_with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            help: Some(help.into()),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create a network error
    #[must_use]
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Wrap an error as the failure of `task`
    #[must_use]
    pub fn task_failed(task: impl Into<String>, source: Self) -> Self {
        Self::TaskFailed {
            task: task.into(),
            source: Box::new(source),
        }
    }

    /// Name of the failed task, if this is a task failure
    #[must_use]
    pub fn failed_task(&self) -> Option<&str> {
        match self {
            Self::TaskFailed { task, .. } => Some(task),
            _ => None,
        }
    }
}

impl From<docpipe_task_graph::Error> for Error {
    fn from(err: docpipe_task_graph::Error) -> Self {
        let help = match &err {
            docpipe_task_graph::Error::CycleDetected { .. } => {
                Some("Remove one of the depends_on entries forming the cycle".to_string())
            }
            docpipe_task_graph::Error::UnknownTask { .. } => {
                Some("Run 'docpipe list' to see the available tasks".to_string())
            }
            _ => None,
        };
        Self::Configuration {
            message: err.to_string(),
            help,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_message_includes_exit_code() {
        let err = Error::Execution {
            program: "javadoc".into(),
            exit_code: Some(2),
            stderr: "boom".into(),
        };
        assert_eq!(err.to_string(), "Command 'javadoc' failed with exit code 2");
    }

    #[test]
    fn task_failed_keeps_cause() {
        let err = Error::task_failed("aggregate-api-docs", Error::configuration("bad"));
        assert_eq!(err.failed_task(), Some("aggregate-api-docs"));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "Configuration error: bad");
    }

    #[test]
    fn graph_cycle_becomes_configuration_error() {
        let err: Error = docpipe_task_graph::Error::CycleDetected {
            tasks: vec!["a".into(), "b".into()],
        }
        .into();
        assert!(matches!(err, Error::Configuration { help: Some(_), .. }));
        assert!(err.to_string().contains("a, b"));
    }
}

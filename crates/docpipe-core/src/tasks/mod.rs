//! Pipeline tasks and the static task graph they form.
//!
//! - [`Task`]: a named unit with declared inputs, outputs and an action
//! - [`Pipeline`]: registry of tasks plus their dependency edges
//! - [`Scheduler`]: runs a closed, ordered subset of the pipeline

mod aggregate;
mod command;
mod convert;
mod element_lists;
mod fix_links;
mod package;
mod scheduler;

pub use aggregate::{AggregateApiDocsTask, ApiDocsInvocation};
pub use command::{CaptureTask, CommandTask, ModuleBuildTask};
pub use convert::{ConvertTask, OutputFormat};
pub use element_lists::{
    DownloadElementListsTask, ElementListSource, HttpElementListSource, element_list_content,
};
pub use fix_links::{FixApiDocsTask, fix_html, fix_line};
pub use package::{CurrentDocsTask, PackageTask};
pub use scheduler::{RunReport, Scheduler, SkipReason, TaskOutcome, TaskState};

use crate::{Error, Result};
use docpipe_cache::FingerprintInput;
use docpipe_task_graph::{TaskGraph, TaskNodeData};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Whether an up-to-date task may be skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Skip when the fingerprint matches and all outputs exist
    #[default]
    Always,
    /// Run on every invocation
    Never,
}

/// A unit of work in the pipeline.
pub trait Task: Send + Sync + fmt::Debug {
    /// Unique task name
    fn name(&self) -> &str;

    /// One-line description for `docpipe list`
    fn description(&self) -> String;

    /// Declared inputs; their content decides whether the task is up to date
    fn inputs(&self) -> Vec<FingerprintInput>;

    /// Declared outputs; each must exist after a successful run
    fn outputs(&self) -> Vec<PathBuf>;

    /// Cache policy
    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Always
    }

    /// Condition evaluated right before the task would run
    fn only_if(&self) -> bool {
        true
    }

    /// Perform the task's action
    ///
    /// # Errors
    ///
    /// Returns whatever error made the action fail.
    fn run(&self) -> Result<()>;
}

/// Handle to a registered task, used to declare dependencies.
///
/// Only [`Pipeline::register`] hands these out, so a dependency can never
/// name a task that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskRef(Arc<str>);

impl TaskRef {
    /// Name of the referenced task
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered task together with its dependencies.
#[derive(Debug, Clone)]
pub struct PipelineEntry {
    /// The task
    pub task: Arc<dyn Task>,
    /// Names of tasks that must complete first
    pub depends_on: Vec<String>,
}

impl TaskNodeData for PipelineEntry {
    fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.depends_on.iter().map(String::as_str)
    }
}

/// Static graph of every task known to this invocation.
#[derive(Debug, Default)]
pub struct Pipeline {
    entries: BTreeMap<String, PipelineEntry>,
}

impl Pipeline {
    /// Create an empty pipeline
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task that depends on `depends_on`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a task with the same name exists.
    pub fn register(
        &mut self,
        task: impl Task + 'static,
        depends_on: &[&TaskRef],
    ) -> Result<TaskRef> {
        self.register_arc(Arc::new(task), depends_on)
    }

    /// Register an already shared task.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a task with the same name exists.
    pub fn register_arc(&mut self, task: Arc<dyn Task>, depends_on: &[&TaskRef]) -> Result<TaskRef> {
        let name = task.name().to_string();
        if self.entries.contains_key(&name) {
            return Err(Error::configuration(format!(
                "task '{name}' is registered more than once"
            )));
        }
        let mut deps: Vec<String> = depends_on.iter().map(|d| d.name().to_string()).collect();
        deps.sort();
        deps.dedup();
        tracing::trace!(task = %name, depends_on = ?deps, "Registered task");
        self.entries.insert(
            name.clone(),
            PipelineEntry {
                task,
                depends_on: deps,
            },
        );
        Ok(TaskRef(name.into()))
    }

    /// Add an edge: `task` runs after `dependency`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `task` is not registered here.
    pub fn add_dependency(&mut self, task: &TaskRef, dependency: &TaskRef) -> Result<()> {
        let entry = self.entries.get_mut(task.name()).ok_or_else(|| {
            Error::configuration(format!("task '{task}' is not part of this pipeline"))
        })?;
        if !entry.depends_on.iter().any(|d| d == dependency.name()) {
            entry.depends_on.push(dependency.name().to_string());
        }
        Ok(())
    }

    /// Look up a registered task by name
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TaskRef> {
        self.entries
            .get_key_value(name)
            .map(|(k, _)| TaskRef(k.as_str().into()))
    }

    /// Entry for a task name
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&PipelineEntry> {
        self.entries.get(name)
    }

    /// All entries, sorted by task name
    pub fn entries(&self) -> impl Iterator<Item = (&str, &PipelineEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of registered tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no task is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check the whole graph for cycles and dangling dependencies.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the problem.
    pub fn validate(&self) -> Result<()> {
        let mut graph = TaskGraph::new();
        for (name, entry) in &self.entries {
            graph.add_task(name, entry.clone())?;
        }
        graph.add_dependency_edges()?;
        graph.validate().into_result()?;
        Ok(())
    }

    /// Close `targets` over their dependencies and order them so every task
    /// comes after everything it depends on.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown targets or cycles.
    pub fn plan(&self, targets: &[&str]) -> Result<Vec<Arc<dyn Task>>> {
        let mut graph = TaskGraph::new();
        graph.build_for_tasks(targets, |name| self.entries.get(name).cloned())?;
        graph.validate().into_result()?;
        tracing::debug!(
            targets = ?targets,
            planned = graph.task_count(),
            "Planned task execution"
        );
        let ordered = graph.topological_sort()?;
        Ok(ordered.into_iter().map(|node| node.task.task).collect())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{CachePolicy, Task};
    use crate::{Error, Result};
    use docpipe_cache::FingerprintInput;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Task that writes a file from an input file and counts its runs.
    #[derive(Debug, Clone)]
    pub struct RecordingTask {
        pub name: String,
        pub input: Option<PathBuf>,
        pub output: Option<PathBuf>,
        pub runs: Arc<AtomicUsize>,
        pub fail: bool,
        pub policy: CachePolicy,
        pub enabled: bool,
    }

    impl RecordingTask {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                input: None,
                output: None,
                runs: Arc::new(AtomicUsize::new(0)),
                fail: false,
                policy: CachePolicy::Always,
                enabled: true,
            }
        }

        pub fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    impl Task for RecordingTask {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> String {
            format!("records runs of {}", self.name)
        }

        fn inputs(&self) -> Vec<FingerprintInput> {
            self.input.iter().cloned().map(FingerprintInput::File).collect()
        }

        fn outputs(&self) -> Vec<PathBuf> {
            self.output.iter().cloned().collect()
        }

        fn cache_policy(&self) -> CachePolicy {
            self.policy
        }

        fn only_if(&self) -> bool {
            self.enabled
        }

        fn run(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::configuration(format!("{} was told to fail", self.name)));
            }
            if let Some(output) = &self.output {
                let content = match &self.input {
                    Some(input) => std::fs::read(input).unwrap_or_default(),
                    None => self.name.as_bytes().to_vec(),
                };
                crate::materialize::materialize(&content, output)?;
            }
            Ok(())
        }
    }
}

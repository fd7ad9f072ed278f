//! Sequential, fingerprint-aware execution of a planned task list.

use super::{CachePolicy, Pipeline, Task};
use crate::{Error, Result};
use docpipe_cache::{FingerprintInput, FingerprintRecord, FingerprintStore, compute_fingerprint};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Why a task did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Fingerprint unchanged and every output present
    UpToDate,
    /// The task's `only_if` condition was false
    ConditionFalse,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => f.write_str("up-to-date"),
            Self::ConditionFalse => f.write_str("condition false"),
        }
    }
}

/// Lifecycle state of a task within one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not evaluated yet
    Pending,
    /// Evaluated and not executed
    Skipped(SkipReason),
    /// Executing
    Running,
    /// Executed successfully; its fingerprint was persisted
    Succeeded,
    /// Executed and failed
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Running => f.write_str("running"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Final state of one planned task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    /// Task name
    pub name: String,
    /// Final state
    pub state: TaskState,
    /// Time spent executing; zero when skipped or never reached
    pub duration: Duration,
}

/// Result of running a set of targets.
#[derive(Debug, Default)]
pub struct RunReport {
    /// One outcome per planned task, in execution order
    pub outcomes: Vec<TaskOutcome>,
    /// The first failure, wrapped as [`Error::TaskFailed`]
    pub failure: Option<Error>,
}

impl RunReport {
    /// State of a task, if it was part of the plan
    #[must_use]
    pub fn state_of(&self, name: &str) -> Option<TaskState> {
        self.outcomes
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.state)
    }

    /// Names of tasks that actually executed successfully
    #[must_use]
    pub fn executed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.state == TaskState::Succeeded)
            .map(|o| o.name.as_str())
            .collect()
    }

    /// Whether every planned task succeeded or was skipped
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Turn the report into an error if any task failed.
    ///
    /// # Errors
    ///
    /// Returns the recorded [`Error::TaskFailed`].
    pub fn into_result(self) -> Result<Self> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Runs planned tasks one after another, skipping those that are up to date.
#[derive(Debug)]
pub struct Scheduler<'a> {
    pipeline: &'a Pipeline,
    store: &'a FingerprintStore,
}

impl<'a> Scheduler<'a> {
    /// Create a scheduler over a pipeline and a fingerprint store
    #[must_use]
    pub fn new(pipeline: &'a Pipeline, store: &'a FingerprintStore) -> Self {
        Self { pipeline, store }
    }

    /// Run `targets` and everything they depend on.
    ///
    /// Planning errors (unknown targets, cycles) are returned before any task
    /// executes. Task failures end the run and are recorded in the report.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the targets cannot be planned.
    pub fn execute(&self, targets: &[&str]) -> Result<RunReport> {
        let plan = self.pipeline.plan(targets)?;
        let mut report = RunReport {
            outcomes: plan
                .iter()
                .map(|task| TaskOutcome {
                    name: task.name().to_string(),
                    state: TaskState::Pending,
                    duration: Duration::ZERO,
                })
                .collect(),
            failure: None,
        };

        for (index, task) in plan.iter().enumerate() {
            let started = Instant::now();
            report.outcomes[index].state = TaskState::Running;
            match self.evaluate(task.as_ref()) {
                Ok(state) => {
                    report.outcomes[index].state = state;
                    report.outcomes[index].duration = started.elapsed();
                }
                Err(err) => {
                    report.outcomes[index].state = TaskState::Failed;
                    report.outcomes[index].duration = started.elapsed();
                    tracing::error!(task = task.name(), error = %err, "Task failed");
                    report.failure = Some(Error::task_failed(task.name(), err));
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Run `targets`, failing on the first task failure.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for planning problems and
    /// [`Error::TaskFailed`] wrapping the first failing task.
    pub fn run(&self, targets: &[&str]) -> Result<RunReport> {
        self.execute(targets)?.into_result()
    }

    fn evaluate(&self, task: &dyn Task) -> Result<TaskState> {
        let name = task.name();
        let span = tracing::info_span!("task", task = name);
        let _guard = span.enter();

        if !task.only_if() {
            tracing::info!(reason = %SkipReason::ConditionFalse, "Skipping task");
            return Ok(TaskState::Skipped(SkipReason::ConditionFalse));
        }

        let outputs = task.outputs();
        let mut inputs = task.inputs();
        inputs.push(FingerprintInput::value(
            "declared_outputs",
            render_paths(&outputs),
        ));
        let fingerprint = compute_fingerprint(name, &inputs)?;

        if task.cache_policy() == CachePolicy::Always
            && let Some(record) = self.store.load(name)?
            && record.fingerprint == fingerprint.digest
            && outputs.iter().all(|p| p.exists())
        {
            tracing::info!(reason = %SkipReason::UpToDate, "Skipping task");
            return Ok(TaskState::Skipped(SkipReason::UpToDate));
        }

        tracing::info!("Running task");
        let started = Instant::now();
        task.run()?;

        if let Some(missing) = outputs.iter().find(|p| !p.exists()) {
            return Err(Error::MissingOutput {
                task: name.to_string(),
                path: missing.clone(),
            });
        }

        let elapsed = started.elapsed();
        self.store.save(&FingerprintRecord::new(
            name,
            &fingerprint,
            &outputs,
            elapsed.as_millis(),
        ))?;
        tracing::info!(duration_ms = elapsed.as_millis(), "Task succeeded");
        Ok(TaskState::Succeeded)
    }
}

fn render_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

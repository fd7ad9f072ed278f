//! Tasks that wrap a single external command.

use super::{CachePolicy, Task};
use crate::config::{CommandTaskConfig, GeneratedArtifact, ModuleDescriptor};
use crate::materialize::materialize;
use crate::runner::{CommandSpec, run_captured};
use crate::{Error, Result};
use docpipe_cache::FingerprintInput;
use std::path::PathBuf;

fn command_input(spec: &CommandSpec) -> Vec<FingerprintInput> {
    let mut inputs = vec![FingerprintInput::value("command", spec.render())];
    inputs.extend(spec.classpath.iter().cloned().map(|p| {
        if p.is_dir() {
            FingerprintInput::Directory(p)
        } else {
            FingerprintInput::File(p)
        }
    }));
    inputs
}

/// `build:<module>`: produces a module's compiled output.
#[derive(Debug, Clone)]
pub struct ModuleBuildTask {
    name: String,
    module: ModuleDescriptor,
}

impl ModuleBuildTask {
    /// Create the build task of `module`
    #[must_use]
    pub fn new(module: ModuleDescriptor) -> Self {
        Self {
            name: Self::task_name(&module.name),
            module,
        }
    }

    /// Task name for a module
    #[must_use]
    pub fn task_name(module: &str) -> String {
        format!("build:{module}")
    }
}

impl Task for ModuleBuildTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Builds module {}", self.module.name)
    }

    fn inputs(&self) -> Vec<FingerprintInput> {
        let mut inputs: Vec<FingerprintInput> = self
            .module
            .main_sources
            .iter()
            .chain(&self.module.test_sources)
            .cloned()
            .map(FingerprintInput::Directory)
            .collect();
        if let Some(build) = &self.module.build {
            inputs.extend(command_input(build));
        }
        inputs
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.module.compiled.clone()]
    }

    fn run(&self) -> Result<()> {
        match &self.module.build {
            Some(build) => {
                let stdout = run_captured(build)?;
                for line in String::from_utf8_lossy(&stdout).lines() {
                    tracing::debug!(module = %self.module.name, "{line}");
                }
                Ok(())
            }
            None if self.module.compiled.exists() => {
                tracing::debug!(module = %self.module.name, "No build command; using existing output");
                Ok(())
            }
            None => Err(Error::configuration_with_help(
                format!(
                    "module '{}' has no build command and {} does not exist",
                    self.module.name,
                    self.module.compiled.display()
                ),
                "Add a [modules.build] command or build the module beforehand",
            )),
        }
    }
}

/// Runs a command and writes its standard output to a text file.
#[derive(Debug, Clone)]
pub struct CaptureTask {
    artifact: GeneratedArtifact,
}

impl CaptureTask {
    /// Create a capture task for a configured artifact
    #[must_use]
    pub fn new(artifact: GeneratedArtifact) -> Self {
        Self { artifact }
    }

    /// Names of the tasks this one depends on
    #[must_use]
    pub fn depends_on(&self) -> &[String] {
        &self.artifact.depends_on
    }
}

impl Task for CaptureTask {
    fn name(&self) -> &str {
        &self.artifact.name
    }

    fn description(&self) -> String {
        format!(
            "Captures '{}' into {}",
            self.artifact.command.program,
            self.artifact.output.display()
        )
    }

    fn inputs(&self) -> Vec<FingerprintInput> {
        command_input(&self.artifact.command)
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.artifact.output.clone()]
    }

    fn run(&self) -> Result<()> {
        let stdout = run_captured(&self.artifact.command)?;
        let written = materialize(&stdout, &self.artifact.output)?;
        tracing::info!(
            path = %written.path.display(),
            bytes = written.bytes_written,
            "Captured command output"
        );
        Ok(())
    }
}

/// A command task declared under `[[commands]]`.
#[derive(Debug, Clone)]
pub struct CommandTask {
    config: CommandTaskConfig,
}

impl CommandTask {
    /// Create a command task from configuration
    #[must_use]
    pub fn new(config: CommandTaskConfig) -> Self {
        Self { config }
    }

    /// Names of the tasks this one depends on
    #[must_use]
    pub fn depends_on(&self) -> &[String] {
        &self.config.depends_on
    }
}

impl Task for CommandTask {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn description(&self) -> String {
        format!("Runs {}", self.config.command.program)
    }

    fn inputs(&self) -> Vec<FingerprintInput> {
        let mut inputs = command_input(&self.config.command);
        inputs.extend(
            self.config
                .input_files
                .iter()
                .cloned()
                .map(FingerprintInput::File),
        );
        inputs.extend(
            self.config
                .input_dirs
                .iter()
                .cloned()
                .map(FingerprintInput::Directory),
        );
        inputs
    }

    fn outputs(&self) -> Vec<PathBuf> {
        self.config.outputs.clone()
    }

    fn cache_policy(&self) -> CachePolicy {
        if self.config.cache {
            CachePolicy::Always
        } else {
            CachePolicy::Never
        }
    }

    fn run(&self) -> Result<()> {
        let stdout = run_captured(&self.config.command)?;
        for line in String::from_utf8_lossy(&stdout).lines() {
            tracing::info!(task = %self.config.name, "{line}");
        }
        Ok(())
    }
}

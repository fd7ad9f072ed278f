//! Synchronous external command execution with captured output.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// A fully described external command.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CommandSpec {
    /// Program to run, looked up on `PATH` when not a path
    pub program: String,
    /// Arguments passed after any system properties
    #[serde(default)]
    pub args: Vec<String>,
    /// Classpath entries, exported as `CLASSPATH`
    #[serde(default)]
    pub classpath: Vec<PathBuf>,
    /// System properties, passed as leading `-Dkey=value` arguments
    #[serde(default)]
    pub system_properties: BTreeMap<String, String>,
    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory; inherits the current one when absent
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Create a command with no arguments
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append arguments
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Full argument vector: system properties first, then `args`
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        self.system_properties
            .iter()
            .map(|(k, v)| format!("-D{k}={v}"))
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Stable single-line rendering, used for logging and fingerprints
    #[must_use]
    pub fn render(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.argv());
        if !self.classpath.is_empty() {
            let cp: Vec<String> = self
                .classpath
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            parts.push(format!("[classpath={}]", cp.join(",")));
        }
        for (k, v) in &self.env {
            parts.push(format!("[env {k}={v}]"));
        }
        parts.join(" ")
    }

    fn to_command(&self) -> Result<Command> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.argv());
        if !self.classpath.is_empty() {
            let joined = std::env::join_paths(&self.classpath).map_err(|e| {
                Error::configuration(format!(
                    "classpath of '{}' contains an invalid entry: {e}",
                    self.program
                ))
            })?;
            cmd.env("CLASSPATH", joined);
        }
        cmd.envs(&self.env);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }
}

/// Run a command to completion and return its standard output.
///
/// Standard error is collected and attached to the failure when the command
/// exits unsuccessfully. Nothing is written to disk.
///
/// # Errors
///
/// Returns an I/O error if the program cannot be started and an execution
/// error if it exits with a non-zero status.
pub fn run_captured(spec: &CommandSpec) -> Result<Vec<u8>> {
    let _span = tracing::debug_span!("run_captured", program = %spec.program).entered();
    tracing::debug!(command = %spec.render(), "Running command");

    let output = spec
        .to_command()?
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::Io {
            source: e,
            path: spec.working_dir.as_deref().map(Into::into),
            operation: format!("spawn '{}'", spec.program),
        })?;

    if output.status.success() {
        tracing::trace!(bytes = output.stdout.len(), "Command succeeded");
        Ok(output.stdout)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::debug!(exit_code = ?output.status.code(), %stderr, "Command failed");
        Err(Error::Execution {
            program: spec.program.clone(),
            exit_code: output.status.code(),
            stderr,
        })
    }
}

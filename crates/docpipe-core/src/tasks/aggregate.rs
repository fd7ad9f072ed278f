//! One API-doc generation pass over every module's sources.

use super::Task;
use crate::config::PipelineConfig;
use crate::copy::remove_dir_if_exists;
use crate::runner::{CommandSpec, run_captured};
use crate::{Error, Result};
use docpipe_cache::FingerprintInput;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fully resolved API-doc command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDocsInvocation {
    /// Program to run
    pub program: String,
    /// Every argument, in order
    pub args: Vec<String>,
    /// Entries of `--module-path`
    pub module_path: Vec<PathBuf>,
    /// Entries of `-sourcepath`
    pub source_path: Vec<PathBuf>,
}

impl ApiDocsInvocation {
    /// Value following `flag`, if present
    #[must_use]
    pub fn option(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Command spec to execute
    #[must_use]
    pub fn to_command(&self, working_dir: &Path) -> CommandSpec {
        CommandSpec::new(&self.program)
            .with_args(self.args.iter().cloned())
            .in_dir(working_dir)
    }
}

fn push(args: &mut Vec<String>, flag: &str, value: String) {
    args.push(flag.to_string());
    args.push(value);
}

fn join_path_list(paths: &[PathBuf]) -> Result<String> {
    std::env::join_paths(paths)
        .map(|s| s.to_string_lossy().into_owned())
        .map_err(|e| Error::configuration(format!("cannot join path list: {e}")))
}

/// `aggregate-api-docs`.
#[derive(Debug, Clone)]
pub struct AggregateApiDocsTask {
    name: String,
    config: Arc<PipelineConfig>,
}

impl AggregateApiDocsTask {
    /// Create the aggregation task
    #[must_use]
    pub fn new(name: &str, config: Arc<PipelineConfig>) -> Self {
        Self {
            name: name.to_string(),
            config,
        }
    }

    /// Build the API-doc invocation from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a path list cannot be joined.
    pub fn invocation(&self) -> Result<ApiDocsInvocation> {
        let config = &self.config;
        let api = &config.api_docs;
        let mut args: Vec<String> = Vec::new();

        push(&mut args, "-d", config.api_docs_dir().display().to_string());
        let title = api.title.clone().unwrap_or_else(|| {
            format!("{} {} API", config.project.name, config.project.version)
        });
        push(&mut args, "-doctitle", title.clone());
        push(&mut args, "-windowtitle", title);
        if let Some(header) = api.header.as_ref().or(config.project.description.as_ref()) {
            push(&mut args, "-header", header.clone());
        }
        push(&mut args, "-encoding", api.encoding.clone());
        push(&mut args, "-locale", api.locale.clone());
        if let Some(overview) = &api.overview {
            push(&mut args, "-overview", overview.display().to_string());
        }
        if let Some(stylesheet) = &api.stylesheet {
            push(&mut args, "--add-stylesheet", stylesheet.display().to_string());
        }
        for tag in &api.tags {
            push(&mut args, "-tag", tag.clone());
        }
        for link in &api.links {
            push(&mut args, "-link", link.clone());
        }
        for (name, patterns) in &api.groups {
            push(&mut args, "-group", name.clone());
            args.push(patterns.join(":"));
        }

        let module_names: Vec<&str> = config.modules.iter().map(|m| m.name.as_str()).collect();
        let module_sources: Vec<PathBuf> = config
            .modules
            .iter()
            .filter_map(|m| m.module_source.clone())
            .collect();
        let source_path: Vec<PathBuf> = config
            .modules
            .iter()
            .flat_map(|m| m.main_sources.iter().cloned())
            .collect();
        let module_path: Vec<PathBuf> = config
            .modules
            .iter()
            .map(|m| m.compiled.clone())
            .chain(api.module_path.iter().cloned())
            .collect();

        if !module_names.is_empty() {
            args.push("--module".into());
            args.push(module_names.join(","));
        }
        if !module_sources.is_empty() {
            args.push("--module-source-path".into());
            args.push(join_path_list(&module_sources)?);
        }
        for module in config.modules.iter().filter(|m| !m.main_sources.is_empty()) {
            args.push("--patch-module".into());
            args.push(format!("{}={}", module.name, join_path_list(&module.main_sources)?));
        }
        if !api.add_modules.is_empty() {
            args.push("--add-modules".into());
            args.push(api.add_modules.join(","));
        }
        for (module, reads) in &api.add_reads {
            args.push("--add-reads".into());
            args.push(format!("{module}={reads}"));
        }
        if !module_path.is_empty() {
            args.push("--module-path".into());
            args.push(join_path_list(&module_path)?);
        }
        if !source_path.is_empty() {
            args.push("-sourcepath".into());
            args.push(join_path_list(&source_path)?);
        }
        for module in &config.external_modules {
            args.push("-linkoffline".into());
            args.push(module.base_url.clone());
            args.push(
                config
                    .element_lists_dir()
                    .join(&module.name)
                    .display()
                    .to_string(),
            );
        }

        args.push(api.member_level.flag().into());
        args.extend(
            ["-splitindex", "-use", "-notimestamp", "-Xdoclint:none", "-html5"]
                .map(String::from),
        );
        args.extend(api.extra_options.iter().cloned());

        Ok(ApiDocsInvocation {
            program: api.program.clone(),
            args,
            module_path,
            source_path,
        })
    }
}

impl Task for AggregateApiDocsTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!(
            "Generates aggregated API docs for {} modules",
            self.config.modules.len()
        )
    }

    fn inputs(&self) -> Vec<FingerprintInput> {
        let config = &self.config;
        let mut inputs: Vec<FingerprintInput> = config
            .external_modules
            .iter()
            .map(|m| FingerprintInput::File(config.element_list_path(&m.name)))
            .collect();
        match self.invocation() {
            Ok(invocation) => inputs.push(FingerprintInput::value(
                "command",
                invocation.to_command(&config.project_root).render(),
            )),
            Err(err) => inputs.push(FingerprintInput::value("command", err)),
        }
        for module in &config.modules {
            inputs.extend(
                module
                    .main_sources
                    .iter()
                    .chain(&module.module_source)
                    .cloned()
                    .map(FingerprintInput::Directory),
            );
            inputs.push(if module.compiled.is_dir() {
                FingerprintInput::Directory(module.compiled.clone())
            } else {
                FingerprintInput::File(module.compiled.clone())
            });
        }
        inputs.extend(
            config
                .api_docs
                .overview
                .iter()
                .chain(&config.api_docs.stylesheet)
                .cloned()
                .map(FingerprintInput::File),
        );
        inputs
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.config.api_docs_dir()]
    }

    fn run(&self) -> Result<()> {
        let invocation = self.invocation()?;
        let out = self.config.api_docs_dir();
        remove_dir_if_exists(&out)?;
        std::fs::create_dir_all(&out).map_err(|e| Error::io(e, &out, "create_dir_all"))?;

        tracing::info!(
            modules = self.config.modules.len(),
            module_path = invocation.module_path.len(),
            "Aggregating API docs"
        );
        let stdout = run_captured(&invocation.to_command(&self.config.project_root))?;
        for line in String::from_utf8_lossy(&stdout).lines() {
            tracing::trace!("{line}");
        }
        Ok(())
    }
}

//! The documentation pipeline wired from configuration.

use crate::config::PipelineConfig;
use crate::publish::PublishTask;
use crate::tasks::{
    AggregateApiDocsTask, CaptureTask, CommandTask, ConvertTask, CurrentDocsTask,
    DownloadElementListsTask, ElementListSource, FixApiDocsTask, ModuleBuildTask, OutputFormat,
    PackageTask, Pipeline, TaskRef,
};
use crate::{Error, Result};
use std::sync::Arc;

/// Downloads external element lists
pub const DOWNLOAD_ELEMENT_LISTS: &str = "download-element-lists";
/// Aggregated API docs over every module
pub const AGGREGATE_API_DOCS: &str = "aggregate-api-docs";
/// Link fixing of the aggregated API docs
pub const FIX_API_DOCS: &str = "fix-api-docs";
/// HTML conversion of the prose docs
pub const RENDER_HTML: &str = "render-html";
/// PDF conversion of the prose docs
pub const RENDER_PDF: &str = "render-pdf";
/// Assembly of the versioned docs directory
pub const PREPARE_DOCS: &str = "prepare-docs";
/// Replacement of the `current` alias
pub const CREATE_CURRENT_DOCS: &str = "create-current-docs";
/// Push to the hosting branch
pub const PUBLISH_DOCS: &str = "publish-docs";

/// Register every task implied by `config` and validate the resulting graph.
///
/// # Errors
///
/// Returns a configuration error for duplicate task names, dependencies on
/// unknown tasks or dependency cycles.
pub fn build_pipeline(
    config: Arc<PipelineConfig>,
    element_lists: Arc<dyn ElementListSource>,
) -> Result<Pipeline> {
    let mut pipeline = Pipeline::new();

    let builds: Vec<TaskRef> = config
        .modules
        .iter()
        .map(|module| pipeline.register(ModuleBuildTask::new(module.clone()), &[]))
        .collect::<Result<_>>()?;

    let mut declared: Vec<(TaskRef, Vec<String>)> = Vec::new();
    let mut captures: Vec<TaskRef> = Vec::new();
    for artifact in &config.generated {
        let task = CaptureTask::new(artifact.clone());
        let depends_on = task.depends_on().to_vec();
        let task_ref = pipeline.register(task, &[])?;
        declared.push((task_ref.clone(), depends_on));
        captures.push(task_ref);
    }

    let download = pipeline.register(
        DownloadElementListsTask::new(DOWNLOAD_ELEMENT_LISTS, config.clone(), element_lists),
        &[],
    )?;

    let mut aggregate_deps: Vec<&TaskRef> = builds.iter().collect();
    aggregate_deps.push(&download);
    let aggregate = pipeline.register(
        AggregateApiDocsTask::new(AGGREGATE_API_DOCS, config.clone()),
        &aggregate_deps,
    )?;

    let fix = pipeline.register(FixApiDocsTask::new(FIX_API_DOCS, config.clone()), &[&aggregate])?;

    let capture_deps: Vec<&TaskRef> = captures.iter().collect();
    let mut package_deps = vec![fix];
    if let Some(task) = ConvertTask::new(RENDER_HTML, OutputFormat::Html, config.clone()) {
        package_deps.push(pipeline.register(task, &capture_deps)?);
    }
    if let Some(task) = ConvertTask::new(RENDER_PDF, OutputFormat::Pdf, config.clone()) {
        let pdf = pipeline.register(task, &capture_deps)?;
        if config.upload_pdfs() {
            package_deps.push(pdf);
        }
    }

    let package_refs: Vec<&TaskRef> = package_deps.iter().collect();
    let package = pipeline.register(PackageTask::new(PREPARE_DOCS, config.clone()), &package_refs)?;
    let current = pipeline.register(
        CurrentDocsTask::new(CREATE_CURRENT_DOCS, config.clone()),
        &[&package],
    )?;

    if config.publish.is_some() {
        pipeline.register(
            PublishTask::new(PUBLISH_DOCS, config.clone()),
            &[&package, &current],
        )?;
    }

    for command in &config.commands {
        let task = CommandTask::new(command.clone());
        let depends_on = task.depends_on().to_vec();
        declared.push((pipeline.register(task, &[])?, depends_on));
    }
    resolve_declared_dependencies(&mut pipeline, &declared)?;

    pipeline.validate()?;
    tracing::debug!(tasks = pipeline.len(), "Pipeline built");
    Ok(pipeline)
}

/// Wire `depends_on` names from `[[generated]]` and `[[commands]]` once every
/// task is registered, so they may name any task.
fn resolve_declared_dependencies(
    pipeline: &mut Pipeline,
    declared: &[(TaskRef, Vec<String>)],
) -> Result<()> {
    for (task_ref, depends_on) in declared {
        for dep in depends_on {
            let dep_ref = pipeline.lookup(dep).ok_or_else(|| {
                Error::configuration_with_help(
                    format!("task '{task_ref}' depends on unknown task '{dep}'"),
                    "Run 'docpipe list' to see the available tasks",
                )
            })?;
            pipeline.add_dependency(task_ref, &dep_ref)?;
        }
    }
    Ok(())
}

/// Targets run when none are named: publishing if configured, else packaging.
#[must_use]
pub fn default_targets(config: &PipelineConfig) -> Vec<&'static str> {
    if config.publish.is_some() {
        vec![PUBLISH_DOCS]
    } else {
        vec![PREPARE_DOCS, CREATE_CURRENT_DOCS]
    }
}

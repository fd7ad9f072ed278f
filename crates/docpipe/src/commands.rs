//! Command handlers for the docpipe CLI

use crate::cli::{Cli, Commands};
use docpipe_cache::FingerprintStore;
use docpipe_core::pipeline::{build_pipeline, default_targets};
use docpipe_core::tasks::{HttpElementListSource, Pipeline, RunReport, Scheduler};
use docpipe_core::{Error, PipelineConfig, Result};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

/// Timeout for each external element-list download
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a command needs: the loaded configuration and its pipeline.
struct Session {
    config: Arc<PipelineConfig>,
    pipeline: Pipeline,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let config = PipelineConfig::load(&cli.config)?
            .with_replace_current_docs(cli.replace_current_docs);
        let config = Arc::new(config);
        tracing::debug!(
            project = %config.project.name,
            version = %config.project.version,
            docs_version = %config.docs_version(),
            "Loaded configuration"
        );
        let source = Arc::new(HttpElementListSource::new(DOWNLOAD_TIMEOUT)?);
        let pipeline = build_pipeline(config.clone(), source)?;
        Ok(Self { config, pipeline })
    }
}

#[derive(Debug, Serialize)]
struct TaskListing<'a> {
    name: &'a str,
    description: String,
    depends_on: &'a [String],
}

#[derive(Debug, Serialize)]
struct OutcomeSummary<'a> {
    name: &'a str,
    state: String,
    duration_ms: u128,
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    project: &'a str,
    docs_version: String,
    success: bool,
    failed_task: Option<&'a str>,
    tasks: Vec<OutcomeSummary<'a>>,
}

/// Dispatch the parsed command line.
///
/// # Errors
///
/// Returns a diagnostic for configuration problems, unknown targets and
/// failed tasks.
pub fn execute(cli: &Cli) -> miette::Result<()> {
    let span = tracing::info_span!(
        "command",
        command = ?cli.command,
        correlation_id = %crate::tracing::correlation_id(),
        started_at = %chrono::Utc::now().to_rfc3339(),
    );
    let _guard = span.enter();

    let session = Session::open(cli)?;
    match &cli.command {
        Commands::Run { tasks } => run(&session, cli, tasks),
        Commands::List => list(&session, cli.json),
        Commands::Check => check(&session, cli.json),
    }
}

fn run(session: &Session, cli: &Cli, tasks: &[String]) -> miette::Result<()> {
    let targets: Vec<&str> = if tasks.is_empty() {
        default_targets(&session.config)
    } else {
        tasks.iter().map(String::as_str).collect()
    };
    let store = FingerprintStore::open(cli.cache_dir.as_deref(), &session.config.project_root)
        .map_err(Error::from)?;

    tracing::info!(targets = ?targets, "Running pipeline");
    let report = Scheduler::new(&session.pipeline, &store).execute(&targets)?;

    if cli.json {
        write_json(&run_summary(session, &report))?;
    } else {
        write_report(&report).map_err(io_error)?;
    }
    report.into_result()?;
    Ok(())
}

fn run_summary<'a>(session: &'a Session, report: &'a RunReport) -> RunSummary<'a> {
    RunSummary {
        project: &session.config.project.name,
        docs_version: session.config.docs_version(),
        success: report.is_success(),
        failed_task: report.failure.as_ref().and_then(Error::failed_task),
        tasks: report
            .outcomes
            .iter()
            .map(|o| OutcomeSummary {
                name: &o.name,
                state: o.state.to_string(),
                duration_ms: o.duration.as_millis(),
            })
            .collect(),
    }
}

fn write_report(report: &RunReport) -> io::Result<()> {
    let width = report
        .outcomes
        .iter()
        .map(|o| o.name.len())
        .max()
        .unwrap_or(0);
    let mut out = io::stdout().lock();
    for outcome in &report.outcomes {
        if outcome.duration.is_zero() {
            writeln!(out, "{:<width$}  {}", outcome.name, outcome.state)?;
        } else {
            writeln!(
                out,
                "{:<width$}  {} in {:.2}s",
                outcome.name,
                outcome.state,
                outcome.duration.as_secs_f64()
            )?;
        }
    }
    Ok(())
}

fn list(session: &Session, json: bool) -> miette::Result<()> {
    let listings: Vec<TaskListing<'_>> = session
        .pipeline
        .entries()
        .map(|(name, entry)| TaskListing {
            name,
            description: entry.task.description(),
            depends_on: &entry.depends_on,
        })
        .collect();

    if json {
        return write_json(&listings);
    }

    let width = listings.iter().map(|l| l.name.len()).max().unwrap_or(0);
    let mut out = io::stdout().lock();
    for listing in &listings {
        writeln!(out, "{:<width$}  {}", listing.name, listing.description).map_err(io_error)?;
    }
    Ok(())
}

fn check(session: &Session, json: bool) -> miette::Result<()> {
    session.pipeline.validate()?;
    let config = &session.config;
    if json {
        return write_json(&serde_json::json!({
            "valid": true,
            "project": config.project.name,
            "docs_version": config.docs_version(),
            "release_branch": config.release_branch(),
            "tasks": session.pipeline.len(),
        }));
    }
    writeln!(
        io::stdout().lock(),
        "{} {}: {} tasks, docs version '{}', sources from '{}'",
        config.project.name,
        config.project.version,
        session.pipeline.len(),
        config.docs_version(),
        config.release_branch()
    )
    .map_err(io_error)?;
    Ok(())
}

fn write_json<T: Serialize>(value: &T) -> miette::Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| miette::miette!("Failed to serialize output: {e}"))?;
    writeln!(io::stdout().lock(), "{text}").map_err(io_error)?;
    Ok(())
}

fn io_error(err: io::Error) -> miette::Report {
    miette::miette!("Failed to write output: {err}")
}

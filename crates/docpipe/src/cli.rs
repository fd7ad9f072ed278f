use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docpipe")]
#[command(about = "Incremental pipeline that builds, packages and publishes project documentation")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'c',
        long,
        global = true,
        env = "DOCPIPE_CONFIG",
        default_value = "docpipe.toml",
        help = "Path to the pipeline configuration"
    )]
    pub config: PathBuf,

    #[arg(
        long,
        global = true,
        env = "DOCPIPE_REPLACE_CURRENT_DOCS",
        help = "Also replace the 'current' docs alias with this version"
    )]
    pub replace_current_docs: bool,

    #[arg(
        long,
        global = true,
        help = "Directory for fingerprint records (defaults to the user cache)"
    )]
    pub cache_dir: Option<PathBuf>,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    #[arg(long, global = true, help = "Emit logs and results as JSON")]
    pub json: bool,
}

impl Cli {
    /// Effective log format; `--json` wins over `--log-format`
    pub fn tracing_format(&self) -> TracingFormat {
        if self.json {
            TracingFormat::Json
        } else {
            self.log_format
        }
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    #[command(about = "Run tasks and everything they depend on")]
    Run {
        #[arg(help = "Tasks to run; defaults to publishing (or packaging when nothing is published)")]
        tasks: Vec<String>,
    },
    #[command(about = "List the tasks of the pipeline")]
    List,
    #[command(about = "Validate the configuration and task graph without running anything")]
    Check,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["docpipe", "list"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("docpipe.toml"));
        assert!(!cli.replace_current_docs);
        assert!(cli.cache_dir.is_none());
        assert_eq!(cli.level, LogLevel::Warn);
        assert_eq!(cli.tracing_format(), TracingFormat::Compact);
        assert_eq!(cli.command, Commands::List);
    }

    #[test]
    fn run_collects_targets_and_global_flags() {
        let cli = Cli::try_parse_from([
            "docpipe",
            "run",
            "aggregate-api-docs",
            "render-html",
            "--replace-current-docs",
            "--cache-dir",
            "/tmp/fp",
            "--level",
            "debug",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Run {
                tasks: vec!["aggregate-api-docs".into(), "render-html".into()]
            }
        );
        assert!(cli.replace_current_docs);
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/fp")));
        assert_eq!(cli.level, LogLevel::Debug);
    }

    #[test]
    fn json_overrides_log_format() {
        let cli = Cli::try_parse_from(["docpipe", "--log-format", "pretty", "--json", "check"]).unwrap();
        assert_eq!(cli.tracing_format(), TracingFormat::Json);
    }

    #[test]
    fn run_without_targets_is_allowed() {
        let cli = Cli::try_parse_from(["docpipe", "run"]).unwrap();
        assert_eq!(cli.command, Commands::Run { tasks: vec![] });
    }

    #[test]
    fn unknown_subcommand_fails() {
        assert!(Cli::try_parse_from(["docpipe", "deploy"]).is_err());
    }
}

//! Prose document conversion to HTML and PDF.

use super::Task;
use crate::config::{ConverterConfig, PipelineConfig};
use crate::copy::{build_globset, copy_matching, matching_files, remove_dir_if_exists};
use crate::runner::{CommandSpec, run_captured};
use crate::{Error, Result};
use docpipe_cache::FingerprintInput;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Conversion backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Multi-page HTML with resources next to it
    Html,
    /// One PDF per source document
    Pdf,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => f.write_str("html"),
            Self::Pdf => f.write_str("pdf"),
        }
    }
}

/// `render-html` / `render-pdf`.
#[derive(Debug, Clone)]
pub struct ConvertTask {
    name: String,
    format: OutputFormat,
    config: Arc<PipelineConfig>,
    converter: ConverterConfig,
}

impl ConvertTask {
    /// Create a conversion task; `None` when no converter is configured
    #[must_use]
    pub fn new(name: &str, format: OutputFormat, config: Arc<PipelineConfig>) -> Option<Self> {
        let converter = config.converter.clone()?;
        Some(Self {
            name: name.to_string(),
            format,
            config,
            converter,
        })
    }

    fn output_dir(&self) -> PathBuf {
        match self.format {
            OutputFormat::Html => self.config.html_dir(),
            OutputFormat::Pdf => self.config.pdf_dir(),
        }
    }

    /// Every `-a` attribute passed to the converter, sorted by name.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = self.converter.attributes.clone();
        for (name, dir) in &self.converter.attribute_dirs {
            attrs.insert(name.clone(), dir.display().to_string());
        }
        for artifact in &self.config.generated {
            if let Some(attribute) = &artifact.attribute {
                attrs.insert(attribute.clone(), artifact.output.display().to_string());
            }
        }
        attrs.insert("docs-version".into(), self.config.docs_version());
        attrs.insert("release-branch".into(), self.config.release_branch());
        attrs.insert("revnumber".into(), self.config.project.version.clone());
        attrs.insert("linkToPdf".into(), self.config.upload_pdfs().to_string());
        attrs.insert("outdir".into(), self.output_dir().display().to_string());
        attrs
    }

    fn resource_patterns(&self) -> Vec<String> {
        let mut patterns = self.converter.resources.clone();
        if self.format == OutputFormat::Html {
            patterns.extend(self.converter.html_resources.iter().cloned());
        }
        patterns
    }

    /// The converter command for the given source documents.
    #[must_use]
    pub fn command(&self, sources: &[PathBuf]) -> CommandSpec {
        let backend_args = match self.format {
            OutputFormat::Html => &self.converter.html_args,
            OutputFormat::Pdf => &self.converter.pdf_args,
        };
        let mut args: Vec<String> = backend_args.clone();
        args.push("-D".into());
        args.push(self.output_dir().display().to_string());
        args.push("-R".into());
        args.push(self.converter.source_dir.display().to_string());
        for (key, value) in self.attributes() {
            args.push("-a".into());
            args.push(format!("{key}={value}"));
        }
        args.extend(sources.iter().map(|p| p.display().to_string()));
        CommandSpec::new(&self.converter.program)
            .with_args(args)
            .in_dir(&self.config.project_root)
    }

    fn sources(&self) -> Result<Vec<PathBuf>> {
        let set = build_globset(std::slice::from_ref(&self.converter.source_pattern))?;
        Ok(matching_files(&self.converter.source_dir, &set)?
            .into_iter()
            .map(|rel| self.converter.source_dir.join(rel))
            .collect())
    }
}

impl Task for ConvertTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!(
            "Converts {} to {}",
            self.converter.source_dir.display(),
            self.format
        )
    }

    fn inputs(&self) -> Vec<FingerprintInput> {
        let mut inputs = vec![
            FingerprintInput::Directory(self.converter.source_dir.clone()),
            FingerprintInput::value("command", self.command(&[]).render()),
            FingerprintInput::value("resources", self.resource_patterns().join(",")),
            FingerprintInput::value("source_pattern", &self.converter.source_pattern),
        ];
        inputs.extend(
            self.converter
                .attribute_dirs
                .values()
                .cloned()
                .map(FingerprintInput::Directory),
        );
        inputs.extend(
            self.config
                .generated
                .iter()
                .map(|g| FingerprintInput::File(g.output.clone())),
        );
        inputs
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.output_dir()]
    }

    fn run(&self) -> Result<()> {
        let sources = self.sources()?;
        if sources.is_empty() {
            return Err(Error::configuration(format!(
                "no documents matching '{}' under {}",
                self.converter.source_pattern,
                self.converter.source_dir.display()
            )));
        }

        let out = self.output_dir();
        remove_dir_if_exists(&out)?;
        std::fs::create_dir_all(&out).map_err(|e| Error::io(e, &out, "create_dir_all"))?;

        tracing::info!(format = %self.format, documents = sources.len(), "Converting documents");
        run_captured(&self.command(&sources))?;

        let copied = copy_matching(&self.converter.source_dir, &out, &self.resource_patterns())?;
        tracing::debug!(copied, "Copied conversion resources");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const CONFIG: &str = r#"
[project]
name = "JUnit"
version = "5.4.0-SNAPSHOT"

[api_docs]
program = "javadoc"

[converter]
program = "asciidoctor"
source_dir = "docs/src"
html_resources = ["tocbot-*/**"]

[converter.attributes]
tabsize = "4"

[[generated]]
name = "generate-console-launcher-options"
output = "build/generated/console-launcher-options.txt"
attribute = "consoleLauncherOptionsFile"
program = "java"
"#;

    fn config() -> Arc<PipelineConfig> {
        Arc::new(PipelineConfig::from_toml(CONFIG, Path::new("/repo")).unwrap())
    }

    #[test]
    fn derived_attributes_follow_version() {
        let task = ConvertTask::new("render-html", OutputFormat::Html, config()).unwrap();
        let attrs = task.attributes();
        assert_eq!(attrs["docs-version"], "snapshot");
        assert_eq!(attrs["release-branch"], "main");
        assert_eq!(attrs["revnumber"], "5.4.0-SNAPSHOT");
        assert_eq!(attrs["linkToPdf"], "false");
        assert_eq!(attrs["outdir"], "/repo/build/docs/html");
        assert_eq!(attrs["tabsize"], "4");
        assert_eq!(
            attrs["consoleLauncherOptionsFile"],
            "/repo/build/generated/console-launcher-options.txt"
        );
    }

    #[test]
    fn command_passes_attributes_and_sources() {
        let task = ConvertTask::new("render-pdf", OutputFormat::Pdf, config()).unwrap();
        let spec = task.command(&[PathBuf::from("/repo/docs/src/user-guide/index.adoc")]);
        assert_eq!(spec.program, "asciidoctor");
        let args = spec.args.join(" ");
        assert!(args.starts_with("-r asciidoctor-pdf -b pdf -D /repo/build/docs/pdf -R /repo/docs/src"));
        assert!(args.contains("-a docs-version=snapshot"));
        assert!(args.ends_with("/repo/docs/src/user-guide/index.adoc"));
    }

    #[test]
    fn html_copies_extra_resources() {
        let html = ConvertTask::new("render-html", OutputFormat::Html, config()).unwrap();
        let pdf = ConvertTask::new("render-pdf", OutputFormat::Pdf, config()).unwrap();
        assert!(html.resource_patterns().contains(&"tocbot-*/**".to_string()));
        assert!(!pdf.resource_patterns().contains(&"tocbot-*/**".to_string()));
    }

    #[test]
    fn generated_outputs_are_inputs() {
        let task = ConvertTask::new("render-html", OutputFormat::Html, config()).unwrap();
        assert!(task.inputs().contains(&FingerprintInput::File(PathBuf::from(
            "/repo/build/generated/console-launcher-options.txt"
        ))));
    }

    #[test]
    fn missing_converter_yields_no_task() {
        let content = CONFIG.split("[converter]").next().unwrap();
        let config = Arc::new(PipelineConfig::from_toml(content, Path::new("/repo")).unwrap());
        assert!(ConvertTask::new("render-html", OutputFormat::Html, config).is_none());
    }

    #[test]
    fn no_sources_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Arc::new(PipelineConfig::from_toml(CONFIG, tmp.path()).unwrap());
        std::fs::create_dir_all(tmp.path().join("docs/src")).unwrap();
        let task = ConvertTask::new("render-html", OutputFormat::Html, config).unwrap();
        assert!(matches!(task.run(), Err(Error::Configuration { .. })));
    }
}

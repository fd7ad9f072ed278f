//! Pipeline configuration loaded from `docpipe.toml`.
//!
//! The configuration is parsed once, validated eagerly and then shared
//! read-only (behind an `Arc`) with every task. Relative paths are resolved
//! against the directory containing the configuration file.

use crate::runner::CommandSpec;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Version suffix marking a pre-release snapshot build.
pub const SNAPSHOT_MARKER: &str = "SNAPSHOT";

/// Alias directory that points at the latest stable documentation.
pub const CURRENT_DOCS_ALIAS: &str = "current";

/// Project identity and version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Human-readable project name, used in titles and commit messages
    pub name: String,
    /// Release version, e.g. `5.4.0` or `5.4.0-SNAPSHOT`
    pub version: String,
    /// Short description; used as the API docs header when none is given
    #[serde(default)]
    pub description: Option<String>,
    /// Build directory for every generated artifact
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,
    /// Branch that snapshot documentation links to
    #[serde(default = "default_main_branch")]
    pub main_branch: String,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_main_branch() -> String {
    "main".to_string()
}

/// One module whose sources feed the aggregated API documentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ModuleDescriptor {
    /// Module name, e.g. `org.junit.jupiter.api`
    pub name: String,
    /// Main source roots
    #[serde(default)]
    pub main_sources: Vec<PathBuf>,
    /// Test source roots; inputs of the module build
    #[serde(default)]
    pub test_sources: Vec<PathBuf>,
    /// Root holding the module declaration, for `--module-source-path`
    #[serde(default)]
    pub module_source: Option<PathBuf>,
    /// Compiled output (jar or class directory) placed on the module path
    pub compiled: PathBuf,
    /// Command that produces `compiled`; when absent the output must already exist
    #[serde(default)]
    pub build: Option<CommandSpec>,
}

/// A module documented elsewhere, linked through its element list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalModule {
    /// Module name
    pub name: String,
    /// Base URL of the published documentation, ending in `/`
    pub base_url: String,
}

impl ExternalModule {
    /// URL of the remote element list
    #[must_use]
    pub fn element_list_url(&self) -> String {
        format!("{}element-list", self.base_url)
    }
}

/// Access level passed to the API-doc tool.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberLevel {
    /// Public members only
    Public,
    /// Public and protected members
    #[default]
    Protected,
    /// Package-private and above
    Package,
    /// Everything
    Private,
}

impl MemberLevel {
    /// Command line flag for this level
    #[must_use]
    pub const fn flag(self) -> &'static str {
        match self {
            Self::Public => "-public",
            Self::Protected => "-protected",
            Self::Package => "-package",
            Self::Private => "-private",
        }
    }
}

/// Options for the aggregated API documentation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ApiDocsConfig {
    /// API-doc program to invoke
    pub program: String,
    /// Window and page title; defaults to `<name> <version> API`
    #[serde(default)]
    pub title: Option<String>,
    /// Page header; defaults to the project description
    #[serde(default)]
    pub header: Option<String>,
    /// Overview HTML file
    #[serde(default)]
    pub overview: Option<PathBuf>,
    /// Additional stylesheet
    #[serde(default)]
    pub stylesheet: Option<PathBuf>,
    /// Member visibility level
    #[serde(default)]
    pub member_level: MemberLevel,
    /// Source encoding
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Output locale
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Online documentation to link against
    #[serde(default)]
    pub links: Vec<String>,
    /// Custom block tags, `name:placement:header`
    #[serde(default)]
    pub tags: Vec<String>,
    /// Named groups of module/package patterns, e.g. `Jupiter = ["org.junit.jupiter*"]`
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
    /// Extra modules to resolve
    #[serde(default)]
    pub add_modules: Vec<String>,
    /// Extra read edges, module → module it reads
    #[serde(default)]
    pub add_reads: BTreeMap<String, String>,
    /// Third-party entries appended to the module path
    #[serde(default)]
    pub module_path: Vec<PathBuf>,
    /// Free-form options appended verbatim
    #[serde(default)]
    pub extra_options: Vec<String>,
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

/// Settings for rewriting the generated API documentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct FixLinksConfig {
    /// Tag injected right after `<head>`; nothing is injected when absent
    #[serde(default)]
    pub favicon: Option<String>,
}

/// A text artifact produced from a command's standard output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "GeneratedArtifactTable")]
pub struct GeneratedArtifact {
    /// Task name, e.g. `generate-console-launcher-options`
    pub name: String,
    /// File the captured output is written to
    pub output: PathBuf,
    /// Conversion attribute that receives the output path
    pub attribute: Option<String>,
    /// Names of tasks that must run first, e.g. the build of a classpath entry
    pub depends_on: Vec<String>,
    /// Command to run
    #[serde(flatten)]
    pub command: CommandSpec,
}

/// `[[generated]]` table; command keys sit beside the artifact keys.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GeneratedArtifactTable {
    name: String,
    output: PathBuf,
    #[serde(default)]
    attribute: Option<String>,
    #[serde(default)]
    depends_on: Vec<String>,
    program: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    classpath: Vec<PathBuf>,
    #[serde(default)]
    system_properties: BTreeMap<String, String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    working_dir: Option<PathBuf>,
}

impl From<GeneratedArtifactTable> for GeneratedArtifact {
    fn from(table: GeneratedArtifactTable) -> Self {
        Self {
            name: table.name,
            output: table.output,
            attribute: table.attribute,
            depends_on: table.depends_on,
            command: CommandSpec {
                program: table.program,
                args: table.args,
                classpath: table.classpath,
                system_properties: table.system_properties,
                env: table.env,
                working_dir: table.working_dir,
            },
        }
    }
}

/// Document converter settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConverterConfig {
    /// Converter program
    pub program: String,
    /// Directory holding the prose sources
    pub source_dir: PathBuf,
    /// Which sources to convert, relative to `source_dir`
    #[serde(default = "default_source_pattern")]
    pub source_pattern: String,
    /// Backend arguments for HTML output
    #[serde(default = "default_html_args")]
    pub html_args: Vec<String>,
    /// Backend arguments for PDF output
    #[serde(default = "default_pdf_args")]
    pub pdf_args: Vec<String>,
    /// Resources copied next to every conversion output
    #[serde(default = "default_resources")]
    pub resources: Vec<String>,
    /// Resources copied only next to the HTML output
    #[serde(default)]
    pub html_resources: Vec<String>,
    /// Fixed attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Attributes naming directories; those directories are also inputs
    #[serde(default)]
    pub attribute_dirs: BTreeMap<String, PathBuf>,
}

fn default_source_pattern() -> String {
    "**/index.adoc".to_string()
}

fn default_html_args() -> Vec<String> {
    vec!["-b".to_string(), "html5".to_string()]
}

fn default_pdf_args() -> Vec<String> {
    vec![
        "-r".to_string(),
        "asciidoctor-pdf".to_string(),
        "-b".to_string(),
        "pdf".to_string(),
    ]
}

fn default_resources() -> Vec<String> {
    vec![
        "**/images/**/*.png".to_string(),
        "**/images/**/*.svg".to_string(),
    ]
}

/// What ends up in the versioned publish directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    /// Patterns copied from the HTML conversion output
    #[serde(default = "default_package_includes")]
    pub includes: Vec<String>,
    /// Checksum file copied into the version directory when present
    #[serde(default)]
    pub checksum_file: Option<PathBuf>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            includes: default_package_includes(),
            checksum_file: None,
        }
    }
}

fn default_package_includes() -> Vec<String> {
    vec![
        "user-guide/**".to_string(),
        "release-notes/**".to_string(),
        "tocbot-*/**".to_string(),
    ]
}

/// Remote the packaged tree is pushed to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    /// Remote repository URL (or local path)
    pub repository: String,
    /// Hosting branch
    #[serde(default = "default_publish_branch")]
    pub branch: String,
    /// Commit author name
    #[serde(default)]
    pub author_name: Option<String>,
    /// Commit author email
    #[serde(default)]
    pub author_email: Option<String>,
    /// Commit message; `{version}` is replaced by the docs version
    #[serde(default)]
    pub message: Option<String>,
}

fn default_publish_branch() -> String {
    "gh-pages".to_string()
}

/// A free-form command task declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "CommandTaskTable")]
pub struct CommandTaskConfig {
    /// Task name
    pub name: String,
    /// Names of tasks that must run first
    pub depends_on: Vec<String>,
    /// Input files
    pub input_files: Vec<PathBuf>,
    /// Input directories
    pub input_dirs: Vec<PathBuf>,
    /// Declared outputs
    pub outputs: Vec<PathBuf>,
    /// Whether an up-to-date run may be skipped
    pub cache: bool,
    /// Command to run
    #[serde(flatten)]
    pub command: CommandSpec,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandTaskTable {
    name: String,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    input_files: Vec<PathBuf>,
    #[serde(default)]
    input_dirs: Vec<PathBuf>,
    #[serde(default)]
    outputs: Vec<PathBuf>,
    #[serde(default = "default_true")]
    cache: bool,
    program: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    classpath: Vec<PathBuf>,
    #[serde(default)]
    system_properties: BTreeMap<String, String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    working_dir: Option<PathBuf>,
}

impl From<CommandTaskTable> for CommandTaskConfig {
    fn from(table: CommandTaskTable) -> Self {
        Self {
            name: table.name,
            depends_on: table.depends_on,
            input_files: table.input_files,
            input_dirs: table.input_dirs,
            outputs: table.outputs,
            cache: table.cache,
            command: CommandSpec {
                program: table.program,
                args: table.args,
                classpath: table.classpath,
                system_properties: table.system_properties,
                env: table.env,
                working_dir: table.working_dir,
            },
        }
    }
}

fn default_true() -> bool {
    true
}

/// On-disk form of `docpipe.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    project: ProjectConfig,
    #[serde(default)]
    modules: Vec<ModuleDescriptor>,
    #[serde(default)]
    external_modules: BTreeMap<String, String>,
    api_docs: ApiDocsConfig,
    #[serde(default)]
    fix_links: FixLinksConfig,
    #[serde(default)]
    generated: Vec<GeneratedArtifact>,
    #[serde(default)]
    converter: Option<ConverterConfig>,
    #[serde(default)]
    package: PackageConfig,
    #[serde(default)]
    publish: Option<PublishConfig>,
    #[serde(default)]
    commands: Vec<CommandTaskConfig>,
}

/// Immutable configuration shared by every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Directory all relative paths were resolved against
    pub project_root: PathBuf,
    /// Project identity
    pub project: ProjectConfig,
    /// Aggregated modules
    pub modules: Vec<ModuleDescriptor>,
    /// Modules linked through downloaded element lists, sorted by name
    pub external_modules: Vec<ExternalModule>,
    /// API docs options
    pub api_docs: ApiDocsConfig,
    /// Link fixing options
    pub fix_links: FixLinksConfig,
    /// Captured text artifacts
    pub generated: Vec<GeneratedArtifact>,
    /// Document converter, if prose docs are built
    pub converter: Option<ConverterConfig>,
    /// Packaging options
    pub package: PackageConfig,
    /// Publishing target, if any
    pub publish: Option<PublishConfig>,
    /// Free-form command tasks
    pub commands: Vec<CommandTaskConfig>,
    /// Whether the `current` alias is replaced by this build
    pub replace_current_docs: bool,
}

impl PipelineConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read and a configuration
    /// error if it cannot be parsed or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self::from_toml(&content, &root)
    }

    /// Parse and validate configuration text, resolving paths against `project_root`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if parsing or validation fails.
    pub fn from_toml(content: &str, project_root: &Path) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content).map_err(|e| {
            Error::configuration_with_help(
                format!("Failed to parse docpipe.toml: {e}"),
                "Check the file against docpipe.example.toml",
            )
        })?;
        let config = Self::from_raw(raw, project_root);
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawConfig, root: &Path) -> Self {
        let abs = |p: &Path| -> PathBuf {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };
        let abs_all = |v: &[PathBuf]| v.iter().map(|p| abs(p)).collect::<Vec<_>>();
        let abs_command = |c: &CommandSpec| CommandSpec {
            classpath: abs_all(&c.classpath),
            working_dir: Some(c.working_dir.as_deref().map_or_else(|| root.to_path_buf(), abs)),
            ..c.clone()
        };

        let mut project = raw.project;
        project.build_dir = abs(&project.build_dir);

        let modules = raw
            .modules
            .iter()
            .map(|m| ModuleDescriptor {
                name: m.name.clone(),
                main_sources: abs_all(&m.main_sources),
                test_sources: abs_all(&m.test_sources),
                module_source: m.module_source.as_deref().map(abs),
                compiled: abs(&m.compiled),
                build: m.build.as_ref().map(abs_command),
            })
            .collect();

        let external_modules = raw
            .external_modules
            .into_iter()
            .map(|(name, base_url)| ExternalModule { name, base_url })
            .collect();

        let mut api_docs = raw.api_docs;
        api_docs.overview = api_docs.overview.as_deref().map(abs);
        api_docs.stylesheet = api_docs.stylesheet.as_deref().map(abs);
        api_docs.module_path = abs_all(&api_docs.module_path);

        let generated = raw
            .generated
            .iter()
            .map(|g| GeneratedArtifact {
                output: abs(&g.output),
                command: abs_command(&g.command),
                ..g.clone()
            })
            .collect();

        let converter = raw.converter.map(|c| ConverterConfig {
            source_dir: abs(&c.source_dir),
            attribute_dirs: c
                .attribute_dirs
                .iter()
                .map(|(k, v)| (k.clone(), abs(v)))
                .collect(),
            ..c
        });

        let mut package = raw.package;
        package.checksum_file = package.checksum_file.as_deref().map(abs);

        let commands = raw
            .commands
            .iter()
            .map(|c| CommandTaskConfig {
                input_files: abs_all(&c.input_files),
                input_dirs: abs_all(&c.input_dirs),
                outputs: abs_all(&c.outputs),
                command: abs_command(&c.command),
                ..c.clone()
            })
            .collect();

        Self {
            project_root: root.to_path_buf(),
            project,
            modules,
            external_modules,
            api_docs,
            fix_links: raw.fix_links,
            generated,
            converter,
            package,
            publish: raw.publish,
            commands,
            replace_current_docs: false,
        }
    }

    /// Return a copy with the `current` alias replacement flag set.
    #[must_use]
    pub fn with_replace_current_docs(mut self, replace: bool) -> Self {
        self.replace_current_docs = replace;
        self
    }

    /// Validate invariants that must hold before any task is created.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.project.version.trim().is_empty() {
            return Err(Error::configuration("project.version must not be empty"));
        }

        let bad_urls: Vec<String> = self
            .external_modules
            .iter()
            .filter(|m| !m.base_url.ends_with('/'))
            .map(|m| format!("{} = {}", m.name, m.base_url))
            .collect();
        if !bad_urls.is_empty() {
            return Err(Error::configuration_with_help(
                format!(
                    "all base URLs must end with a trailing slash: {}",
                    bad_urls.join(", ")
                ),
                "Append '/' to every external_modules URL",
            ));
        }

        let mut names = BTreeSet::new();
        for module in &self.modules {
            if module.name.trim().is_empty() {
                return Err(Error::configuration("module name must not be empty"));
            }
            if !names.insert(module.name.as_str()) {
                return Err(Error::configuration(format!(
                    "module '{}' is declared more than once",
                    module.name
                )));
            }
        }

        let mut task_names = BTreeSet::new();
        for name in self
            .generated
            .iter()
            .map(|g| g.name.as_str())
            .chain(self.commands.iter().map(|c| c.name.as_str()))
        {
            if !task_names.insert(name) {
                return Err(Error::configuration(format!(
                    "task '{name}' is declared more than once"
                )));
            }
        }

        if let Some(publish) = &self.publish
            && publish.author_name.is_some() != publish.author_email.is_some()
        {
            return Err(Error::configuration(
                "publish.author_name and publish.author_email must be set together",
            ));
        }

        Ok(())
    }

    /// Whether this is a pre-release snapshot build.
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        self.project.version.contains(SNAPSHOT_MARKER)
    }

    /// Directory name of this build's documentation: `snapshot` or the version.
    #[must_use]
    pub fn docs_version(&self) -> String {
        docs_version_label(&self.project.version)
    }

    /// Branch the documentation refers to for sources.
    #[must_use]
    pub fn release_branch(&self) -> String {
        if self.is_snapshot() {
            self.project.main_branch.clone()
        } else {
            format!("r{}", self.project.version)
        }
    }

    /// PDFs are only published for releases.
    #[must_use]
    pub fn upload_pdfs(&self) -> bool {
        !self.is_snapshot()
    }

    /// Output of the aggregated API docs run.
    #[must_use]
    pub fn api_docs_dir(&self) -> PathBuf {
        self.project.build_dir.join("docs/api")
    }

    /// Output of the link-fixing pass.
    #[must_use]
    pub fn fixed_api_docs_dir(&self) -> PathBuf {
        self.project.build_dir.join("docs/fixed-api")
    }

    /// Cache of downloaded element lists.
    #[must_use]
    pub fn element_lists_dir(&self) -> PathBuf {
        self.project.build_dir.join("element-lists")
    }

    /// Element list cache entry of one external module.
    #[must_use]
    pub fn element_list_path(&self, module: &str) -> PathBuf {
        self.element_lists_dir().join(module).join("element-list")
    }

    /// Output of the HTML conversion.
    #[must_use]
    pub fn html_dir(&self) -> PathBuf {
        self.project.build_dir.join("docs/html")
    }

    /// Output of the PDF conversion.
    #[must_use]
    pub fn pdf_dir(&self) -> PathBuf {
        self.project.build_dir.join("docs/pdf")
    }

    /// Root of the publish-ready tree.
    #[must_use]
    pub fn publish_root(&self) -> PathBuf {
        self.project.build_dir.join("ghpages-docs")
    }

    /// Versioned directory inside the publish-ready tree.
    #[must_use]
    pub fn versioned_docs_dir(&self) -> PathBuf {
        self.publish_root().join(self.docs_version())
    }

    /// `current` alias directory inside the publish-ready tree.
    #[must_use]
    pub fn current_docs_dir(&self) -> PathBuf {
        self.publish_root().join(CURRENT_DOCS_ALIAS)
    }

    /// Local clone used for publishing.
    #[must_use]
    pub fn git_publish_dir(&self) -> PathBuf {
        self.project.build_dir.join("git-publish")
    }

    /// External modules rendered as one stable string, for fingerprints.
    #[must_use]
    pub fn external_modules_fingerprint(&self) -> String {
        self.external_modules
            .iter()
            .map(|m| format!("{}={}", m.name, m.base_url))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Docs directory label for a version: `snapshot` for snapshots, else the version.
#[must_use]
pub fn docs_version_label(version: &str) -> String {
    if version.contains(SNAPSHOT_MARKER) {
        "snapshot".to_string()
    } else {
        version.to_string()
    }
}

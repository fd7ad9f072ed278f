//! Publishing the packaged tree to a branch of a remote git repository.
//!
//! Only `docs/<docsVersion>/` (and `docs/current/` when replacing the alias)
//! are rewritten; everything else already on the branch is left alone.

use crate::config::{CURRENT_DOCS_ALIAS, PipelineConfig};
use crate::copy::{copy_tree, remove_dir_if_exists};
use crate::runner::{CommandSpec, run_captured};
use crate::tasks::{CachePolicy, Task};
use crate::{Error, Result};
use docpipe_cache::FingerprintInput;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

const DOCS_DIR: &str = "docs";
const DEFAULT_AUTHOR_NAME: &str = "docpipe";
const DEFAULT_AUTHOR_EMAIL: &str = "docpipe@localhost";

/// Which published paths this run owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreserveRules {
    docs_version: String,
    replace_current: bool,
}

impl PreserveRules {
    /// Rules for publishing `docs_version`, optionally replacing `current`
    #[must_use]
    pub fn new(docs_version: impl Into<String>, replace_current: bool) -> Self {
        Self {
            docs_version: docs_version.into(),
            replace_current,
        }
    }

    /// Directory labels under `docs/` written by this run
    #[must_use]
    pub fn owned_labels(&self) -> Vec<&str> {
        let mut labels = vec![self.docs_version.as_str()];
        if self.replace_current {
            labels.push(CURRENT_DOCS_ALIAS);
        }
        labels
    }

    /// Whether a repository-relative path survives the publish untouched
    #[must_use]
    pub fn is_preserved(&self, rel: &Path) -> bool {
        !self
            .owned_labels()
            .iter()
            .any(|label| rel.starts_with(Path::new(DOCS_DIR).join(label)))
    }
}

/// Result of a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A commit was created and pushed
    Pushed {
        /// Hash of the pushed commit
        commit: String,
    },
    /// The branch already held exactly this content
    NoChanges,
}

/// Drives the git CLI inside a local working clone.
#[derive(Debug, Clone)]
pub struct Publisher {
    git: String,
    work_dir: PathBuf,
    repository: String,
    branch: String,
    author_name: String,
    author_email: String,
}

impl Publisher {
    /// Create a publisher working in `work_dir`
    #[must_use]
    pub fn new(
        work_dir: impl Into<PathBuf>,
        repository: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            git: "git".to_string(),
            work_dir: work_dir.into(),
            repository: repository.into(),
            branch: branch.into(),
            author_name: DEFAULT_AUTHOR_NAME.to_string(),
            author_email: DEFAULT_AUTHOR_EMAIL.to_string(),
        }
    }

    /// Set the commit author
    #[must_use]
    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    fn git<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = CommandSpec::new(&self.git)
            .with_args(args)
            .in_dir(&self.work_dir);
        let out = run_captured(&spec)?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    fn prepare_clone(&self) -> Result<()> {
        std::fs::create_dir_all(&self.work_dir)
            .map_err(|e| Error::io(e, &self.work_dir, "create_dir_all"))?;
        if self.work_dir.join(".git").exists() {
            self.git(["remote", "set-url", "origin", self.repository.as_str()])?;
        } else {
            self.git(["init", "-q"])?;
            self.git(["remote", "add", "origin", self.repository.as_str()])?;
        }

        let branch_ref = format!("refs/heads/{}", self.branch);
        let heads = self.git(["ls-remote", "--heads", "origin", branch_ref.as_str()])?;
        if heads.is_empty() {
            tracing::info!(branch = %self.branch, "Remote branch missing; starting orphan branch");
            let _ = self.git(["update-ref", "-d", branch_ref.as_str()]);
            self.git(["symbolic-ref", "HEAD", branch_ref.as_str()])?;
            self.git(["rm", "-r", "-q", "-f", "--ignore-unmatch", "."])?;
        } else {
            self.git(["fetch", "-q", "--depth", "1", "origin", branch_ref.as_str()])?;
            self.git(["checkout", "-q", "-f", "-B", self.branch.as_str(), "FETCH_HEAD"])?;
        }
        self.git(["clean", "-q", "-f", "-d", "-x"])?;
        Ok(())
    }

    fn prune(&self, rules: &PreserveRules) -> Result<()> {
        let doomed: Vec<PathBuf> = WalkDir::new(&self.work_dir)
            .min_depth(1)
            .max_depth(2)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
            .filter_map(std::result::Result::ok)
            .filter_map(|e| {
                let rel = e.path().strip_prefix(&self.work_dir).ok()?.to_path_buf();
                (!rules.is_preserved(&rel)).then(|| e.path().to_path_buf())
            })
            .collect();
        for path in doomed {
            tracing::debug!(path = %path.display(), "Removing previously published docs");
            if path.is_dir() {
                remove_dir_if_exists(&path)?;
            } else {
                std::fs::remove_file(&path).map_err(|e| Error::io(e, &path, "remove"))?;
            }
        }
        Ok(())
    }

    /// Publish the owned directories of `publish_root` under `docs/`.
    ///
    /// # Errors
    ///
    /// Returns an execution error if any git command fails (including a
    /// rejected push) and an I/O error if the working clone cannot be updated.
    pub fn publish(
        &self,
        publish_root: &Path,
        rules: &PreserveRules,
        message: &str,
    ) -> Result<PublishOutcome> {
        let _span = tracing::info_span!("publish", branch = %self.branch).entered();
        self.prepare_clone()?;
        self.prune(rules)?;

        for label in rules.owned_labels() {
            let src = publish_root.join(label);
            let copied = copy_tree(&src, &self.work_dir.join(DOCS_DIR).join(label))?;
            tracing::debug!(label, copied, "Staged docs");
        }

        self.git(["add", "-A"])?;
        if self.git(["status", "--porcelain"])?.is_empty() {
            tracing::info!("Published docs are unchanged; nothing to commit");
            return Ok(PublishOutcome::NoChanges);
        }

        let name = format!("user.name={}", self.author_name);
        let email = format!("user.email={}", self.author_email);
        self.git([
            "-c",
            name.as_str(),
            "-c",
            email.as_str(),
            "commit",
            "-q",
            "-m",
            message,
        ])?;
        let commit = self.git(["rev-parse", "HEAD"])?;
        let refspec = format!("HEAD:refs/heads/{}", self.branch);
        self.git(["push", "-q", "origin", refspec.as_str()])?;
        tracing::info!(%commit, "Pushed docs");
        Ok(PublishOutcome::Pushed { commit })
    }
}

/// `publish-docs`.
#[derive(Debug, Clone)]
pub struct PublishTask {
    name: String,
    config: Arc<PipelineConfig>,
}

impl PublishTask {
    /// Create the publish task
    #[must_use]
    pub fn new(name: &str, config: Arc<PipelineConfig>) -> Self {
        Self {
            name: name.to_string(),
            config,
        }
    }

    fn message(&self) -> String {
        let version = self.config.docs_version();
        self.config
            .publish
            .as_ref()
            .and_then(|p| p.message.clone())
            .map_or_else(
                || format!("Publish {} docs {version}", self.config.project.name),
                |m| m.replace("{version}", &version),
            )
    }
}

impl Task for PublishTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        self.config.publish.as_ref().map_or_else(
            || "Publishes docs (no [publish] section configured)".to_string(),
            |p| format!("Publishes docs to {} ({})", p.repository, p.branch),
        )
    }

    fn inputs(&self) -> Vec<FingerprintInput> {
        vec![FingerprintInput::Directory(self.config.versioned_docs_dir())]
    }

    fn outputs(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Never
    }

    fn run(&self) -> Result<()> {
        let publish = self.config.publish.as_ref().ok_or_else(|| {
            Error::configuration_with_help(
                "publishing requires a [publish] section",
                "Add [publish] with at least a repository URL",
            )
        })?;
        let mut publisher = Publisher::new(
            self.config.git_publish_dir(),
            &publish.repository,
            &publish.branch,
        );
        if let (Some(name), Some(email)) = (&publish.author_name, &publish.author_email) {
            publisher = publisher.with_author(name, email);
        }
        let rules = PreserveRules::new(
            self.config.docs_version(),
            self.config.replace_current_docs,
        );
        match publisher.publish(&self.config.publish_root(), &rules, &self.message())? {
            PublishOutcome::Pushed { commit } => {
                tracing::info!(%commit, repository = %publish.repository, "Docs published");
            }
            PublishOutcome::NoChanges => tracing::info!("Docs already up to date on remote"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserve_rules_without_replace() {
        let rules = PreserveRules::new("5.4.0", false);
        assert!(!rules.is_preserved(Path::new("docs/5.4.0")));
        assert!(!rules.is_preserved(Path::new("docs/5.4.0/api/index.html")));
        assert!(rules.is_preserved(Path::new("docs/current/index.html")));
        assert!(rules.is_preserved(Path::new("docs/5.3.0/index.html")));
        assert!(rules.is_preserved(Path::new("docs/5.4.0-M1")));
        assert!(rules.is_preserved(Path::new("index.html")));
        assert!(rules.is_preserved(Path::new("docs")));
    }

    #[test]
    fn preserve_rules_with_replace() {
        let rules = PreserveRules::new("snapshot", true);
        assert!(!rules.is_preserved(Path::new("docs/current/index.html")));
        assert!(!rules.is_preserved(Path::new("docs/snapshot")));
        assert_eq!(rules.owned_labels(), vec!["snapshot", "current"]);
    }

    #[test]
    fn message_template_substitutes_version() {
        let content = r#"
[project]
name = "JUnit"
version = "5.4.0"

[api_docs]
program = "javadoc"

[publish]
repository = "/tmp/docs.git"
message = "Update docs for {version}"
"#;
        let config = Arc::new(PipelineConfig::from_toml(content, Path::new("/repo")).unwrap());
        let task = PublishTask::new("publish-docs", config);
        assert_eq!(task.message(), "Update docs for 5.4.0");
        assert_eq!(task.cache_policy(), CachePolicy::Never);
    }
}

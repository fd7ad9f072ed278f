//! Assembly of the publish-ready documentation tree.

use super::Task;
use crate::config::PipelineConfig;
use crate::copy::{copy_file, copy_matching, copy_tree, remove_dir_if_exists};
use crate::{Error, Result};
use docpipe_cache::FingerprintInput;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PDF_PATTERN: &str = "**/*.pdf";
const API_DIR: &str = "api";

fn recreate_dir(dir: &Path) -> Result<()> {
    remove_dir_if_exists(dir)?;
    std::fs::create_dir_all(dir).map_err(|e| Error::io(e, dir, "create_dir_all"))
}

/// `prepare-docs`: fills `<publishRoot>/<docsVersion>/`.
#[derive(Debug, Clone)]
pub struct PackageTask {
    name: String,
    config: Arc<PipelineConfig>,
}

impl PackageTask {
    /// Create the packaging task
    #[must_use]
    pub fn new(name: &str, config: Arc<PipelineConfig>) -> Self {
        Self {
            name: name.to_string(),
            config,
        }
    }
}

impl Task for PackageTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!(
            "Packages docs into {}",
            self.config.versioned_docs_dir().display()
        )
    }

    fn inputs(&self) -> Vec<FingerprintInput> {
        let config = &self.config;
        let mut inputs = vec![
            FingerprintInput::Directory(config.html_dir()),
            FingerprintInput::Directory(config.fixed_api_docs_dir()),
            FingerprintInput::value("includes", config.package.includes.join(",")),
            FingerprintInput::value("upload_pdfs", config.upload_pdfs()),
        ];
        if config.upload_pdfs() {
            inputs.push(FingerprintInput::Directory(config.pdf_dir()));
        }
        if let Some(checksum) = &config.package.checksum_file {
            inputs.push(FingerprintInput::File(checksum.clone()));
        }
        inputs
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.config.versioned_docs_dir()]
    }

    fn run(&self) -> Result<()> {
        let config = &self.config;
        let dest = config.versioned_docs_dir();
        recreate_dir(&dest)?;

        let html = copy_matching(&config.html_dir(), &dest, &config.package.includes)?;
        let pdfs = if config.upload_pdfs() {
            copy_matching(&config.pdf_dir(), &dest, &[PDF_PATTERN.to_string()])?
        } else {
            0
        };
        let api = copy_tree(&config.fixed_api_docs_dir(), &dest.join(API_DIR))?;

        if let Some(checksum) = &config.package.checksum_file {
            match checksum.file_name() {
                Some(file_name) if checksum.is_file() => {
                    copy_file(checksum, &dest.join(file_name))?;
                }
                _ => tracing::debug!(path = %checksum.display(), "No checksum file to package"),
            }
        }

        tracing::info!(
            version = %config.docs_version(),
            html,
            pdfs,
            api,
            "Packaged documentation"
        );
        Ok(())
    }
}

/// `create-current-docs`: mirrors the version directory into `current`.
#[derive(Debug, Clone)]
pub struct CurrentDocsTask {
    name: String,
    config: Arc<PipelineConfig>,
}

impl CurrentDocsTask {
    /// Create the alias task
    #[must_use]
    pub fn new(name: &str, config: Arc<PipelineConfig>) -> Self {
        Self {
            name: name.to_string(),
            config,
        }
    }
}

impl Task for CurrentDocsTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        "Replaces the 'current' docs alias with this version".to_string()
    }

    fn inputs(&self) -> Vec<FingerprintInput> {
        vec![FingerprintInput::Directory(self.config.versioned_docs_dir())]
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.config.current_docs_dir()]
    }

    fn only_if(&self) -> bool {
        self.config.replace_current_docs
    }

    fn run(&self) -> Result<()> {
        let current = self.config.current_docs_dir();
        recreate_dir(&current)?;
        let files = copy_tree(&self.config.versioned_docs_dir(), &current)?;
        tracing::info!(files, version = %self.config.docs_version(), "Replaced current docs");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config(root: &Path, version: &str) -> Arc<PipelineConfig> {
        let content = format!(
            r#"
[project]
name = "JUnit"
version = "{version}"

[api_docs]
program = "javadoc"

[package]
checksum_file = "build/checksum/published-checksum.txt"
"#
        );
        Arc::new(PipelineConfig::from_toml(&content, root).unwrap())
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    fn populate(config: &PipelineConfig) {
        touch(&config.html_dir().join("user-guide/index.html"));
        touch(&config.html_dir().join("release-notes/index.html"));
        touch(&config.html_dir().join("scratch/notes.html"));
        fs::create_dir_all(config.html_dir().join("user-guide/empty")).unwrap();
        touch(&config.pdf_dir().join("user-guide/index.pdf"));
        touch(&config.fixed_api_docs_dir().join("index.html"));
        touch(&config.project.build_dir.join("checksum/published-checksum.txt"));
    }

    #[test]
    fn release_build_includes_pdfs() {
        let tmp = TempDir::new().unwrap();
        let config = config(tmp.path(), "5.4.0");
        populate(&config);
        PackageTask::new("prepare-docs", config.clone()).run().unwrap();

        let dest = tmp.path().join("build/ghpages-docs/5.4.0");
        assert!(dest.join("user-guide/index.html").is_file());
        assert!(dest.join("release-notes/index.html").is_file());
        assert!(dest.join("user-guide/index.pdf").is_file());
        assert!(dest.join("api/index.html").is_file());
        assert!(dest.join("published-checksum.txt").is_file());
        assert!(!dest.join("scratch").exists());
        assert!(!dest.join("user-guide/empty").exists());
    }

    #[test]
    fn snapshot_build_omits_pdfs() {
        let tmp = TempDir::new().unwrap();
        let config = config(tmp.path(), "5.4.0-SNAPSHOT");
        populate(&config);
        PackageTask::new("prepare-docs", config.clone()).run().unwrap();

        let dest = tmp.path().join("build/ghpages-docs/snapshot");
        assert!(dest.join("user-guide/index.html").is_file());
        assert!(!dest.join("user-guide/index.pdf").exists());
    }

    #[test]
    fn destination_is_cleared_first() {
        let tmp = TempDir::new().unwrap();
        let config = config(tmp.path(), "5.4.0");
        populate(&config);
        touch(&config.versioned_docs_dir().join("stale.html"));
        PackageTask::new("prepare-docs", config.clone()).run().unwrap();
        assert!(!config.versioned_docs_dir().join("stale.html").exists());
    }

    #[test]
    fn current_alias_is_gated_and_mirrors_version() {
        let tmp = TempDir::new().unwrap();
        let base = config(tmp.path(), "5.4.0");
        assert!(!CurrentDocsTask::new("create-current-docs", base.clone()).only_if());

        let replacing = Arc::new((*base).clone().with_replace_current_docs(true));
        populate(&replacing);
        PackageTask::new("prepare-docs", replacing.clone()).run().unwrap();
        touch(&replacing.current_docs_dir().join("old.html"));

        let task = CurrentDocsTask::new("create-current-docs", replacing.clone());
        assert!(task.only_if());
        task.run().unwrap();
        let current = replacing.current_docs_dir();
        assert!(current.join("api/index.html").is_file());
        assert!(!current.join("old.html").exists());
    }
}

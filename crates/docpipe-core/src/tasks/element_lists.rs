//! Downloading element lists of externally documented modules.

use super::Task;
use crate::config::{ExternalModule, PipelineConfig};
use crate::materialize::materialize;
use crate::{Error, Result};
use docpipe_cache::FingerprintInput;
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Name of the file next to a cached element list holding its base URL
const ORIGIN_FILE: &str = "base-url";

/// Where element lists come from.
pub trait ElementListSource: Send + Sync + fmt::Debug {
    /// Fetch the body at `url`.
    ///
    /// # Errors
    ///
    /// Returns a network error if the resource cannot be retrieved.
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetches element lists over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpElementListSource {
    client: reqwest::blocking::Client,
}

impl HttpElementListSource {
    /// Build a client with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns a network error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docpipe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::network("<client>", e.to_string()))?;
        Ok(Self { client })
    }
}

impl ElementListSource for HttpElementListSource {
    fn fetch(&self, url: &str) -> Result<String> {
        tracing::debug!(%url, "Fetching element list");
        self.client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(|e| Error::network(url, e.to_string()))
    }
}

/// Content of a cached element list: a `module:` header then the fetched body.
#[must_use]
pub fn element_list_content(module: &str, fetched: &str) -> String {
    format!("module:{module}\n{fetched}")
}

/// Downloads the element list of every external module into the cache.
#[derive(Debug, Clone)]
pub struct DownloadElementListsTask {
    name: String,
    config: Arc<PipelineConfig>,
    source: Arc<dyn ElementListSource>,
}

impl DownloadElementListsTask {
    /// Create the download task
    #[must_use]
    pub fn new(name: &str, config: Arc<PipelineConfig>, source: Arc<dyn ElementListSource>) -> Self {
        Self {
            name: name.to_string(),
            config,
            source,
        }
    }

    fn download(&self, module: &ExternalModule) -> Result<()> {
        let path = self.config.element_list_path(&module.name);
        let origin = origin_path(&path);
        let url = module.element_list_url();
        match self.source.fetch(&url) {
            Ok(body) => {
                materialize(element_list_content(&module.name, &body).as_bytes(), &path)?;
                materialize(module.base_url.as_bytes(), &origin)?;
                Ok(())
            }
            Err(err)
                if path.is_file()
                    && cached_origin(&origin).as_deref() == Some(module.base_url.as_str()) =>
            {
                tracing::warn!(
                    module = %module.name,
                    %url,
                    error = %err,
                    "Using stale cached element list"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Sidecar recording the base URL a cached element list was fetched from
fn origin_path(element_list: &Path) -> PathBuf {
    element_list.with_file_name(ORIGIN_FILE)
}

fn cached_origin(origin: &Path) -> Option<String> {
    std::fs::read_to_string(origin)
        .ok()
        .map(|url| url.trim().to_string())
}

impl Task for DownloadElementListsTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!(
            "Downloads element lists of {} external modules",
            self.config.external_modules.len()
        )
    }

    fn inputs(&self) -> Vec<FingerprintInput> {
        vec![FingerprintInput::value(
            "external_modules",
            self.config.external_modules_fingerprint(),
        )]
    }

    fn outputs(&self) -> Vec<PathBuf> {
        let mut outputs = vec![self.config.element_lists_dir()];
        outputs.extend(
            self.config
                .external_modules
                .iter()
                .map(|m| self.config.element_list_path(&m.name)),
        );
        outputs
    }

    fn run(&self) -> Result<()> {
        let dir = self.config.element_lists_dir();
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(e, &dir, "create_dir_all"))?;

        let results: Vec<Result<()>> = self
            .config
            .external_modules
            .par_iter()
            .map(|module| self.download(module))
            .collect();
        results.into_iter().collect::<Result<Vec<()>>>()?;

        tracing::info!(
            modules = self.config.external_modules.len(),
            "Element lists ready"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeSource {
        bodies: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl ElementListSource for FakeSource {
        fn fetch(&self, url: &str) -> Result<String> {
            self.requested.lock().unwrap().push(url.to_string());
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| Error::network(url, "connection refused"))
        }
    }

    fn config(root: &Path) -> Arc<PipelineConfig> {
        let content = r#"
[project]
name = "JUnit"
version = "5.4.0"

[external_modules]
"org.apiguardian.api" = "https://apiguardian-team.github.io/apiguardian/docs/1.0.0/api/"
"org.opentest4j" = "https://ota4j-team.github.io/opentest4j/docs/1.1.1/api/"

[api_docs]
program = "javadoc"
"#;
        Arc::new(PipelineConfig::from_toml(content, root).unwrap())
    }

    fn source_with_all() -> FakeSource {
        let mut source = FakeSource::default();
        source.bodies.insert(
            "https://apiguardian-team.github.io/apiguardian/docs/1.0.0/api/element-list".into(),
            "org.apiguardian.api\n".into(),
        );
        source.bodies.insert(
            "https://ota4j-team.github.io/opentest4j/docs/1.1.1/api/element-list".into(),
            "org.opentest4j\n".into(),
        );
        source
    }

    #[test]
    fn writes_module_header_and_body() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = config(tmp.path());
        let task = DownloadElementListsTask::new("download", config.clone(), Arc::new(source_with_all()));
        task.run().unwrap();

        let content =
            std::fs::read_to_string(config.element_list_path("org.opentest4j")).unwrap();
        assert_eq!(content, "module:org.opentest4j\norg.opentest4j\n");
        assert!(task.outputs().iter().all(|p| p.exists()));
    }

    #[test]
    fn network_failure_reuses_stale_copy() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = config(tmp.path());
        DownloadElementListsTask::new("download", config.clone(), Arc::new(source_with_all()))
            .run()
            .unwrap();

        let offline = DownloadElementListsTask::new("download", config.clone(), Arc::new(FakeSource::default()));
        offline.run().unwrap();
        let content =
            std::fs::read_to_string(config.element_list_path("org.apiguardian.api")).unwrap();
        assert!(content.starts_with("module:org.apiguardian.api\n"));
    }

    #[test]
    fn network_failure_without_cache_is_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let task = DownloadElementListsTask::new("download", config(tmp.path()), Arc::new(FakeSource::default()));
        assert!(matches!(task.run(), Err(Error::Network { .. })));
    }

    #[test]
    fn url_change_changes_inputs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = config(tmp.path());
        let mut changed = (*a).clone();
        changed.external_modules[0].base_url = "https://example.org/api/".into();
        let source: Arc<dyn ElementListSource> = Arc::new(FakeSource::default());
        let before = DownloadElementListsTask::new("d", a, source.clone()).inputs();
        let after = DownloadElementListsTask::new("d", Arc::new(changed), source).inputs();
        assert_ne!(before, after);
    }

    #[test]
    fn stale_copy_from_another_base_url_is_not_reused() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = config(tmp.path());
        DownloadElementListsTask::new("download", config.clone(), Arc::new(source_with_all()))
            .run()
            .unwrap();

        let mut moved = (*config).clone();
        moved.external_modules[0].base_url = "https://example.org/apiguardian/".into();
        let offline =
            DownloadElementListsTask::new("download", Arc::new(moved), Arc::new(FakeSource::default()));
        assert!(matches!(offline.run(), Err(Error::Network { .. })));
    }

    #[test]
    fn cached_copy_without_recorded_origin_is_not_reused() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = config(tmp.path());
        for module in &config.external_modules {
            materialize(b"module:x\nx\n", &config.element_list_path(&module.name)).unwrap();
        }
        let offline =
            DownloadElementListsTask::new("download", config, Arc::new(FakeSource::default()));
        assert!(matches!(offline.run(), Err(Error::Network { .. })));
    }

    #[test]
    fn records_base_url_next_to_element_list() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = config(tmp.path());
        DownloadElementListsTask::new("download", config.clone(), Arc::new(source_with_all()))
            .run()
            .unwrap();
        let origin = origin_path(&config.element_list_path("org.opentest4j"));
        assert_eq!(
            std::fs::read_to_string(origin).unwrap(),
            "https://ota4j-team.github.io/opentest4j/docs/1.1.1/api/"
        );
    }
}

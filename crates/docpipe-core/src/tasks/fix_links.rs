//! Post-processing of the aggregated API docs.
//!
//! Links into externally documented modules are generated with the module
//! name as an extra path segment (`<base><module>/pkg/Type.html`) even though
//! those sites are not modular; the segment is removed here.

use super::Task;
use crate::config::{ExternalModule, PipelineConfig};
use crate::copy::{copy_file, remove_dir_if_exists};
use crate::{Error, Result};
use docpipe_cache::FingerprintInput;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

const HEAD_TAG: &str = "<head>";
const ELEMENT_LIST: &str = "element-list";
const PACKAGE_LIST: &str = "package-list";

/// Rewrite a single line of HTML.
#[must_use]
pub fn fix_line(line: &str, favicon: Option<&str>, externals: &[ExternalModule]) -> String {
    let mut result = match favicon {
        Some(icon) if line.starts_with(HEAD_TAG) && !line.contains(icon) => {
            line.replacen(HEAD_TAG, &format!("{HEAD_TAG}{icon}"), 1)
        }
        _ => line.to_string(),
    };
    for module in externals {
        let nested = format!("{}{}/", module.base_url, module.name);
        while result.contains(&nested) {
            result = result.replace(&nested, &module.base_url);
        }
    }
    result
}

/// Rewrite a whole HTML document line by line, keeping line endings.
#[must_use]
pub fn fix_html(content: &str, favicon: Option<&str>, externals: &[ExternalModule]) -> String {
    content
        .split_inclusive('\n')
        .map(|line| fix_line(line, favicon, externals))
        .collect()
}

/// `fix-api-docs`.
#[derive(Debug, Clone)]
pub struct FixApiDocsTask {
    name: String,
    config: Arc<PipelineConfig>,
}

impl FixApiDocsTask {
    /// Create the link fixing task
    #[must_use]
    pub fn new(name: &str, config: Arc<PipelineConfig>) -> Self {
        Self {
            name: name.to_string(),
            config,
        }
    }

    fn rewrite_file(&self, from: &Path, to: &Path) -> Result<()> {
        let is_html = from.extension().is_some_and(|ext| ext == "html");
        if !is_html {
            return copy_file(from, to);
        }
        let bytes = fs::read(from).map_err(|e| Error::io(e, from, "read"))?;
        let Ok(content) = String::from_utf8(bytes) else {
            tracing::warn!(path = %from.display(), "HTML is not UTF-8; copying unchanged");
            return copy_file(from, to);
        };
        let fixed = fix_html(
            &content,
            self.config.fix_links.favicon.as_deref(),
            &self.config.external_modules,
        );
        crate::materialize::materialize(fixed.as_bytes(), to)?;
        Ok(())
    }

    fn write_package_lists(&self, out: &Path) -> Result<()> {
        let aggregated = self.config.api_docs_dir().join(ELEMENT_LIST);
        if aggregated.is_file() {
            copy_file(&aggregated, &out.join(PACKAGE_LIST))?;
        }
        for module in &self.config.external_modules {
            let cached = self.config.element_list_path(&module.name);
            if cached.is_file() {
                copy_file(&cached, &cached.with_file_name(PACKAGE_LIST))?;
            }
        }
        Ok(())
    }
}

impl Task for FixApiDocsTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        "Fixes links to external API docs in the aggregated output".to_string()
    }

    fn inputs(&self) -> Vec<FingerprintInput> {
        vec![
            FingerprintInput::Directory(self.config.api_docs_dir()),
            FingerprintInput::value(
                "favicon",
                self.config.fix_links.favicon.clone().unwrap_or_default(),
            ),
            FingerprintInput::value(
                "external_modules",
                self.config.external_modules_fingerprint(),
            ),
        ]
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.config.fixed_api_docs_dir()]
    }

    fn run(&self) -> Result<()> {
        let src = self.config.api_docs_dir();
        let out = self.config.fixed_api_docs_dir();
        if !src.is_dir() {
            return Err(Error::configuration(format!(
                "aggregated API docs not found at {}",
                src.display()
            )));
        }
        remove_dir_if_exists(&out)?;
        fs::create_dir_all(&out).map_err(|e| Error::io(e, &out, "create_dir_all"))?;

        let mut rewritten = 0usize;
        for entry in WalkDir::new(&src).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                Error::io(std::io::Error::other(e.to_string()), &src, "walk")
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&src) else {
                continue;
            };
            self.rewrite_file(entry.path(), &out.join(rel))?;
            rewritten += 1;
        }
        self.write_package_lists(&out)?;

        tracing::info!(files = rewritten, "Fixed API docs");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FAVICON: &str = r#"<link rel="icon" type="image/png" href="https://example.org/logo.png">"#;

    fn externals() -> Vec<ExternalModule> {
        vec![ExternalModule {
            name: "org.x".into(),
            base_url: "https://x/".into(),
        }]
    }

    #[test]
    fn collapses_module_segment() {
        let line = r#"<a href="https://x/org.x/foo.html">Foo</a>"#;
        assert_eq!(
            fix_line(line, None, &externals()),
            r#"<a href="https://x/foo.html">Foo</a>"#
        );
    }

    #[test]
    fn injects_favicon_after_head_once() {
        let fixed = fix_line("<head>\n", Some(FAVICON), &[]);
        assert_eq!(fixed, format!("<head>{FAVICON}\n"));
        assert_eq!(fix_line(&fixed, Some(FAVICON), &[]), fixed);
    }

    #[test]
    fn head_must_start_the_line() {
        let line = "  <head>";
        assert_eq!(fix_line(line, Some(FAVICON), &[]), line);
    }

    #[test]
    fn fix_html_keeps_line_endings() {
        let html = "<html>\r\n<head>\r\n<a href=\"https://x/org.x/a/B.html\">";
        let fixed = fix_html(html, Some(FAVICON), &externals());
        assert_eq!(
            fixed,
            format!("<html>\r\n<head>{FAVICON}\r\n<a href=\"https://x/a/B.html\">")
        );
    }

    #[test]
    fn task_rewrites_tree_and_writes_package_lists() {
        let tmp = tempfile::TempDir::new().unwrap();
        let content = r#"
[project]
name = "JUnit"
version = "5.4.0"

[external_modules]
"org.x" = "https://x/"

[api_docs]
program = "javadoc"

[fix_links]
favicon = "<link rel=icon>"
"#;
        let config = Arc::new(PipelineConfig::from_toml(content, tmp.path()).unwrap());
        let api = config.api_docs_dir();
        fs::create_dir_all(api.join("pkg")).unwrap();
        fs::write(api.join("pkg/Foo.html"), "<head>\n<a href=\"https://x/org.x/a.html\">\n").unwrap();
        fs::write(api.join("element-list"), "module:org.junit\norg.junit\n").unwrap();
        fs::write(api.join("logo.png"), [0xff, 0x00, 0xfe]).unwrap();
        crate::materialize::materialize(b"module:org.x\norg.x\n", &config.element_list_path("org.x")).unwrap();

        let task = FixApiDocsTask::new("fix-api-docs", config.clone());
        task.run().unwrap();

        let out = config.fixed_api_docs_dir();
        assert_eq!(
            fs::read_to_string(out.join("pkg/Foo.html")).unwrap(),
            "<head><link rel=icon>\n<a href=\"https://x/a.html\">\n"
        );
        assert_eq!(fs::read(out.join("logo.png")).unwrap(), vec![0xff, 0x00, 0xfe]);
        assert_eq!(
            fs::read_to_string(out.join("package-list")).unwrap(),
            "module:org.junit\norg.junit\n"
        );
        assert!(config.element_lists_dir().join("org.x/package-list").is_file());

        let first = fs::read_to_string(out.join("pkg/Foo.html")).unwrap();
        task.run().unwrap();
        assert_eq!(fs::read_to_string(out.join("pkg/Foo.html")).unwrap(), first);
    }

    fn html_line() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("<head>".to_string()),
            Just("https://x/".to_string()),
            Just("org.x/".to_string()),
            Just("https://x/org.x/".to_string()),
            "[a-z<>/\"= ]{0,12}",
        ]
    }

    proptest! {
        #[test]
        fn fixing_is_idempotent(parts in proptest::collection::vec(html_line(), 0..12)) {
            let line = parts.concat();
            let once = fix_line(&line, Some(FAVICON), &externals());
            let twice = fix_line(&once, Some(FAVICON), &externals());
            prop_assert_eq!(once, twice);
        }
    }
}

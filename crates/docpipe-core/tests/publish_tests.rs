//! Publishing into a local bare repository.
//!
//! Skipped when no `git` executable is available.

use docpipe_core::publish::{PreserveRules, PublishOutcome, Publisher};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const BRANCH: &str = "gh-pages";

fn git_available() -> bool {
    which::which("git").is_ok()
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

struct Remote {
    tmp: TempDir,
}

impl Remote {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        git(tmp.path(), &["init", "-q", "--bare", "remote.git"]);
        Self { tmp }
    }

    fn url(&self) -> String {
        self.tmp.path().join("remote.git").display().to_string()
    }

    fn files(&self) -> Vec<String> {
        git(
            &self.tmp.path().join("remote.git"),
            &["ls-tree", "-r", "--name-only", BRANCH],
        )
        .lines()
        .map(String::from)
        .collect()
    }

    fn commit_count(&self) -> usize {
        git(
            &self.tmp.path().join("remote.git"),
            &["rev-list", "--count", BRANCH],
        )
        .trim()
        .parse()
        .unwrap()
    }

    fn publisher(&self, work: &Path) -> Publisher {
        Publisher::new(work, self.url(), BRANCH).with_author("Docs Bot", "bot@example.org")
    }
}

fn packaged_tree(root: &Path, version: &str, with_current: bool, body: &str) -> PathBuf {
    let tree = root.join("ghpages-docs");
    let mut labels = vec![version];
    if with_current {
        labels.push("current");
    }
    for label in labels {
        let dir = tree.join(label);
        fs::create_dir_all(dir.join("api")).unwrap();
        fs::write(dir.join("index.html"), body).unwrap();
        fs::write(dir.join("api/index.html"), body).unwrap();
    }
    tree
}

#[test]
fn first_publish_creates_orphan_branch() {
    if !git_available() {
        return;
    }
    let remote = Remote::new();
    let work = TempDir::new().unwrap();
    let tree = packaged_tree(work.path(), "1.0.0", true, "v1");

    let outcome = remote
        .publisher(&work.path().join("git-publish"))
        .publish(&tree, &PreserveRules::new("1.0.0", true), "Publish 1.0.0")
        .unwrap();

    assert!(matches!(outcome, PublishOutcome::Pushed { .. }));
    let files = remote.files();
    assert!(files.contains(&"docs/1.0.0/index.html".to_string()));
    assert!(files.contains(&"docs/current/api/index.html".to_string()));
    assert_eq!(remote.commit_count(), 1);
}

#[test]
fn publishing_without_replace_keeps_current_and_other_versions() {
    if !git_available() {
        return;
    }
    let remote = Remote::new();
    let first = TempDir::new().unwrap();
    let tree = packaged_tree(first.path(), "1.0.0", true, "v1");
    remote
        .publisher(&first.path().join("git-publish"))
        .publish(&tree, &PreserveRules::new("1.0.0", true), "Publish 1.0.0")
        .unwrap();

    let second = TempDir::new().unwrap();
    let tree = packaged_tree(second.path(), "snapshot", false, "snap");
    remote
        .publisher(&second.path().join("git-publish"))
        .publish(&tree, &PreserveRules::new("snapshot", false), "Publish snapshot")
        .unwrap();

    let files = remote.files();
    assert!(files.contains(&"docs/current/index.html".to_string()));
    assert!(files.contains(&"docs/current/api/index.html".to_string()));
    assert!(files.contains(&"docs/1.0.0/index.html".to_string()));
    assert!(files.contains(&"docs/snapshot/api/index.html".to_string()));
    assert_eq!(remote.commit_count(), 2);

    let current = git(
        &remote.tmp.path().join("remote.git"),
        &["show", &format!("{BRANCH}:docs/current/index.html")],
    );
    assert_eq!(current, "v1");
}

#[test]
fn republishing_replaces_only_the_version_directory() {
    if !git_available() {
        return;
    }
    let remote = Remote::new();
    let work = TempDir::new().unwrap();
    let publisher = remote.publisher(&work.path().join("git-publish"));
    let rules = PreserveRules::new("snapshot", false);

    let tree = packaged_tree(work.path(), "snapshot", false, "one");
    fs::write(tree.join("snapshot/removed.html"), "gone soon").unwrap();
    publisher.publish(&tree, &rules, "first").unwrap();

    fs::remove_dir_all(&tree).unwrap();
    let tree = packaged_tree(work.path(), "snapshot", false, "two");
    publisher.publish(&tree, &rules, "second").unwrap();

    let files = remote.files();
    assert!(!files.contains(&"docs/snapshot/removed.html".to_string()));
    assert!(files.contains(&"docs/snapshot/index.html".to_string()));
}

#[test]
fn unchanged_tree_creates_no_commit() {
    if !git_available() {
        return;
    }
    let remote = Remote::new();
    let work = TempDir::new().unwrap();
    let publisher = remote.publisher(&work.path().join("git-publish"));
    let rules = PreserveRules::new("1.0.0", false);
    let tree = packaged_tree(work.path(), "1.0.0", false, "same");

    publisher.publish(&tree, &rules, "first").unwrap();
    let outcome = publisher.publish(&tree, &rules, "again").unwrap();

    assert_eq!(outcome, PublishOutcome::NoChanges);
    assert_eq!(remote.commit_count(), 1);
}

#[test]
fn unreachable_remote_is_execution_failure() {
    if !git_available() {
        return;
    }
    let work = TempDir::new().unwrap();
    let publisher = Publisher::new(
        work.path().join("git-publish"),
        work.path().join("missing.git").display().to_string(),
        BRANCH,
    );
    let tree = packaged_tree(work.path(), "1.0.0", false, "x");
    let err = publisher
        .publish(&tree, &PreserveRules::new("1.0.0", false), "msg")
        .unwrap_err();
    assert!(matches!(err, docpipe_core::Error::Execution { .. }));
}

#[cfg(unix)]
#[test]
fn push_after_concurrent_remote_update_is_execution_failure() {
    use std::os::unix::fs::PermissionsExt;

    if !git_available() {
        return;
    }
    let remote = Remote::new();
    let work = TempDir::new().unwrap();
    let clone_dir = work.path().join("git-publish");
    let publisher = remote.publisher(&clone_dir);
    let rules = PreserveRules::new("1.0.0", false);

    let tree = packaged_tree(work.path(), "1.0.0", false, "one");
    publisher.publish(&tree, &rules, "first").unwrap();

    // Another writer updates the branch after our fetch, right before our push.
    let other = work.path().join("other");
    git(
        work.path(),
        &["clone", "-q", "-b", BRANCH, &remote.url(), "other"],
    );
    fs::write(other.join("NOTICE"), "elsewhere").unwrap();
    git(&other, &["add", "NOTICE"]);
    git(
        &other,
        &[
            "-c",
            "user.name=Other",
            "-c",
            "user.email=other@example.org",
            "commit",
            "-q",
            "-m",
            "other",
        ],
    );
    let hook = clone_dir.join(".git/hooks/pre-push");
    fs::create_dir_all(hook.parent().unwrap()).unwrap();
    fs::write(
        &hook,
        format!(
            "#!/bin/sh\nunset GIT_DIR GIT_WORK_TREE GIT_INDEX_FILE\ngit -C '{}' push -q origin HEAD:refs/heads/{BRANCH} >/dev/null 2>&1\nexit 0\n",
            other.display()
        ),
    )
    .unwrap();
    let mut perms = fs::metadata(&hook).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&hook, perms).unwrap();

    fs::remove_dir_all(&tree).unwrap();
    let tree = packaged_tree(work.path(), "1.0.0", false, "two");
    let err = publisher.publish(&tree, &rules, "second").unwrap_err();

    assert!(matches!(err, docpipe_core::Error::Execution { .. }));
    assert!(remote.files().contains(&"NOTICE".to_string()));
}

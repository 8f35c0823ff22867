//! In-memory shell for testing.

use crate::error::{ErrorKind, Result};
use crate::{Command, Shell};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;

/// A remote repository as seen by [`MockShell`]: its tags and branches, and
/// what the manifest tool prints at each of them.
#[derive(Debug, Clone)]
pub struct MockRepo {
    tags: Vec<String>,
    branches: Vec<String>,
    manifests: HashMap<String, String>,
    fail_fetch: bool,
}
impl Default for MockRepo {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            branches: vec!["main".to_string()],
            manifests: HashMap::new(),
            fail_fetch: false,
        }
    }
}
impl MockRepo {
    /// Add a tag whose manifest dump prints `manifest`.
    pub fn with_tag(mut self, tag: impl Into<String>, manifest: impl Into<String>) -> Self {
        let tag = tag.into();
        self.manifests.insert(tag.clone(), manifest.into());
        self.tags.push(tag);
        self
    }

    /// Add a tag at which the manifest tool fails.
    pub fn with_tag_without_manifest(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_branch_manifest(mut self, branch: impl Into<String>, manifest: impl Into<String>) -> Self {
        let branch = branch.into();
        self.manifests.insert(branch.clone(), manifest.into());
        if !self.branches.contains(&branch) {
            self.branches.push(branch);
        }
        self
    }

    /// Make every fetch (pull) against this repository fail.
    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }
}

#[derive(Debug, Clone)]
struct Worktree {
    url: String,
    head: Option<String>,
}

#[derive(Default)]
struct Disk {
    dirs: HashSet<PathBuf>,
    worktrees: HashMap<PathBuf, Worktree>,
}

#[derive(Default)]
struct Busy {
    active: usize,
    peak: usize,
}

/// In-memory [`Shell`] for testing.
///
/// Remote repositories are registered by URL; cloning one creates an
/// in-memory working tree at the destination, and subsequent commands run
/// against that working tree. Cloning an unregistered URL fails the same way
/// `git` does for a missing repository.
///
/// Every command is recorded in [`history`](Self::history), and the peak
/// number of commands running at once in each working directory is tracked
/// so tests can assert that a checkout is never used concurrently.
#[derive(Default)]
pub struct MockShell {
    repos: RwLock<HashMap<String, MockRepo>>,
    disk: RwLock<Disk>,
    history: Mutex<Vec<(Command, Option<PathBuf>)>>,
    busy: Mutex<HashMap<PathBuf, Busy>>,
    latency: Option<Duration>,
}

impl MockShell {
    pub fn with_repo(mut self, url: impl Into<String>, repo: MockRepo) -> Self {
        self.repos.get_mut().insert(url.into(), repo);
        self
    }

    /// Pretend `path` already exists as a plain directory.
    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.disk.get_mut().dirs.insert(path.into());
        self
    }

    /// Pretend `url` has already been cloned into `path`.
    pub fn with_checkout(mut self, path: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        let path = path.into();
        let disk = self.disk.get_mut();
        disk.dirs.insert(path.clone());
        disk.worktrees.insert(path, Worktree { url: url.into(), head: None });
        self
    }

    /// Delay every command, to widen the window for overlapping calls.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Swap out a registered repository, e.g. to simulate tags being
    /// pushed or deleted between runs.
    pub async fn replace_repo(&self, url: impl Into<String>, repo: MockRepo) {
        self.repos.write().await.insert(url.into(), repo);
    }

    /// Every command run so far, with its working directory.
    pub fn history(&self) -> Vec<(Command, Option<PathBuf>)> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of recorded commands matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Command) -> bool) -> usize {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).iter().filter(|(c, _)| predicate(c)).count()
    }

    /// The most commands ever observed running at once in `path`.
    pub fn peak_concurrency(&self, path: &Path) -> usize {
        self.busy.lock().unwrap_or_else(PoisonError::into_inner).get(path).map_or(0, |b| b.peak)
    }

    fn enter(&self, path: &Path) -> BusyGuard<'_> {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = busy.entry(path.to_path_buf()).or_default();
        entry.active += 1;
        entry.peak = entry.peak.max(entry.active);
        BusyGuard { shell: self, path: path.to_path_buf() }
    }

    async fn execute(&self, command: &Command, cwd: Option<&Path>) -> Result<String> {
        let fail = |code: i32, output: String| exn::Exn::from(ErrorKind::command_failed(command, Some(code), output));
        if let Command::Clone { url, dest } = command {
            if !self.repos.read().await.contains_key(url) {
                return Err(fail(128, format!("fatal: repository '{url}' not found")));
            }
            let mut disk = self.disk.write().await;
            if disk.dirs.contains(dest) {
                return Err(fail(128, format!("fatal: destination path '{}' already exists", dest.display())));
            }
            disk.dirs.insert(dest.clone());
            disk.worktrees.insert(dest.clone(), Worktree { url: url.clone(), head: None });
            return Ok(String::new());
        }

        let Some(cwd) = cwd else {
            return Err(fail(128, "fatal: not a git repository".to_string()));
        };
        let Some(worktree) = self.disk.read().await.worktrees.get(cwd).cloned() else {
            return Err(fail(128, "fatal: not a git repository".to_string()));
        };
        let repos = self.repos.read().await;
        let Some(repo) = repos.get(&worktree.url) else {
            return Err(fail(128, format!("fatal: repository '{}' not found", worktree.url)));
        };
        match command {
            Command::Clone { .. } => unreachable!("handled above"),
            Command::Pull if repo.fail_fetch => Err(fail(128, format!("fatal: unable to access '{}'", worktree.url))),
            Command::Pull => Ok(String::new()),
            Command::Checkout { reference } => {
                if !repo.tags.contains(reference) && !repo.branches.contains(reference) {
                    let output = format!("error: pathspec '{reference}' did not match any file(s) known to git");
                    return Err(fail(1, output));
                }
                if let Some(worktree) = self.disk.write().await.worktrees.get_mut(cwd) {
                    worktree.head = Some(reference.clone());
                }
                Ok(String::new())
            },
            Command::ListTags => Ok(repo.tags.iter().map(|tag| format!("{tag}\n")).collect()),
            Command::DumpPackage => {
                let head = worktree.head.as_deref().or(repo.branches.first().map(String::as_str));
                head.and_then(|head| repo.manifests.get(head))
                    .cloned()
                    .ok_or_else(|| fail(1, "error: root manifest not found".to_string()))
            },
        }
    }
}

struct BusyGuard<'a> {
    shell: &'a MockShell,
    path: PathBuf,
}
impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut busy = self.shell.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = busy.get_mut(&self.path) {
            entry.active = entry.active.saturating_sub(1);
        }
    }
}

#[async_trait]
impl Shell for MockShell {
    async fn run(&self, command: &Command, cwd: Option<&Path>) -> Result<String> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).push((command.clone(), cwd.map(Path::to_path_buf)));
        let target = match command {
            Command::Clone { dest, .. } => dest.as_path(),
            _ => cwd.unwrap_or(Path::new("")),
        };
        let _busy = self.enter(target);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.execute(command, cwd).await
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.disk.read().await.dirs.contains(path))
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        let mut disk = self.disk.write().await;
        if disk.dirs.contains(path) {
            exn::bail!(ErrorKind::Io);
        }
        disk.dirs.insert(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/pkg";

    fn shell() -> MockShell {
        MockShell::default().with_repo(
            URL,
            MockRepo::default().with_tag("1.0.0", r#"{"name": "Pkg"}"#).with_tag_without_manifest("1.1.0"),
        )
    }

    #[tokio::test]
    async fn test_clone_then_list_tags() {
        let shell = shell();
        let dest = PathBuf::from("/checkouts/example.com-pkg");
        assert!(!shell.exists(&dest).await.unwrap());
        shell.run(&Command::Clone { url: URL.to_string(), dest: dest.clone() }, None).await.unwrap();
        assert!(shell.exists(&dest).await.unwrap());
        let tags = shell.run(&Command::ListTags, Some(&dest)).await.unwrap();
        assert_eq!(tags, "1.0.0\n1.1.0\n");
        assert_eq!(shell.history().len(), 2);
    }

    #[tokio::test]
    async fn test_clone_unknown_repository_fails() {
        let shell = shell();
        let command = Command::Clone { url: "https://example.com/missing".to_string(), dest: PathBuf::from("/x") };
        let err = shell.run(&command, None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::CommandFailed { code: Some(128), .. }));
        assert!(!shell.exists(Path::new("/x")).await.unwrap());
    }

    #[tokio::test]
    async fn test_dump_package_follows_checkout() {
        let dest = PathBuf::from("/checkouts/pkg");
        let shell = shell().with_checkout(&dest, URL);
        shell.run(&Command::Checkout { reference: "1.0.0".to_string() }, Some(&dest)).await.unwrap();
        assert_eq!(shell.run(&Command::DumpPackage, Some(&dest)).await.unwrap(), r#"{"name": "Pkg"}"#);
        shell.run(&Command::Checkout { reference: "1.1.0".to_string() }, Some(&dest)).await.unwrap();
        assert!(shell.run(&Command::DumpPackage, Some(&dest)).await.is_err());
        assert!(shell.run(&Command::Checkout { reference: "2.0.0".to_string() }, Some(&dest)).await.is_err());
    }

    #[tokio::test]
    async fn test_create_dir() {
        let shell = MockShell::default().with_dir("/existing");
        assert!(shell.create_dir(Path::new("/existing")).await.is_err());
        shell.create_dir(Path::new("/new")).await.unwrap();
        assert!(shell.exists(Path::new("/new")).await.unwrap());
    }
}

use crate::error::{ErrorKind, Result};
use crate::{Command, Shell};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::process::{Command as Process, Output};
use tracing::instrument;

/// Runs commands as real child processes.
///
/// Programs are located on `PATH` at call time, so a missing `swift`
/// toolchain only fails manifest resolution, not cloning.
#[derive(Debug, Clone, Default)]
pub struct LocalShell;

impl LocalShell {
    pub fn new() -> Self {
        Self
    }

    fn locate(program: &'static str) -> Result<PathBuf> {
        which::which(program).or_raise(|| ErrorKind::ProgramNotFound(program))
    }
}

#[async_trait]
impl Shell for LocalShell {
    #[instrument(skip(self, command), fields(command = %command))]
    async fn run(&self, command: &Command, cwd: Option<&Path>) -> Result<String> {
        let program = Self::locate(command.program())?;
        let mut process = Process::new(&program);
        process
            .args(command.args())
            // Never wait on a credentials prompt for a private or deleted repository.
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(cwd) = cwd {
            process.current_dir(cwd);
        }
        let output: Output = tokio::task::spawn_blocking(move || process.output())
            .await
            .or_raise(|| ErrorKind::Io)?
            .or_raise(|| ErrorKind::Io)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let captured = if stderr.trim().is_empty() { stdout } else { stderr.into_owned() };
            tracing::debug!(code = ?output.status.code(), "Command exited unsuccessfully");
            exn::bail!(ErrorKind::command_failed(command, output.status.code(), captured.trim()));
        }
        Ok(stdout)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        tokio::fs::try_exists(path).await.or_raise(|| ErrorKind::Io)
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir(path).await.or_raise(|| ErrorKind::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exists_and_create_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let shell = LocalShell::new();
        let dir = tmp.path().join("checkouts");
        assert!(!shell.exists(&dir).await.unwrap());
        shell.create_dir(&dir).await.unwrap();
        assert!(shell.exists(&dir).await.unwrap());
        // Not recursive.
        assert!(shell.create_dir(&tmp.path().join("a/b")).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_command_is_an_error() {
        if which::which("git").is_err() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        // Not a repository.
        let err = LocalShell::new().run(&Command::ListTags, Some(tmp.path())).await.unwrap_err();
        match &*err {
            ErrorKind::CommandFailed { command, code, output } => {
                assert_eq!(command, "git tag --list");
                assert!(code.is_some_and(|c| c != 0));
                assert!(!output.is_empty());
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}

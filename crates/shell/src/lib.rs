//! Runs the external tools the pipeline depends on (`git` and the Swift
//! package manager) and exposes the few filesystem checks the checkout
//! manager needs.
//!
//! Everything goes through the [`Shell`] trait so that the pipeline can be
//! exercised without touching the network or the disk; see `MockShell`
//! (behind the `mock` feature).

mod command;
pub mod error;
mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use crate::command::Command;
pub use crate::local::LocalShell;
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::{MockRepo, MockShell};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub type ShellHandle = Arc<dyn Shell + Send + Sync>;

/// Checkout adapter: process execution plus the filesystem checks that go
/// with it.
///
/// Implementations must not block the async executor; commands can take
/// seconds (a clone, minutes).
#[async_trait]
pub trait Shell: Send + Sync {
    /// Run `command` with `cwd` as its working directory, returning captured
    /// standard output.
    ///
    /// A non-zero exit is an error ([`CommandFailed`](error::ErrorKind::CommandFailed)),
    /// never an `Ok` with partial output.
    async fn run(&self, command: &Command, cwd: Option<&Path>) -> Result<String>;

    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create a single directory. The parent must already exist.
    async fn create_dir(&self, path: &Path) -> Result<()>;
}

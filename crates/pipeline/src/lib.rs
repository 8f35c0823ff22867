//! The package pipeline: keeps local mirrors of package repositories,
//! reconciles their tags into versions, resolves manifests, and dispatches
//! builds for whatever the build matrix is still missing.
//!
//! Every per-package and per-version step returns an [`Outcome`]; a failure
//! there is folded into the package's status instead of aborting the batch.
//! The batch entry points are [`analyze`] and [`trigger_builds`] /
//! [`trigger_builds_for`].

mod analyze;
mod candidates;
mod checkout;
pub mod error;
mod manifest;
mod matrix;
mod reconcile;
mod trigger;

pub use crate::analyze::{AnalysisReport, analyze, analyze_ids, analyze_packages};
pub use crate::candidates::{select_build_candidates, select_update_candidates};
pub use crate::checkout::{cache_directory_key, ensure_checkout};
pub use crate::manifest::{resolve_manifest, update_version};
pub use crate::matrix::{BuildMatrix, MissingBuilds, missing_builds};
pub use crate::reconcile::reconcile_versions;
pub use crate::trigger::{TriggerReport, trigger_builds, trigger_builds_for};
use buildfleet_db::Repository;
use buildfleet_models::Package;
use buildfleet_shell::ShellHandle;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Result of one unit of work (a package or a version).
pub type Outcome<T> = error::Result<T>;

/// Packages analyzed at the same time unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Everything the pipeline steps share.
pub struct Context {
    shell: ShellHandle,
    repo: Repository,
    checkouts: PathBuf,
    matrix: BuildMatrix,
    concurrency: usize,
    locks: CheckoutLocks,
}

impl Context {
    pub fn new(shell: ShellHandle, repo: Repository, checkouts: impl Into<PathBuf>, matrix: BuildMatrix) -> Self {
        Self {
            shell,
            repo,
            checkouts: checkouts.into(),
            matrix,
            concurrency: DEFAULT_CONCURRENCY,
            locks: CheckoutLocks::default(),
        }
    }

    /// Upper bound on packages processed at once. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn matrix(&self) -> &BuildMatrix {
        &self.matrix
    }

    /// Directory holding one mirror per package.
    pub fn checkouts(&self) -> &Path {
        &self.checkouts
    }

    /// Where the mirror of `package` lives.
    pub fn checkout_path(&self, package: &Package) -> Outcome<PathBuf> {
        Ok(self.checkouts.join(cache_directory_key(package)?))
    }
}

/// One async mutex per checkout directory.
///
/// Anything that moves a working tree's `HEAD` (and then reads the tree)
/// holds the lock for that directory for the whole sequence.
#[derive(Default)]
struct CheckoutLocks {
    inner: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl CheckoutLocks {
    async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(path.to_path_buf()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

//! Pipeline Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Per-package and per-version failures are carried as
//! values and folded into the package status; only the errors returned from
//! the top-level entry points abort a run.

use buildfleet_models::{PackageId, VersionId};
use buildfleet_shell::Command;
use buildfleet_shell::error::{Error as ShellError, ErrorKind as ShellErrorKind};
use derive_more::{Display, Error};

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The package URL can't be turned into a checkout directory name.
    #[display("invalid package url (package {}): {url}", id.map_or_else(|| "?".to_string(), |id| id.to_string()))]
    InvalidPackageUrl {
        #[error(not(source))]
        id: Option<PackageId>,
        #[error(not(source))]
        url: String,
    },
    /// The version has nothing that can be checked out.
    #[display("version {} has no revision to check out", _0.map_or_else(|| "?".to_string(), |id| id.to_string()))]
    InvalidRevision(#[error(not(source))] Option<VersionId>),
    /// A tag in the repository isn't a semantic version.
    #[display("tag is not a semantic version: {_0}")]
    InvalidTag(#[error(not(source))] String),
    /// The manifest tool's output didn't decode.
    #[display("invalid package manifest")]
    InvalidManifest,
    /// Build triggering needs secrets that aren't configured.
    #[display("missing credentials")]
    MissingCredentials,
    /// A record that must already be persisted wasn't (a programming error).
    #[display("invariant violated: {_0}")]
    InvariantViolation(#[error(not(source))] &'static str),
    /// `git` or the manifest tool exited unsuccessfully.
    #[display("`{command}` failed: {output}")]
    ExternalCommandFailed {
        #[error(not(source))]
        command: String,
        /// Captured output of the failed command.
        #[error(not(source))]
        output: String,
    },
    /// Reading or writing the database failed.
    #[display("storage error")]
    Storage,
    /// Talking to the CI system failed.
    #[display("build dispatch error")]
    Dispatch,
    /// Preparing the checkouts directory failed.
    #[display("filesystem error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalCommandFailed { .. } | Self::Storage | Self::Dispatch | Self::Io)
    }

    /// Wrap a shell error for `command`, lifting the captured output into
    /// this error while keeping the shell error as its child.
    #[track_caller]
    pub fn command_failed(err: ShellError, command: &Command) -> Error {
        let output = match &*err {
            ShellErrorKind::CommandFailed { output, .. } => output.clone(),
            other => other.to_string(),
        };
        err.raise(Self::ExternalCommandFailed { command: command.to_string(), output })
    }
}

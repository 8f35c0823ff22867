//! Shell Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A shell error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for shell operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The program isn't installed (or isn't on `PATH`).
    #[display("{_0} not found on your system")]
    ProgramNotFound(#[error(not(source))] &'static str),
    /// The command ran but exited unsuccessfully. `code` is `None` when the
    /// process was killed by a signal.
    #[display("`{command}` failed (exit code {code:?}): {output}")]
    CommandFailed {
        #[error(not(source))]
        command: String,
        #[error(not(source))]
        code: Option<i32>,
        /// Captured stderr, falling back to stdout when stderr is empty.
        #[error(not(source))]
        output: String,
    },
    /// Spawning the process or touching the filesystem failed.
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A failed clone or pull is usually the network; a later run may
        // well succeed. Missing programs won't appear by themselves.
        matches!(self, Self::CommandFailed { .. } | Self::Io)
    }

    pub fn command_failed(command: impl ToString, code: Option<i32>, output: impl Into<String>) -> Self {
        Self::CommandFailed { command: command.to_string(), code, output: output.into() }
    }
}

//! Config Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A config file was asked for explicitly but isn't there.
    #[display("config file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The merged configuration doesn't deserialize (bad TOML, wrong types,
    /// unknown platform or toolchain version).
    #[display("invalid configuration")]
    Invalid,
    /// Deserialized fine, but a value is out of range.
    #[display("invalid configuration value for '{key}': {reason}")]
    InvalidValue {
        #[error(not(source))]
        key: &'static str,
        #[error(not(source))]
        reason: &'static str,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

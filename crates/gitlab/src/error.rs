//! GitLab Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use reqwest::StatusCode;

/// A GitLab client error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for GitLab operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A required secret isn't configured. Checked before any request is made.
    #[display("missing credentials: {_0} not configured")]
    MissingCredentials(#[error(not(source))] &'static str),
    /// GitLab answered, but not with the expected status.
    #[display("request to {target} failed with status {status}")]
    RequestFailed {
        #[error(not(source))]
        status: StatusCode,
        #[error(not(source))]
        target: String,
    },
    /// The request never got an answer (connection, TLS, timeout).
    #[display("transport error")]
    Transport,
    /// The response body wasn't what the API documents.
    #[display("unexpected response body")]
    Decode,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::MissingCredentials(_) | Self::Decode => false,
            Self::RequestFailed { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            },
            Self::Transport => true,
        }
    }
}

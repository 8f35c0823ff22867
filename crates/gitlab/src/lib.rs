//! Client for the GitLab project that runs package builds.
//!
//! Two operations: triggering a build pipeline for one
//! (version, platform, toolchain) cell, and counting pipelines by status.
//! Build results are reported back to the site by the builder itself, so
//! nothing here tracks triggered jobs.

mod builder;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod pipelines;
mod transport;

pub use crate::builder::{Builder, Credentials, DEFAULT_BASE_URL, DEFAULT_BRANCH, DEFAULT_PROJECT_ID, TriggerRequest};
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::{MockTransport, RecordedPost, query_param};
pub use crate::pipelines::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE, Pipeline, PipelineStatus};
pub use crate::transport::{HttpTransport, Response, Transport, TransportHandle};
pub use reqwest::StatusCode;

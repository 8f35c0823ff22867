//! Pipeline listing, used for the queue-depth figures on the dashboard.
//!
//! See <https://docs.gitlab.com/ee/api/pipelines.html>.

use crate::Builder;
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use tracing::instrument;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_MAX_PAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Canceled,
    Created,
    Failed,
    Manual,
    Pending,
    Running,
    Skipped,
    Success,
}
impl PipelineStatus {
    pub const ALL: [PipelineStatus; 8] = [
        PipelineStatus::Canceled,
        PipelineStatus::Created,
        PipelineStatus::Failed,
        PipelineStatus::Manual,
        PipelineStatus::Pending,
        PipelineStatus::Running,
        PipelineStatus::Skipped,
        PipelineStatus::Success,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Canceled => "canceled",
            PipelineStatus::Created => "created",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Manual => "manual",
            PipelineStatus::Pending => "pending",
            PipelineStatus::Running => "running",
            PipelineStatus::Skipped => "skipped",
            PipelineStatus::Success => "success",
        }
    }
}
impl Display for PipelineStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
impl FromStr for PipelineStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown pipeline status: {s}"))
    }
}

/// One pipeline as listed by the API; other fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    pub status: PipelineStatus,
}

impl Builder {
    /// Fetch one page (1-based) of pipelines with the given status.
    pub async fn fetch_pipelines(
        &self,
        status: PipelineStatus,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Pipeline>> {
        let token = self.credentials.api_token.as_deref().ok_or_raise(|| ErrorKind::MissingCredentials("api token"))?;
        let url = format!("{}/pipelines?status={status}&page={page}&per_page={page_size}", self.project_url);
        let response = self.transport.get(&url, token).await?;
        if response.status != StatusCode::OK {
            exn::bail!(ErrorKind::RequestFailed { status: response.status, target: url });
        }
        serde_json::from_str(&response.body).or_raise(|| ErrorKind::Decode)
    }

    /// Count pipelines with the given status, one page at a time.
    ///
    /// Stops at the first short page, or after `max_pages` pages: the result
    /// is a lower bound once there are more than `page_size * max_pages`
    /// pipelines, in exchange for a bounded number of requests.
    #[instrument(skip(self))]
    pub async fn status_count(&self, status: PipelineStatus, page_size: usize, max_pages: usize) -> Result<usize> {
        let mut total = 0;
        for page in 1..=max_pages {
            let count = self.fetch_pipelines(status, page, page_size).await?.len();
            total += count;
            if count < page_size {
                break;
            }
        }
        Ok(total)
    }
}

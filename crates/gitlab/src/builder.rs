use crate::error::{ErrorKind, Result};
use crate::transport::TransportHandle;
use buildfleet_models::{Platform, Reference, SwiftVersion, VersionId};
use exn::OptionExt;
use reqwest::StatusCode;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use tracing::instrument;

pub const DEFAULT_BASE_URL: &str = "https://gitlab.com/api/v4";
/// The builder project on gitlab.com.
pub const DEFAULT_PROJECT_ID: u64 = 19564054;
pub const DEFAULT_BRANCH: &str = "main";

/// Secrets for talking to the builder project. Any of them may be missing
/// until the operation that needs it is attempted.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Pipeline trigger token.
    pub pipeline_token: Option<String>,
    /// Token the builder presents when reporting results back.
    pub builder_token: Option<String>,
    /// Personal/project access token for the read API.
    pub api_token: Option<String>,
}
impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let redact = |token: &Option<String>| token.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("pipeline_token", &redact(&self.pipeline_token))
            .field("builder_token", &redact(&self.builder_token))
            .field("api_token", &redact(&self.api_token))
            .finish()
    }
}

/// Everything the builder needs to run one build and report it back without
/// us tracking the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRequest {
    pub clone_url: String,
    pub platform: Platform,
    pub reference: Reference,
    pub swift_version: SwiftVersion,
    pub version_id: VersionId,
}

/// Client for the builder project's CI.
pub struct Builder {
    pub(crate) transport: TransportHandle,
    pub(crate) project_url: String,
    branch: String,
    api_base_url: String,
    pub(crate) credentials: Credentials,
}

impl Builder {
    /// `api_base_url` is where the builder posts its results.
    pub fn new(transport: TransportHandle, api_base_url: impl Into<String>) -> Self {
        Self {
            transport,
            project_url: project_url(DEFAULT_BASE_URL, DEFAULT_PROJECT_ID),
            branch: DEFAULT_BRANCH.to_string(),
            api_base_url: api_base_url.into(),
            credentials: Credentials::default(),
        }
    }

    pub fn with_project(mut self, base_url: &str, project_id: u64) -> Self {
        self.project_url = project_url(base_url, project_id);
        self
    }

    /// The branch of the builder project whose pipeline is triggered.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn project_url(&self) -> &str {
        &self.project_url
    }

    /// The pipeline and builder tokens, or [`MissingCredentials`](ErrorKind::MissingCredentials)
    /// naming the first one that is absent.
    pub fn trigger_credentials(&self) -> Result<(&str, &str)> {
        let credentials = &self.credentials;
        let pipeline =
            credentials.pipeline_token.as_deref().ok_or_raise(|| ErrorKind::MissingCredentials("pipeline token"))?;
        let builder =
            credentials.builder_token.as_deref().ok_or_raise(|| ErrorKind::MissingCredentials("builder token"))?;
        Ok((pipeline, builder))
    }

    /// Trigger one build pipeline.
    ///
    /// Returns the raw response status; whether that counts as success, and
    /// whether to retry, is up to the caller.
    #[instrument(
        skip_all,
        fields(platform = %request.platform, reference = %request.reference, swift = %request.swift_version),
    )]
    pub async fn trigger_build(&self, request: &TriggerRequest) -> Result<StatusCode> {
        let (pipeline_token, builder_token) = self.trigger_credentials()?;
        let url = format!("{}/trigger/pipeline", self.project_url);
        let form = [
            ("token", pipeline_token.to_string()),
            ("ref", self.branch.clone()),
            ("variables[API_BASEURL]", self.api_base_url.clone()),
            ("variables[BUILD_PLATFORM]", request.platform.as_str().to_string()),
            ("variables[BUILDER_TOKEN]", builder_token.to_string()),
            ("variables[CLONE_URL]", request.clone_url.clone()),
            ("variables[REFERENCE]", request.reference.to_string()),
            ("variables[SWIFT_VERSION]", request.swift_version.short()),
            ("variables[VERSION_ID]", request.version_id.to_string()),
        ]
        .map(|(key, value)| (key.to_string(), value));
        let status = self.transport.post_form(&url, &form).await?;
        tracing::debug!(%status, "Build pipeline trigger answered");
        Ok(status)
    }
}

fn project_url(base_url: &str, project_id: u64) -> String {
    format!("{}/projects/{project_id}", base_url.trim_end_matches('/'))
}

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

pub type TransportHandle = Arc<dyn Transport + Send + Sync>;

/// A response whose status the caller still has to judge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub body: String,
}

/// The two HTTP exchanges the GitLab API needs.
///
/// Implementations only fail when no response was received at all; any
/// status code, success or not, is returned to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `POST` an `application/x-www-form-urlencoded` body.
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<StatusCode>;

    /// `GET` with a bearer token.
    async fn get(&self, url: &str, bearer: &str) -> Result<Response>;
}

/// [`Transport`] over a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Transport)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<StatusCode> {
        let response = self.client.post(url).form(form).send().await.or_raise(|| ErrorKind::Transport)?;
        Ok(response.status())
    }

    async fn get(&self, url: &str, bearer: &str) -> Result<Response> {
        let response = self.client.get(url).bearer_auth(bearer).send().await.or_raise(|| ErrorKind::Transport)?;
        let status = response.status();
        let body = response.text().await.or_raise(|| ErrorKind::Transport)?;
        Ok(Response { status, body })
    }
}

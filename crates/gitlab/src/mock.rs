//! Scripted transport for testing.

use crate::error::Result;
use crate::transport::{Response, Transport};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::{Mutex, PoisonError};

type GetHandler = Box<dyn Fn(&str) -> Response + Send + Sync>;

/// A recorded `POST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPost {
    pub url: String,
    pub form: Vec<(String, String)>,
}
impl RecordedPost {
    /// Value of a form field, if it was sent.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.form.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }
}

/// In-memory [`Transport`] that records every call.
///
/// `POST`s answer with a fixed status (`201 Created` unless changed) and
/// `GET`s with whatever the handler returns for the URL (an empty JSON list
/// by default). Nothing ever leaves the process.
pub struct MockTransport {
    post_status: StatusCode,
    get_handler: GetHandler,
    posts: Mutex<Vec<RecordedPost>>,
    gets: Mutex<Vec<(String, String)>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            post_status: StatusCode::CREATED,
            get_handler: Box::new(|_| Response { status: StatusCode::OK, body: "[]".to_string() }),
            posts: Mutex::new(Vec::new()),
            gets: Mutex::new(Vec::new()),
        }
    }
}

impl MockTransport {
    pub fn with_post_status(mut self, status: StatusCode) -> Self {
        self.post_status = status;
        self
    }

    pub fn with_get_handler(mut self, handler: impl Fn(&str) -> Response + Send + Sync + 'static) -> Self {
        self.get_handler = Box::new(handler);
        self
    }

    /// Answer every pipeline listing with a full page (`per_page` items),
    /// as if the project had an unlimited number of pipelines.
    pub fn with_unlimited_pipelines(self) -> Self {
        self.with_get_handler(|url| {
            let per_page = query_param(url, "per_page").and_then(|v| v.parse::<usize>().ok()).unwrap_or(20);
            let status = query_param(url, "status").unwrap_or("pending");
            let items: Vec<String> =
                (0..per_page).map(|id| format!(r#"{{"id": {id}, "status": "{status}"}}"#)).collect();
            Response { status: StatusCode::OK, body: format!("[{}]", items.join(",")) }
        })
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Every `GET` URL with the bearer token it was sent with.
    pub fn gets(&self) -> Vec<(String, String)> {
        self.gets.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Total number of requests of any kind.
    pub fn call_count(&self) -> usize {
        self.posts.lock().unwrap_or_else(PoisonError::into_inner).len()
            + self.gets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Value of a query string parameter in `url`.
pub fn query_param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
    let (_, query) = url.split_once('?')?;
    query.split('&').filter_map(|pair| pair.split_once('=')).find(|(key, _)| *key == name).map(|(_, value)| value)
}

#[async_trait]
impl Transport for MockTransport {
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<StatusCode> {
        self.posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedPost { url: url.to_string(), form: form.to_vec() });
        Ok(self.post_status)
    }

    async fn get(&self, url: &str, bearer: &str) -> Result<Response> {
        self.gets.lock().unwrap_or_else(PoisonError::into_inner).push((url.to_string(), bearer.to_string()));
        Ok((self.get_handler)(url))
    }
}

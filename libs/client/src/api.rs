//! Typed client for the upstream repository's REST API.
//!
//! [`HorreumClient`] owns one [`RateLimitedTransport`], so every endpoint
//! below shares a single rate window and retry policy. Endpoints return
//! typed pages; unknown upstream fields are preserved in `extra` maps so
//! tool responses do not silently drop data the server added later.

use crate::config::RetryPolicy;
use crate::error::ClientError;
use crate::transport::{HttpSend, RateLimitedTransport};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Method, Request, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How many bytes of an upstream error body to keep in the error message.
const ERROR_BODY_LIMIT: usize = 256;

/// Sort order for upstream list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "Ascending",
            SortDirection::Descending => "Descending",
        }
    }
}

/// Query parameters for one upstream list page.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub limit: u64,
    /// 1-based page index.
    pub page: u64,
    pub sort: String,
    pub direction: SortDirection,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 100,
            page: 1,
            sort: "start".to_string(),
            direction: SortDirection::Descending,
        }
    }
}

/// One test definition, as listed by `/api/test`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSummary {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Upstream response shape for `/api/test`.
#[derive(Debug, Clone, Deserialize)]
pub struct TestPage {
    #[serde(default)]
    pub tests: Vec<TestSummary>,
    #[serde(default)]
    pub count: u64,
}

/// One run row from `/api/run/list/{testId}`.
///
/// The upstream emits `start` either as an epoch-millisecond number or as a
/// timestamp string depending on version, so it is kept raw here and
/// normalized through [`RunSummary::start_millis`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: i64,
    #[serde(rename = "testid", default)]
    pub test_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Value>,
    #[serde(default)]
    pub trashed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunSummary {
    /// Normalized start timestamp, epoch milliseconds.
    ///
    /// `None` when the field is absent or in a shape no strategy accepts;
    /// such records are excluded by time-window filtering.
    pub fn start_millis(&self) -> Option<i64> {
        timestamp_millis(self.start.as_ref()?)
    }
}

/// Upstream response shape for `/api/run/list/{testId}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunPage {
    #[serde(default)]
    pub runs: Vec<RunSummary>,
    #[serde(default)]
    pub total: u64,
}

/// Full run detail from `/api/run/{id}`, payload included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDetail {
    pub id: i64,
    #[serde(rename = "testid", default)]
    pub test_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Interpret a raw timestamp value as epoch milliseconds.
///
/// Accepts a JSON number, a digit string, or an RFC 3339 string.
pub(crate) fn timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                return s.parse().ok();
            }
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.timestamp_millis())
        }
        _ => None,
    }
}

/// Rate-limited, retrying client for one upstream instance.
pub struct HorreumClient<S = reqwest::Client> {
    transport: RateLimitedTransport<S>,
    base_url: Url,
    api_token: Option<String>,
}

impl<S> std::fmt::Debug for HorreumClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HorreumClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HorreumClient {
    /// Build a production client over `reqwest` with rustls.
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        policy: RetryPolicy,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("horreum-mcp/", env!("CARGO_PKG_VERSION")))
            .use_rustls_tls()
            .build()
            .map_err(ClientError::Network)?;
        Self::with_sender(http, base_url, api_token, policy)
    }
}

impl<S: HttpSend> HorreumClient<S> {
    /// Build a client over an arbitrary sender. Tests inject a scripted one.
    pub fn with_sender(
        sender: S,
        base_url: &str,
        api_token: Option<String>,
        policy: RetryPolicy,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| ClientError::InvalidBaseUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(format!(
                "{} has no path hierarchy",
                base_url
            )));
        }
        Ok(Self {
            transport: RateLimitedTransport::new(sender, policy)?,
            base_url,
            api_token,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        self.transport.policy()
    }

    #[cfg(test)]
    pub(crate) fn sender(&self) -> &S {
        self.transport.sender()
    }

    /// `GET /api/test?limit&page[&folder]`.
    pub async fn list_tests(
        &self,
        limit: u64,
        page: u64,
        folder: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<TestPage, ClientError> {
        let mut url = self.endpoint(&["api", "test"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("page", &page.to_string());
        if let Some(folder) = folder {
            url.query_pairs_mut().append_pair("folder", folder);
        }
        self.get_json(url, cancel).await
    }

    /// `GET /api/test/{id}`.
    pub async fn get_test(
        &self,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<TestSummary, ClientError> {
        let url = self.endpoint(&["api", "test", &id.to_string()])?;
        self.get_json(url, cancel).await
    }

    /// `GET /api/test/byName/{name}`.
    pub async fn get_test_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<TestSummary, ClientError> {
        let url = self.endpoint(&["api", "test", "byName", name])?;
        self.get_json(url, cancel).await
    }

    /// `GET /api/run/list/{testId}?limit&page&sort&direction`.
    pub async fn list_runs(
        &self,
        test_id: i64,
        query: &ListQuery,
        cancel: &CancellationToken,
    ) -> Result<RunPage, ClientError> {
        let mut url = self.endpoint(&["api", "run", "list", &test_id.to_string()])?;
        url.query_pairs_mut()
            .append_pair("limit", &query.limit.to_string())
            .append_pair("page", &query.page.to_string())
            .append_pair("sort", &query.sort)
            .append_pair("direction", query.direction.as_str());
        self.get_json(url, cancel).await
    }

    /// `GET /api/run/{id}`.
    pub async fn get_run(
        &self,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<RunDetail, ClientError> {
        let url = self.endpoint(&["api", "run", &id.to_string()])?;
        self.get_json(url, cancel).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, url: Url) -> Request {
        let mut request = Request::new(Method::GET, url);
        request
            .headers_mut()
            .insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.api_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                request.headers_mut().insert(AUTHORIZATION, value);
            }
        }
        request
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        cancel: &CancellationToken,
    ) -> Result<T, ClientError> {
        tracing::debug!(url = %url, "upstream GET");
        let response = self.transport.send(self.request(url), cancel).await?;
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(ClientError::Decode);
        }

        // Retryable statuses reaching this point have outlasted the budget.
        match status.as_u16() {
            429 => Err(ClientError::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            }),
            status @ (502 | 503 | 504) => Err(ClientError::TransientStatus { status }),
            status => {
                let mut body = response.text().await.unwrap_or_default();
                if body.len() > ERROR_BODY_LIMIT {
                    let mut cut = ERROR_BODY_LIMIT;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                }
                Err(ClientError::UpstreamStatus { status, body })
            }
        }
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let seconds: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(seconds))
}

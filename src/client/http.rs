//! HTTP client for the orchestration server
//!
//! Thin reqwest wrapper. Retrying is left to the callers: polls are simply
//! repeated by the supervisor loop, updates go through `worker::update`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::types::{Task, TaskRefUpdate, TaskResult};
use crate::version::build_info;

use super::{PollRequest, TaskClient};

/// Header carrying the access token
pub const AUTH_HEADER: &str = "X-Authorization";

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for the HTTP task client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL of the server API (e.g. "http://localhost:8080/api")
    pub base_url: String,

    /// Access token sent with every request
    pub auth_token: Option<String>,

    /// Timeout for non-poll requests; polls add their long-poll timeout
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            auth_token: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// HTTP Task Client
// ─────────────────────────────────────────────────────────────────

/// `TaskClient` backed by the server's REST API
pub struct HttpTaskClient {
    base_url: Url,
    auth_token: Option<String>,
    request_timeout: Duration,
    client: Client,
}

impl HttpTaskClient {
    /// Create a client; fails when the base URL is unusable
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;
        let client = Client::builder()
            .user_agent(build_info().user_agent())
            .build()?;

        debug!(base_url = %base_url, "HTTP task client created");

        Ok(Self {
            base_url,
            auth_token: config.auth_token.filter(|t| !t.is_empty()),
            request_timeout: config.request_timeout,
            client,
        })
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL from path segments (each segment is escaped)
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl {
                url: self.base_url.to_string(),
                message: "cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth_token {
            Some(ref token) => request.header(AUTH_HEADER, token),
            None => request,
        }
    }
}

#[async_trait]
impl TaskClient for HttpTaskClient {
    async fn batch_poll(&self, request: &PollRequest) -> Result<Vec<Task>> {
        let mut url = self.endpoint(&["tasks", "poll", "batch", &request.task_type])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("workerid", &request.worker_id)
                .append_pair("count", &request.count.to_string())
                .append_pair("timeout", &request.timeout.as_millis().to_string());
            if let Some(ref domain) = request.domain {
                query.append_pair("domain", domain);
            }
        }

        trace!(url = %url, "Polling for tasks");

        let response = self
            .authorize(self.client.get(url))
            .timeout(self.request_timeout + request.timeout)
            .send()
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        let response = check_status(response).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn update_task(&self, result: &TaskResult) -> Result<()> {
        let url = self.endpoint(&["tasks"])?;

        trace!(task_id = %result.task_id, status = %result.status, "Submitting task result");

        let response = self
            .authorize(self.client.post(url))
            .timeout(self.request_timeout)
            .json(result)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn update_task_by_ref_name(&self, update: &TaskRefUpdate, worker_id: &str) -> Result<()> {
        let mut url = self.endpoint(&[
            "tasks",
            &update.workflow_instance_id,
            &update.task_reference_name,
            update.status.as_str(),
        ])?;
        url.query_pairs_mut().append_pair("workerid", worker_id);

        let response = self
            .authorize(self.client.post(url))
            .timeout(self.request_timeout)
            .json(&update.output_data)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

/// Parse and sanity-check the configured base URL
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl {
            url: raw.to_string(),
            message: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if url.cannot_be_a_base() {
        return Err(Error::InvalidUrl {
            url: raw.to_string(),
            message: "cannot be a base URL".to_string(),
        });
    }

    Ok(url)
}

/// Turn a non-success response into `Error::ServerResponse`
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::server_response(status.as_u16(), body))
}

//! HTTP Status Reader against the orchestration service's v1 API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{StatusCode, Url};
use rollwatch_id::{AllocationId, EvaluationId, JobId, Namespace};
use rollwatch_reconcile::{Allocation, AllocationStub, Evaluation};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::reader::{ReadError, StatusReader};

/// Header carrying the ACL token.
pub const TOKEN_HEADER: &str = "x-nomad-token";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to reach the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerEndpoint {
    /// Base address, e.g. `http://127.0.0.1:4646`.
    pub address: String,

    /// ACL token sent with every request, if any.
    pub token: Option<String>,

    /// Timeout applied to each request.
    pub request_timeout: Duration,
}

impl SchedulerEndpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Status Reader over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStatusReader {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpStatusReader {
    /// Create a reader for an endpoint.
    pub fn new(endpoint: &SchedulerEndpoint) -> Result<Self, ReadError> {
        let base_url = Url::parse(&endpoint.address)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ReadError::InvalidAddress(endpoint.address.clone()))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = &endpoint.token {
            let value = HeaderValue::from_str(token)
                .map_err(|_| ReadError::Other("ACL token contains invalid characters".into()))?;
            headers.insert(HeaderName::from_static(TOKEN_HEADER), value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(endpoint.request_timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Base address requests are made against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a URL from path segments, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Make a GET request and decode the JSON body.
    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        kind: &'static str,
        id: &str,
    ) -> Result<T, ReadError> {
        debug!(url = %url, kind, "Reading scheduler status");

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ReadError::NotFound {
                kind,
                id: id.to_string(),
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ReadError::Status {
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ReadError::Decode {
            kind,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl StatusReader for HttpStatusReader {
    async fn evaluation(&self, id: &EvaluationId) -> Result<Evaluation, ReadError> {
        let url = self.url(&["v1", "evaluation", id.as_str()]);
        self.get(url, EvaluationId::KIND, id.as_str()).await
    }

    async fn job_allocations(
        &self,
        job_id: &JobId,
        namespace: &Namespace,
    ) -> Result<Vec<AllocationStub>, ReadError> {
        let mut url = self.url(&["v1", "job", job_id.as_str(), "allocations"]);
        url.query_pairs_mut()
            .append_pair("namespace", namespace.as_str());
        self.get(url, JobId::KIND, job_id.as_str()).await
    }

    async fn allocation(&self, id: &AllocationId) -> Result<Allocation, ReadError> {
        let url = self.url(&["v1", "allocation", id.as_str()]);
        self.get(url, AllocationId::KIND, id.as_str()).await
    }
}

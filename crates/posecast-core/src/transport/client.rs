//! HTTP transport for telemetry reports

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::error::{Error, Result};

/// Default request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// A fully prepared outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    pub content_type: &'static str,
    pub authorization: Option<String>,
    pub body: String,
}

impl OutboundRequest {
    pub fn json(url: impl Into<String>, body: String) -> Self {
        Self {
            url: url.into(),
            content_type: "application/json",
            authorization: None,
            body,
        }
    }
}

/// Something that can deliver a request and report its HTTP status
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// POST the request. Non-success statuses are errors.
    async fn post(&self, request: OutboundRequest) -> Result<u16>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: HttpClient,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: OutboundRequest) -> Result<u16> {
        let mut builder = self
            .http_client
            .post(&request.url)
            .header(CONTENT_TYPE, request.content_type);
        if let Some(authorization) = &request.authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }

        let response = builder.body(request.body).send().await?;
        let status = response.status();
        debug!(url = %request.url, status = status.as_u16(), "Report delivered");

        if !status.is_success() {
            return Err(Error::Http(status.as_u16()));
        }
        Ok(status.as_u16())
    }
}

use crate::config::Settings;
use anyhow::Context;
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;

const MAX_RETRIES: u32 = 2;
const MIN_BASE_DELAY_MS: u64 = 50;
const MAX_BASE_DELAY_MS: u64 = 2_000;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub json: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            json: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            json: Some(body),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// One HTTP round trip. Errors are transport failures only; any status code
/// the server answered with comes back as `Ok`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, req: &HttpRequest) -> anyhow::Result<HttpResponse>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build upstream http client")?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, req: &HttpRequest) -> anyhow::Result<HttpResponse> {
        let mut builder = self.http.request(req.method.clone(), req.url.as_str());
        if let Some(body) = &req.json {
            builder = builder.json(body);
        }
        let res = builder
            .send()
            .await
            .with_context(|| format!("{} {} failed", req.method, req.url))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .context("failed to read upstream response body")?;
        Ok(HttpResponse { status, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Clamps to at most 2 retries and a 50..=2000ms base delay.
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        let base_ms = (base_delay.as_millis() as u64).clamp(MIN_BASE_DELAY_MS, MAX_BASE_DELAY_MS);
        Self {
            retries: retries.min(MAX_RETRIES),
            base_delay: Duration::from_millis(base_ms),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.upstream_retries, settings.upstream_base_delay)
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Delay slept after the 0-indexed `attempt` fails.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_RETRIES, Duration::from_millis(250))
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[derive(Clone)]
pub struct ResilientFetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn fetch(&self, req: &HttpRequest, request_name: &str) -> anyhow::Result<HttpResponse> {
        self.fetch_with_policy(req, self.policy, request_name).await
    }

    /// Retries 429/5xx and transport errors. A failing status that survives
    /// every retry is returned as data; an error is returned only when the
    /// final attempt itself failed in transport.
    pub async fn fetch_with_policy(
        &self,
        req: &HttpRequest,
        policy: RetryPolicy,
        request_name: &str,
    ) -> anyhow::Result<HttpResponse> {
        let mut attempt: u32 = 0;
        loop {
            let backoff = policy.delay_for(attempt);
            match self.transport.send(req).await {
                Ok(res) => {
                    let retryable = should_retry_status(res.status);
                    if !retryable || attempt >= policy.retries {
                        if attempt > 0 && !retryable {
                            tracing::info!(
                                event = "upstream_retry_recovered",
                                request_name,
                                attempts = attempt + 1,
                                status = res.status.as_u16(),
                                "upstream recovered after retry"
                            );
                        }
                        return Ok(res);
                    }
                    tracing::warn!(
                        event = "upstream_retry",
                        request_name,
                        attempt = attempt + 1,
                        status = res.status.as_u16(),
                        next_delay_ms = backoff.as_millis() as u64,
                        "upstream HTTP error; retrying"
                    );
                }
                Err(err) => {
                    if attempt >= policy.retries {
                        return Err(err);
                    }
                    tracing::warn!(
                        event = "upstream_retry",
                        request_name,
                        attempt = attempt + 1,
                        error = %err,
                        next_delay_ms = backoff.as_millis() as u64,
                        "upstream request failed; retrying"
                    );
                }
            }

            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

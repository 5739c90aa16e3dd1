use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::time::{sleep, Instant};
use url::Url;

use crate::config::{ApiConfig, RetryPolicy};
use crate::error::{CrawlError, Result};
use crate::limiter::RateLimiter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: String,
}

/// A single authenticated HTTP GET.
pub trait Transport: Send + Sync {
    fn get<'a>(&'a self, url: &'a Url, token: &'a str) -> BoxFuture<'a, Result<RawResponse>>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    cli: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let cli = reqwest::ClientBuilder::new()
            .gzip(true)
            .deflate(true)
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout))
            .build()?;
        Ok(Self { cli })
    }
}

impl Transport for HttpTransport {
    fn get<'a>(&'a self, url: &'a Url, token: &'a str) -> BoxFuture<'a, Result<RawResponse>> {
        Box::pin(async move {
            let resp = self.cli.get(url.clone()).bearer_auth(token).send().await?;
            let status = resp.status().as_u16();
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let body = resp.text().await?;
            Ok(RawResponse {
                status,
                retry_after,
                body,
            })
        })
    }
}

/// Stack Exchange API client sending every request through one rate limiter.
pub struct ApiClient<T = HttpTransport> {
    transport: T,
    config: ApiConfig,
    token: String,
    limiter: RateLimiter,
    requests_sent: AtomicUsize,
}

impl ApiClient<HttpTransport> {
    pub fn new(config: &ApiConfig, token: impl Into<String>) -> Result<Self> {
        Self::with_transport(HttpTransport::new(config)?, config, token)
    }
}

impl<T> ApiClient<T>
where
    T: Transport,
{
    pub fn with_transport(
        transport: T,
        config: &ApiConfig,
        token: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            transport,
            config: config.clone(),
            token: token.into(),
            limiter: RateLimiter::new(config.min_interval()?),
            requests_sent: AtomicUsize::new(0),
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Number of HTTP requests issued so far, retries included.
    pub fn requests_sent(&self) -> usize {
        self.requests_sent.load(Ordering::SeqCst)
    }

    /// Builds the URL of an API method, `path` being relative to the base URL.
    pub fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = self.config.base_url.join(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("site", &self.config.site);
        }
        Ok(url)
    }

    /// Sends a GET request and returns its JSON body.
    ///
    /// Quota exceeded responses and backoff advisories are waited out and the
    /// identical request is sent again, within the limits of the retry policy.
    pub async fn send(&self, url: &Url) -> Result<Value> {
        let mut request_url = url.clone();
        request_url
            .query_pairs_mut()
            .append_pair("key", &self.config.key);

        let started = Instant::now();
        let mut retries = 0;
        loop {
            let permit = self.limiter.acquire().await;
            let resp = self.transport.get(&request_url, &self.token).await?;
            permit.release();
            self.requests_sent.fetch_add(1, Ordering::SeqCst);
            log::debug!("GET {url} -> {}", resp.status);

            let wait = match self.inspect(url, resp)? {
                Outcome::Done(body) => return Ok(body),
                Outcome::Retry(wait) => wait,
            };

            retries += 1;
            if !within_budget(&self.config.retry, retries, started.elapsed(), wait) {
                return Err(CrawlError::RetryExhausted {
                    url: url.to_string(),
                    retries: retries - 1,
                });
            }
            sleep(wait).await;
        }
    }

    fn inspect(&self, url: &Url, resp: RawResponse) -> Result<Outcome> {
        if resp.status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
            let secs = resp
                .retry_after
                .as_deref()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(self.config.default_retry_after);
            log::warn!("Quota exceeded - retrying {url} after {secs} seconds");
            return Ok(Outcome::Retry(Duration::from_secs(secs)));
        }

        let body: Value =
            serde_json::from_str(&resp.body).map_err(|source| CrawlError::MalformedResponse {
                url: url.to_string(),
                source,
            })?;

        if let Some(quota) = body.get("quota_remaining").and_then(Value::as_u64) {
            log::debug!("Quota remaining: {quota}");
        }

        if let Some(backoff) = body.get("backoff").and_then(Value::as_f64) {
            log::warn!("Received backoff - waiting {backoff} seconds before retrying {url}");
            let wait = Duration::try_from_secs_f64(backoff.max(0.0) * self.config.backoff_margin)
                .unwrap_or(Duration::MAX);
            return Ok(Outcome::Retry(wait));
        }

        if resp.status != StatusCode::OK.as_u16() {
            return Err(CrawlError::HttpError {
                url: url.to_string(),
                status: resp.status,
                message: body
                    .get("error_message")
                    .and_then(Value::as_str)
                    .map(String::from),
            });
        }

        Ok(Outcome::Done(body))
    }
}

enum Outcome {
    Done(Value),
    Retry(Duration),
}

fn within_budget(policy: &RetryPolicy, retries: usize, elapsed: Duration, wait: Duration) -> bool {
    if retries > policy.max_retries {
        return false;
    }
    match policy.max_elapsed {
        Some(max) => elapsed
            .checked_add(wait)
            .map_or(false, |total| total <= Duration::from_secs(max)),
        None => true,
    }
}

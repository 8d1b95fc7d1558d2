//! HTTP fetcher implementation
//!
//! This module handles every request the harvester sends:
//! - Building one HTTP client per proxy endpoint
//! - Rotating proxy and user agent on every attempt
//! - Bounded retries with failover to the next proxy
//! - Capping the number of requests in flight across the whole run
//! - Error classification

use crate::config::CrawlerConfig;
use crate::crawler::identity::IdentityPool;
use crate::crawler::proxy::{ProxyEndpoint, ProxyPool};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// One attempt's worth of request parameters
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub timeout: Duration,
    /// User agent sent with this attempt
    pub identity: String,
}

/// Why an attempt (and eventually a whole fetch) failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The attempt exceeded its timeout
    Timeout,

    /// Connection refused, proxy failure, TLS error, broken body, ...
    Connection(String),

    /// The server answered outside the 2xx range
    NonOkStatus(u16),

    /// `max_retries` was zero, nothing was sent
    NotAttempted,
}

impl FailureReason {
    /// Timeouts are routine with public proxies and log below warn
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Connection(message) => write!(f, "connection error: {}", message),
            Self::NonOkStatus(code) => write!(f, "HTTP {}", code),
            Self::NotAttempted => f.write_str("not attempted"),
        }
    }
}

/// Result of a logical fetch
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The first attempt that returned a 2xx status
    Success {
        /// Page body content
        body: String,
        /// HTTP status code
        status_code: u16,
    },

    /// Every attempt failed; carries the last observed reason
    Failure {
        reason: FailureReason,
        attempts: u32,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Consumes the outcome, keeping only a successful body
    pub fn into_body(self) -> Option<String> {
        match self {
            Self::Success { body, .. } => Some(body),
            Self::Failure { .. } => None,
        }
    }
}

/// Response of a single attempt as seen by the fetcher
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status_code: u16,
    pub body: String,
}

/// Sends a single request through a given proxy
///
/// `HttpTransport` is the production implementation; tests substitute a
/// scripted transport to exercise retry and failover behavior.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &FetchRequest,
        proxy: &ProxyEndpoint,
    ) -> Result<RawResponse, FailureReason>;
}

/// reqwest-backed transport with one client per proxy endpoint
///
/// Proxies are a client-level setting in reqwest, so each endpoint keeps its
/// own client (and connection pool).
pub struct HttpTransport {
    clients: HashMap<ProxyEndpoint, Client>,
}

impl HttpTransport {
    /// Builds a client for every endpoint in the pool
    pub fn new(pool: &ProxyPool) -> Result<Self, reqwest::Error> {
        let mut clients = HashMap::with_capacity(pool.len());
        for endpoint in pool.endpoints() {
            clients.insert(endpoint.clone(), build_proxy_client(endpoint)?);
        }
        Ok(Self { clients })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &FetchRequest,
        proxy: &ProxyEndpoint,
    ) -> Result<RawResponse, FailureReason> {
        let client = match self.clients.get(proxy) {
            Some(client) => client.clone(),
            None => build_proxy_client(proxy)
                .map_err(|e| FailureReason::Connection(e.to_string()))?,
        };

        let response = client
            .get(&request.url)
            .header(USER_AGENT, &request.identity)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(classify_error)?;

        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            return Ok(RawResponse {
                status_code,
                body: String::new(),
            });
        }

        let body = response.text().await.map_err(classify_error)?;
        Ok(RawResponse { status_code, body })
    }
}

/// Builds an HTTP client routed through `endpoint`
///
/// # Arguments
///
/// * `endpoint` - The proxy every request of this client goes through
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - The proxy URL was rejected or the client failed to build
pub fn build_proxy_client(endpoint: &ProxyEndpoint) -> Result<Client, reqwest::Error> {
    let mut proxy = Proxy::all(endpoint.url())?;
    if let Some(credentials) = &endpoint.credentials {
        proxy = proxy.basic_auth(&credentials.user, &credentials.password);
    }

    Client::builder()
        .proxy(proxy)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

fn classify_error(error: reqwest::Error) -> FailureReason {
    if error.is_timeout() {
        FailureReason::Timeout
    } else if error.is_connect() {
        FailureReason::Connection(format!("connect failed: {}", error))
    } else {
        FailureReason::Connection(error.to_string())
    }
}

/// Retry and concurrency knobs of a `Fetcher`
#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
    pub max_retries: u32,
    pub timeout: Duration,
    pub max_concurrent_requests: usize,
}

impl From<&CrawlerConfig> for FetchSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_concurrent_requests: config.max_concurrent_requests as usize,
        }
    }
}

/// Performs logical GETs with proxy failover
pub struct Fetcher {
    pool: Arc<ProxyPool>,
    transport: Arc<dyn Transport>,
    identities: IdentityPool,
    in_flight: Arc<Semaphore>,
    settings: FetchSettings,
}

impl Fetcher {
    pub fn new(
        pool: Arc<ProxyPool>,
        transport: Arc<dyn Transport>,
        identities: IdentityPool,
        settings: FetchSettings,
    ) -> Self {
        Self {
            pool,
            transport,
            identities,
            in_flight: Arc::new(Semaphore::new(settings.max_concurrent_requests.max(1))),
            settings,
        }
    }

    /// Fetches `url` with the configured retry count and timeout
    pub async fn get(&self, url: &str) -> FetchOutcome {
        self.fetch(url, self.settings.max_retries, self.settings.timeout)
            .await
    }

    /// Fetches a URL, failing over to a new proxy on every attempt
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Return `Success` immediately |
    /// | Any other status | Next attempt, next proxy |
    /// | Timeout | Next attempt, next proxy |
    /// | Connection / transport error | Next attempt, next proxy |
    ///
    /// After `max_retries` failed attempts the last reason is returned as
    /// `Failure`. Callers skip the unit of work; nothing here is fatal.
    pub async fn fetch(&self, url: &str, max_retries: u32, timeout: Duration) -> FetchOutcome {
        let mut last_reason = FailureReason::NotAttempted;
        let mut last_proxy = None;

        for attempt in 1..=max_retries {
            let proxy = self.pool.next();
            let request = FetchRequest {
                url: url.to_string(),
                timeout,
                identity: self.identities.random().to_string(),
            };

            let result = {
                let _permit = self.in_flight.acquire().await.ok();
                self.transport.send(&request, &proxy).await
            };

            match result {
                Ok(response) if (200..300).contains(&response.status_code) => {
                    tracing::debug!(
                        url,
                        proxy = %proxy,
                        attempt,
                        status = response.status_code,
                        "Fetched"
                    );
                    return FetchOutcome::Success {
                        body: response.body,
                        status_code: response.status_code,
                    };
                }
                Ok(response) => last_reason = FailureReason::NonOkStatus(response.status_code),
                Err(reason) => last_reason = reason,
            }

            if last_reason.is_timeout() {
                tracing::info!(
                    url,
                    proxy = %proxy,
                    attempt,
                    max_retries,
                    reason = %last_reason,
                    "Attempt timed out, rotating proxy"
                );
            } else {
                tracing::warn!(
                    url,
                    proxy = %proxy,
                    attempt,
                    max_retries,
                    reason = %last_reason,
                    "Attempt failed, rotating proxy"
                );
            }
            last_proxy = Some(proxy);
        }

        let last_proxy = last_proxy.map(|p| p.to_string()).unwrap_or_default();
        tracing::warn!(
            url,
            last_proxy = %last_proxy,
            attempts = max_retries,
            reason = %last_reason,
            "Giving up after exhausting retries"
        );

        FetchOutcome::Failure {
            reason: last_reason,
            attempts: max_retries,
        }
    }

    pub fn settings(&self) -> FetchSettings {
        self.settings
    }
}

//! Proxy health check
//!
//! Sends one request to a known address through every endpoint of the pool
//! and reports which endpoints answer with a 2xx status. Nothing is retried:
//! a check is a single attempt per proxy.

use crate::config::Config;
use crate::crawler::fetcher::{FailureReason, FetchRequest, Transport};
use crate::crawler::identity::IdentityPool;
use crate::crawler::proxy::{ProxyEndpoint, ProxyPool};
use crate::crawler::scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;

/// Result of checking one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCheck {
    pub endpoint: ProxyEndpoint,
    /// Status code on a response, the failure otherwise
    pub outcome: Result<u16, FailureReason>,
}

impl ProxyCheck {
    pub fn is_working(&self) -> bool {
        matches!(self.outcome, Ok(status) if (200..300).contains(&status))
    }
}

/// Checks every proxy of a pool against a fixed address
pub struct ProxyChecker {
    transport: Arc<dyn Transport>,
    identities: IdentityPool,
    check_url: String,
    timeout: Duration,
    scheduler: Scheduler,
}

impl ProxyChecker {
    pub fn new(
        transport: Arc<dyn Transport>,
        identities: IdentityPool,
        check_url: impl Into<String>,
        timeout: Duration,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            transport,
            identities,
            check_url: check_url.into(),
            timeout,
            scheduler,
        }
    }

    /// Checker using the `[proxies]` check settings
    ///
    /// Checks run with `max-concurrent-requests` in flight.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self::new(
            transport,
            IdentityPool::new(config.identity.user_agents.clone()),
            config.proxies.check_url.clone(),
            Duration::from_secs(config.proxies.check_timeout_secs),
            Scheduler::concurrent(config.crawler.max_concurrent_requests as usize),
        )
    }

    /// Checks each endpoint once; results follow the pool order
    pub async fn check(&self, pool: &ProxyPool) -> Vec<ProxyCheck> {
        let mut checks = self
            .scheduler
            .map_bounded(pool.endpoints().iter().enumerate(), |(index, endpoint)| async move {
                (index, self.check_one(endpoint).await)
            })
            .await;
        checks.sort_by_key(|(index, _)| *index);

        let checks: Vec<ProxyCheck> = checks.into_iter().map(|(_, check)| check).collect();
        let working = checks.iter().filter(|check| check.is_working()).count();
        tracing::info!(
            url = %self.check_url,
            working,
            total = checks.len(),
            "Proxy check finished"
        );

        checks
    }

    async fn check_one(&self, endpoint: &ProxyEndpoint) -> ProxyCheck {
        let request = FetchRequest {
            url: self.check_url.clone(),
            timeout: self.timeout,
            identity: self.identities.random().to_string(),
        };

        let outcome = self
            .transport
            .send(&request, endpoint)
            .await
            .map(|response| response.status_code);

        match &outcome {
            Ok(status) => tracing::debug!(proxy = %endpoint, status, "Proxy answered"),
            Err(reason) => tracing::debug!(proxy = %endpoint, reason = %reason, "Proxy failed"),
        }

        ProxyCheck {
            endpoint: endpoint.clone(),
            outcome,
        }
    }
}

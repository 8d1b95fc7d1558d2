//! Crawler module for fetching and walking collections
//!
//! This module contains the core harvesting logic, including:
//! - Proxy pool rotation and user agent selection
//! - HTTP fetching with per-attempt proxy failover
//! - Page planning for paginated collections
//! - Bounded concurrent scheduling
//! - Proxy health checks
//! - Overall harvest coordination

mod coordinator;
mod fetcher;
mod health;
mod identity;
mod pagination;
mod proxy;
mod scheduler;

pub use coordinator::{CollectionReport, Coordinator, HarvestOptions, RunSummary};
pub use fetcher::{
    build_proxy_client, FailureReason, FetchOutcome, FetchRequest, FetchSettings, Fetcher,
    HttpTransport, RawResponse, Transport,
};
pub use health::{ProxyCheck, ProxyChecker};
pub use identity::{IdentityPool, DEFAULT_USER_AGENTS};
pub use pagination::{PageTask, PaginationPlanner};
pub use proxy::{ProxyCredentials, ProxyEndpoint, ProxyPool};
pub use scheduler::Scheduler;

use crate::config::Config;

/// Runs a complete harvest operation
///
/// This is the main entry point for a run. It will:
/// 1. Load the proxy pool and build one HTTP client per proxy
/// 2. Open the record store
/// 3. Discover collections from the seeds
/// 4. Fetch pages and items, appending new records
///
/// # Arguments
///
/// * `config` - A validated configuration
///
/// # Returns
///
/// * `Ok(RunSummary)` - The run finished
/// * `Err(HarvestError)` - Setup failed, or every attempted store write failed
pub async fn harvest(config: &Config) -> crate::Result<RunSummary> {
    let coordinator = Coordinator::from_config(config)?;
    coordinator.run(&config.seeds).await.into_result()
}

/// Checks every configured proxy once against `proxies.check-url`
///
/// # Returns
///
/// * `Ok(Vec<ProxyCheck>)` - One result per endpoint, in file order
/// * `Err(HarvestError)` - The proxy file is unreadable or empty, or a client failed to build
pub async fn check_proxies(config: &Config) -> crate::Result<Vec<ProxyCheck>> {
    let pool = ProxyPool::load(std::path::Path::new(&config.proxies.path))?;
    let transport = std::sync::Arc::new(HttpTransport::new(&pool)?);
    Ok(ProxyChecker::from_config(config, transport).check(&pool).await)
}

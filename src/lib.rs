//! Ripple-Harvest: a resumable, proxy-rotating collection harvester
//!
//! This crate walks paginated collections on a remote site, fetches every item
//! through a rotating pool of proxies, and appends extracted records to a
//! persisted store that doubles as the deduplication index between runs.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Ripple-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition for {collection}: {from} -> {to}")]
    InvalidTransition {
        collection: String,
        from: state::CollectionState,
        to: state::CollectionState,
    },

    #[error("No record could be written to {path}: {failures} write(s) failed")]
    StoreUnwritable { path: String, failures: u64 },
}

/// Configuration-specific errors
///
/// Every variant is fatal: the run aborts before any request is sent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Failed to read proxy file {path}: {source}")]
    ProxyFile {
        path: String,
        source: std::io::Error,
    },

    #[error("No valid proxies found in {0}")]
    NoProxies(String),
}

/// Result type alias for Ripple-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, FetchOutcome, Fetcher, ProxyEndpoint, ProxyPool, RunSummary};
pub use state::CollectionState;
pub use storage::{DedupStore, Record, SharedStore};

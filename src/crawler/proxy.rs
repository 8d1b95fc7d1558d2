//! Proxy pool with round-robin rotation
//!
//! The proxy file holds one endpoint per line, either `host:port` or
//! `host:port:user:password`. Malformed lines are skipped with a warning; a
//! file without a single usable line is a configuration error.

use crate::ConfigError;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;

/// Basic-auth credentials for a proxy
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ProxyCredentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// A single configured proxy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub credentials: Option<ProxyCredentials>,
}

impl ProxyEndpoint {
    /// Proxy URL without credentials, e.g. `http://10.0.0.1:8080`
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Parses one line of the proxy file
    ///
    /// Returns `None` for anything that is not exactly 2 or 4 colon-separated
    /// fields with a non-empty host and a numeric port.
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.trim().split(':').collect();

        let (host, port, credentials) = match fields.as_slice() {
            [host, port] => (*host, *port, None),
            [host, port, user, password] => (
                *host,
                *port,
                Some(ProxyCredentials {
                    user: user.to_string(),
                    password: password.to_string(),
                }),
            ),
            _ => return None,
        };

        if host.is_empty() {
            return None;
        }
        let port = port.parse::<u16>().ok()?;

        Some(Self {
            host: host.to_string(),
            port,
            credentials,
        })
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Cyclic, thread-safe pool of proxy endpoints
///
/// Endpoints are handed out in insertion order; every endpoint is revisited
/// after a full cycle. The cursor is the only mutable state and is guarded by
/// a mutex so concurrent `next()` calls never observe the same position.
#[derive(Debug)]
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
    cursor: Mutex<usize>,
}

impl ProxyPool {
    /// Creates a pool from already parsed endpoints
    ///
    /// `source` is only used in the error message when `endpoints` is empty.
    pub fn new(endpoints: Vec<ProxyEndpoint>, source: &str) -> Result<Self, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::NoProxies(source.to_string()));
        }

        Ok(Self {
            endpoints,
            cursor: Mutex::new(0),
        })
    }

    /// Parses the content of a proxy file
    pub fn from_lines(content: &str, source: &str) -> Result<Self, ConfigError> {
        let mut endpoints = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            match ProxyEndpoint::parse(trimmed) {
                Some(endpoint) => endpoints.push(endpoint),
                None => {
                    // Only the host part is logged; the rest may hold a password
                    let host = trimmed.split(':').next().unwrap_or_default();
                    tracing::warn!(
                        source,
                        line = index + 1,
                        host,
                        "Skipping malformed proxy entry (expected host:port or host:port:user:password)"
                    );
                }
            }
        }

        tracing::info!("Loaded {} proxies from {}", endpoints.len(), source);

        Self::new(endpoints, source)
    }

    /// Reads and parses a proxy file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ProxyFile {
            path: source.clone(),
            source: e,
        })?;

        Self::from_lines(&content, &source)
    }

    /// Returns the next endpoint in round-robin order
    pub fn next(&self) -> ProxyEndpoint {
        let mut cursor = match self.cursor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let endpoint = self.endpoints[*cursor].clone();
        *cursor = (*cursor + 1) % self.endpoints.len();
        endpoint
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[ProxyEndpoint] {
        &self.endpoints
    }
}

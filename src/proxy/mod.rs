//! Round-robin proxy rotation
//!
//! The rotator is shared by every concurrent fetch of every source. Selection
//! is a single atomic increment, so no lock is held on the hot path.
//!
//! Each endpoint also carries a consecutive-failure counter. Once it reaches
//! the configured threshold the endpoint is passed over until a fetch through
//! it succeeds again. When every endpoint is tripped, plain round-robin is used
//! so that fetches keep flowing.

use crate::config::ProxyEntry;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while building a proxy pool
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProxyError {
    #[error("Proxy pool is empty")]
    EmptyPool,
}

/// One egress endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
}

impl ProxyEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Proxy URL understood by `reqwest::Proxy::all`
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl From<&ProxyEntry> for ProxyEndpoint {
    fn from(entry: &ProxyEntry) -> Self {
        Self::new(entry.host.clone(), entry.port)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Lock-free round-robin over a fixed pool of endpoints
#[derive(Debug)]
pub struct ProxyRotator {
    endpoints: Vec<ProxyEndpoint>,
    cursor: AtomicUsize,
    failures: Vec<AtomicU32>,
    failure_threshold: u32,
}

impl ProxyRotator {
    /// Creates a rotator over a non-empty pool
    ///
    /// A `failure_threshold` of 0 disables endpoint tripping.
    pub fn new(endpoints: Vec<ProxyEndpoint>, failure_threshold: u32) -> Result<Self, ProxyError> {
        if endpoints.is_empty() {
            return Err(ProxyError::EmptyPool);
        }

        let failures = endpoints.iter().map(|_| AtomicU32::new(0)).collect();
        Ok(Self {
            endpoints,
            cursor: AtomicUsize::new(0),
            failures,
            failure_threshold,
        })
    }

    /// Builds a rotator from the configured proxy entries
    ///
    /// Returns `None` when no proxies are configured.
    pub fn from_config(entries: &[ProxyEntry], failure_threshold: u32) -> Option<Self> {
        let endpoints = entries.iter().map(ProxyEndpoint::from).collect();
        Self::new(endpoints, failure_threshold).ok()
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

    /// Returns the next endpoint
    ///
    /// The cursor is advanced first, so with a fresh rotator the first call
    /// yields the endpoint at index `1 % n`. Wraparound of the cursor itself is
    /// harmless: only its value modulo the pool size matters.
    pub fn next(&self) -> &ProxyEndpoint {
        let n = self.endpoints.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1) % n;

        if self.failure_threshold == 0 {
            return &self.endpoints[start];
        }

        (0..n)
            .map(|offset| (start + offset) % n)
            .find(|&i| !self.tripped_at(i))
            .map(|i| &self.endpoints[i])
            .unwrap_or(&self.endpoints[start])
    }

    /// Counts a transport failure against an endpoint
    pub fn report_failure(&self, endpoint: &ProxyEndpoint) {
        let Some(i) = self.position(endpoint) else {
            return;
        };

        let failures = self.failures[i].fetch_add(1, Ordering::Relaxed) + 1;
        if self.failure_threshold > 0 && failures == self.failure_threshold {
            warn!(
                "Proxy {} tripped after {} consecutive failures",
                endpoint, failures
            );
        }
    }

    /// Clears the failure counter of an endpoint
    pub fn report_success(&self, endpoint: &ProxyEndpoint) {
        let Some(i) = self.position(endpoint) else {
            return;
        };

        let previous = self.failures[i].swap(0, Ordering::Relaxed);
        if self.failure_threshold > 0 && previous >= self.failure_threshold {
            info!("Proxy {} recovered", endpoint);
        }
    }

    pub fn is_tripped(&self, endpoint: &ProxyEndpoint) -> bool {
        self.position(endpoint)
            .map(|i| self.tripped_at(i))
            .unwrap_or(false)
    }

    fn tripped_at(&self, i: usize) -> bool {
        self.failure_threshold > 0
            && self.failures[i].load(Ordering::Relaxed) >= self.failure_threshold
    }

    fn position(&self, endpoint: &ProxyEndpoint) -> Option<usize> {
        self.endpoints.iter().position(|e| e == endpoint)
    }
}

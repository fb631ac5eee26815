//! Provider composition: TTL caching and bounded fail-open lookups

use crate::{ReputationProvider, ReputationSignals};
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use verdict_common::VerdictResult;

/// TTL cache in front of another provider
///
/// One window can reference the same destination from many pairs and
/// consecutive windows usually revisit the same destinations, so
/// successful lookups are kept for `ttl`.
pub struct CachedReputation {
    inner: Arc<dyn ReputationProvider>,
    ttl: chrono::Duration,
    cache: dashmap::DashMap<IpAddr, CacheEntry>,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    signals: ReputationSignals,
    expires_at: chrono::DateTime<chrono::Utc>,
}

impl CachedReputation {
    pub fn new(inner: Arc<dyn ReputationProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(24)),
            cache: dashmap::DashMap::new(),
        }
    }

    /// Drop expired entries
    pub fn evict_expired(&self) {
        let now = chrono::Utc::now();
        self.cache.retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl ReputationProvider for CachedReputation {
    async fn lookup(&self, addr: IpAddr) -> VerdictResult<ReputationSignals> {
        if let Some(entry) = self.cache.get(&addr) {
            if entry.expires_at > chrono::Utc::now() {
                return Ok(entry.signals);
            }
        }

        let signals = self.inner.lookup(addr).await?;
        self.cache.insert(
            addr,
            CacheEntry {
                signals,
                expires_at: chrono::Utc::now() + self.ttl,
            },
        );
        Ok(signals)
    }
}

/// Bounded lookup that fails open to zero signals
///
/// Wraps any provider with the pipeline's dependency policy: a lookup
/// that errors or exceeds the timeout contributes nothing to scoring
/// instead of blocking the endpoint verdict.
pub struct TimeoutReputation {
    inner: Arc<dyn ReputationProvider>,
    timeout: Duration,
}

impl TimeoutReputation {
    pub fn new(inner: Arc<dyn ReputationProvider>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl ReputationProvider for TimeoutReputation {
    async fn lookup(&self, addr: IpAddr) -> VerdictResult<ReputationSignals> {
        match tokio::time::timeout(self.timeout, self.inner.lookup(addr)).await {
            Ok(Ok(signals)) => Ok(signals),
            Ok(Err(e)) => {
                tracing::warn!(addr = %addr, error = %e, "reputation lookup failed, using zero signals");
                Ok(ReputationSignals::ZERO)
            }
            Err(_) => {
                tracing::warn!(addr = %addr, timeout_ms = self.timeout.as_millis() as u64,
                    "reputation lookup timed out, using zero signals");
                Ok(ReputationSignals::ZERO)
            }
        }
    }
}

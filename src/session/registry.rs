//! Client-visible to upstream session id mapping.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::observability::metrics;

/// Process-lifetime map of client session ids to upstream session ids.
///
/// Cloning yields a handle to the same map. Each operation is atomic; a
/// lookup followed by a bootstrap and an associate is not, unless callers
/// hold a [`BootstrapPermit`] for the client id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, String>>,
    inflight: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upstream id recorded for `client`.
    pub fn lookup(&self, client: &str) -> Option<String> {
        self.sessions.get(client).map(|r| r.value().clone())
    }

    /// Record `client → upstream`; with no client id, record `upstream → upstream`.
    pub fn associate(&self, client: Option<&str>, upstream: &str) {
        let key = client.unwrap_or(upstream);
        let previous = self.sessions.insert(key.to_string(), upstream.to_string());
        if previous.as_deref() != Some(upstream) {
            tracing::debug!(client_sid = %key, upstream_sid = %upstream, "Session mapped");
        }
        metrics::record_sessions(self.sessions.len());
    }

    /// Forget `client`. Returns the upstream id it mapped to.
    pub fn remove(&self, client: &str) -> Option<String> {
        let removed = self.sessions.remove(client).map(|(_, upstream)| upstream);
        if removed.is_some() {
            tracing::debug!(client_sid = %client, "Session mapping removed");
            metrics::record_sessions(self.sessions.len());
        }
        removed
    }

    /// Number of mapping entries.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Wait for exclusive right to bootstrap on behalf of `client`.
    pub async fn acquire(&self, client: &str) -> BootstrapPermit {
        let lock = self
            .inflight
            .entry(client.to_string())
            .or_default()
            .value()
            .clone();
        let guard = lock.lock_owned().await;

        BootstrapPermit {
            guard: Some(guard),
            key: client.to_string(),
            inflight: Arc::clone(&self.inflight),
        }
    }

    /// Client ids with a bootstrap permit held or awaited.
    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }
}

/// Exclusive right to bootstrap one client id.
///
/// The per-client lock entry is dropped together with its last holder.
pub struct BootstrapPermit {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    inflight: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for BootstrapPermit {
    fn drop(&mut self) {
        // release the lock before checking whether anyone else still holds it
        self.guard.take();
        self.inflight
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

//! Chaos injection wrapper for [`PeerClient`].
//!
//! [`ChaosPeerClient`] wraps any `C: PeerClient` and injects
//! configurable failures: random errors, per-peer partitions, and latency.

use crate::peer_client::{PeerClient, PeerError};
use driftkv_common::Patch;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;

/// Configuration for peer chaos injection.
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    /// Probability of returning an error \[0.0, 1.0\].
    pub failure_rate: f64,
    /// Fixed latency injected before forwarding.
    pub latency: Duration,
    /// Random additional latency in \[0, jitter\].
    pub jitter: Duration,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.0,
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }
}

/// A [`PeerClient`] wrapper that injects chaos (failures, latency, partitions).
pub struct ChaosPeerClient<C: PeerClient> {
    inner: Arc<C>,
    config: Arc<RwLock<ChaosConfig>>,
    /// Peers that are unreachable until recovered.
    partitioned: Arc<RwLock<HashSet<String>>>,
}

impl<C: PeerClient> std::fmt::Debug for ChaosPeerClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosPeerClient").finish_non_exhaustive()
    }
}

impl<C: PeerClient> ChaosPeerClient<C> {
    pub fn new(inner: C, config: ChaosConfig) -> Self {
        Self::wrap(Arc::new(inner), config)
    }

    /// Wrap a client that is shared with other callers.
    pub fn wrap(inner: Arc<C>, config: ChaosConfig) -> Self {
        Self {
            inner,
            config: Arc::new(RwLock::new(config)),
            partitioned: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Make `peer` unreachable until [`recover_peer`](Self::recover_peer).
    pub async fn fail_peer(&self, peer: &str) {
        self.partitioned.write().await.insert(peer.to_string());
    }

    pub async fn recover_peer(&self, peer: &str) {
        self.partitioned.write().await.remove(peer);
    }

    /// Dynamically update the random failure rate.
    pub async fn set_failure_rate(&self, rate: f64) {
        self.config.write().await.failure_rate = rate;
    }

    async fn maybe_fail(&self, peer: &str) -> Result<(), PeerError> {
        if self.partitioned.read().await.contains(peer) {
            return Err(PeerError::Transport("chaos: peer partitioned".into()));
        }

        let (delay, failure_rate) = {
            let config = self.config.read().await;
            let jitter_ms = if config.jitter.is_zero() {
                0
            } else {
                rand::thread_rng().gen_range(0..=config.jitter.as_millis() as u64)
            };
            (
                config.latency + Duration::from_millis(jitter_ms),
                config.failure_rate,
            )
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if failure_rate > 0.0 && rand::thread_rng().gen_bool(failure_rate.min(1.0)) {
            return Err(PeerError::Transport("chaos: random failure".into()));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl<C: PeerClient> PeerClient for ChaosPeerClient<C> {
    async fn push(&self, peer: &str, batch: &[Patch]) -> Result<(), PeerError> {
        self.maybe_fail(peer).await?;
        self.inner.push(peer, batch).await
    }
}

// ────────────────────────── Tests ──────────────────────────

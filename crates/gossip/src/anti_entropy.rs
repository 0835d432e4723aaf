//! The anti-entropy scheduler.
//!
//! Each round: pause for a random duration, sample up to K records under
//! the store lock, pick one peer, release the lock, push. Failures are
//! logged and dropped; the next round resamples.

use crate::peer_client::{PeerClient, PeerError};
use crate::selector::{RandomSelector, Selector};
use driftkv_store::LwwStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

/// Configuration for the anti-entropy background task.
#[derive(Debug, Clone)]
pub struct AntiEntropyConfig {
    /// Maximum records pushed per round.
    pub sample_size: usize,
    /// Pauses between rounds are drawn from `[0, max_delay)`.
    pub max_delay: Duration,
    /// Deadline for one push.
    pub send_timeout: Duration,
}

impl Default for AntiEntropyConfig {
    fn default() -> Self {
        Self {
            sample_size: 5,
            max_delay: Duration::from_secs(3),
            send_timeout: Duration::from_secs(2),
        }
    }
}

/// Result of a single round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Nothing to send (empty store or no peers).
    Idle,
    Delivered { peer: String, patches: usize },
    Failed { peer: String, patches: usize, error: String },
}

pub struct AntiEntropy<C: PeerClient, S: Selector = RandomSelector> {
    store: Arc<LwwStore>,
    peers: Vec<String>,
    client: Arc<C>,
    selector: Mutex<S>,
    config: AntiEntropyConfig,
}

impl<C: PeerClient, S: Selector> std::fmt::Debug for AntiEntropy<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AntiEntropy")
            .field("node", &self.store.node_id())
            .field("peers", &self.peers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: PeerClient> AntiEntropy<C, RandomSelector> {
    pub fn new(
        store: Arc<LwwStore>,
        peers: Vec<String>,
        client: Arc<C>,
        config: AntiEntropyConfig,
    ) -> Self {
        Self::with_selector(store, peers, client, config, RandomSelector::new())
    }
}

impl<C: PeerClient, S: Selector> AntiEntropy<C, S> {
    pub fn with_selector(
        store: Arc<LwwStore>,
        peers: Vec<String>,
        client: Arc<C>,
        config: AntiEntropyConfig,
        selector: S,
    ) -> Self {
        Self {
            store,
            peers,
            client,
            selector: Mutex::new(selector),
            config,
        }
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// Draw the pause before the next round.
    pub fn next_pause(&self) -> Duration {
        self.selector.lock().pause(self.config.max_delay)
    }

    /// Run one sample-and-push round.
    pub async fn run_round(&self) -> RoundOutcome {
        // Store lock and selector lock are both released before the push.
        let (batch, peer) = {
            let mut selector = self.selector.lock();
            let batch = self
                .store
                .sample(self.config.sample_size, |n, k| selector.pick_keys(n, k));
            if batch.is_empty() || self.peers.is_empty() {
                return RoundOutcome::Idle;
            }
            let idx = selector.pick_peer(self.peers.len()) % self.peers.len();
            (batch, self.peers[idx].clone())
        };

        let m = driftkv_metrics::metrics();
        m.gossip_rounds.inc();
        let patches = batch.len();
        tracing::debug!(
            node = %self.store.node_id(),
            %peer,
            patches,
            "pushing anti-entropy batch"
        );

        let result = {
            let _timer = driftkv_metrics::start_gossip_timer();
            match tokio::time::timeout(self.config.send_timeout, self.client.push(&peer, &batch))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(PeerError::Timeout(self.config.send_timeout)),
            }
        };

        match result {
            Ok(()) => {
                m.gossip_sent.inc_by(patches as u64);
                tracing::debug!(%peer, patches, "anti-entropy push delivered");
                RoundOutcome::Delivered { peer, patches }
            }
            Err(e) => {
                m.gossip_failures.inc();
                tracing::warn!(
                    node = %self.store.node_id(),
                    "failed to send {} patch(es) to {}: {}",
                    patches,
                    peer,
                    e
                );
                RoundOutcome::Failed {
                    peer,
                    patches,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Spawn the background loop. It stops at the next round boundary once
    /// `shutdown` turns `true` or its sender is dropped.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                node = %self.store.node_id(),
                "anti-entropy started with {} peer(s)",
                self.peers.len()
            );
            loop {
                if *shutdown.borrow() {
                    break;
                }
                let pause = self.next_pause();
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                self.run_round().await;
            }
            tracing::info!(node = %self.store.node_id(), "anti-entropy stopped");
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

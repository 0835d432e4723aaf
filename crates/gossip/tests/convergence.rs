//! Multi-replica convergence tests.
//!
//! Several stores gossip through an in-memory peer client with chaos
//! injected; every replica must end up with the same records.

use driftkv_common::{Patch, Write};
use driftkv_gossip::chaos::{ChaosConfig, ChaosPeerClient};
use driftkv_gossip::{AntiEntropy, AntiEntropyConfig, PeerClient, PeerError, RandomSelector};
use driftkv_store::LwwStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

// ────────────────────────── InMemPeerClient ──────────────────────────

/// Delivers pushes straight into the target replica's store.
struct InMemPeerClient {
    registry: HashMap<String, Arc<LwwStore>>,
}

#[async_trait::async_trait]
impl PeerClient for InMemPeerClient {
    async fn push(&self, peer: &str, batch: &[Patch]) -> Result<(), PeerError> {
        let store = self
            .registry
            .get(peer)
            .ok_or_else(|| PeerError::Transport(format!("unknown peer {}", peer)))?;
        store.apply(batch.iter().cloned().map(Write::from));
        Ok(())
    }
}

// ────────────────────────── TestCluster ──────────────────────────

type Node = AntiEntropy<ChaosPeerClient<InMemPeerClient>, RandomSelector>;

struct TestCluster {
    names: Vec<String>,
    stores: Vec<Arc<LwwStore>>,
    nodes: Vec<Arc<Node>>,
    chaos: Arc<ChaosPeerClient<InMemPeerClient>>,
}

impl TestCluster {
    fn new(n: usize, chaos_config: ChaosConfig) -> Self {
        let names: Vec<String> = (0..n).map(|i| format!("node-{}:8080", i)).collect();
        let stores: Vec<Arc<LwwStore>> = names
            .iter()
            .map(|name| Arc::new(LwwStore::new(name.clone())))
            .collect();

        let registry = names.iter().cloned().zip(stores.iter().cloned()).collect();
        let chaos = Arc::new(ChaosPeerClient::new(
            InMemPeerClient { registry },
            chaos_config,
        ));

        let config = AntiEntropyConfig {
            sample_size: 5,
            max_delay: Duration::from_millis(30),
            send_timeout: Duration::from_millis(500),
        };

        let nodes = stores
            .iter()
            .enumerate()
            .map(|(i, store)| {
                let peers = names
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, p)| p.clone())
                    .collect();
                Arc::new(AntiEntropy::with_selector(
                    store.clone(),
                    peers,
                    chaos.clone(),
                    config.clone(),
                    RandomSelector::seeded(1000 + i as u64),
                ))
            })
            .collect();

        Self {
            names,
            stores,
            nodes,
            chaos,
        }
    }

    fn converged(&self) -> bool {
        let first = self.stores[0].snapshot();
        self.stores.iter().all(|s| s.snapshot() == first)
    }

    /// Drive rounds on every node until converged or `max_rounds` is hit.
    async fn run_until_converged(&self, max_rounds: usize) -> usize {
        for round in 0..max_rounds {
            if self.converged() {
                return round;
            }
            for node in &self.nodes {
                node.run_round().await;
            }
        }
        panic!("cluster did not converge within {} rounds", max_rounds);
    }
}

/// Each replica takes local writes on a disjoint key range, plus some
/// conflicting writes on shared keys.
fn seed_writes(cluster: &TestCluster) {
    for (i, store) in cluster.stores.iter().enumerate() {
        for k in 0..6 {
            store.write_local(format!("own-{}-{}", i, k), format!("v{}", k));
        }
        store.apply([
            Write::from(Patch::new("shared", format!("from-{}", i), 7)),
            Write::from(Patch::new("hot", format!("n{}", i), i as u64)),
        ]);
    }
}

#[tokio::test]
async fn test_cluster_converges_without_failures() {
    let cluster = TestCluster::new(4, ChaosConfig::default());
    seed_writes(&cluster);
    assert!(!cluster.converged());

    cluster.run_until_converged(2000).await;

    let first = &cluster.stores[0];
    assert_eq!(first.len(), 4 * 6 + 2);
    // Equal timestamps on "shared": the greatest value wins everywhere.
    assert_eq!(first.get("shared").map(|r| r.value), Some("from-3".into()));
    // Highest timestamp on "hot" wins.
    assert_eq!(first.get("hot").map(|r| r.value), Some("n3".into()));
}

#[tokio::test]
async fn test_cluster_converges_under_random_failures() {
    let cluster = TestCluster::new(
        4,
        ChaosConfig {
            failure_rate: 0.4,
            ..Default::default()
        },
    );
    seed_writes(&cluster);

    cluster.run_until_converged(4000).await;
    assert!(cluster.converged());
}

#[tokio::test]
async fn test_partitioned_node_catches_up_after_recovery() {
    let cluster = TestCluster::new(3, ChaosConfig::default());
    seed_writes(&cluster);

    let isolated = cluster.names[2].clone();
    cluster.chaos.fail_peer(&isolated).await;

    // Node 2 can still push out, but nobody can push to it.
    for _ in 0..300 {
        for node in &cluster.nodes {
            node.run_round().await;
        }
    }
    let isolated_store = &cluster.stores[2];
    assert!(
        isolated_store.get("own-0-0").is_none(),
        "partitioned node must not have received node 0's writes"
    );

    cluster.chaos.recover_peer(&isolated).await;
    cluster.run_until_converged(2000).await;
    assert_eq!(isolated_store.get("own-0-0").map(|r| r.value), Some("v0".into()));
}

#[tokio::test]
async fn test_spawned_loops_converge() {
    tokio::time::pause();

    let cluster = TestCluster::new(3, ChaosConfig::default());
    seed_writes(&cluster);

    let (tx, rx) = watch::channel(false);
    let handles: Vec<_> = cluster
        .nodes
        .iter()
        .map(|node| node.clone().spawn(rx.clone()))
        .collect();

    let mut waited = Duration::ZERO;
    while !cluster.converged() {
        assert!(
            waited < Duration::from_secs(600),
            "spawned cluster did not converge"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        waited += Duration::from_millis(100);
    }

    tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }
}

//! driftkv-node: entry point for a single replica.
//!
//! Loads config (YAML file plus `NODE_ID` / `REPLICAS` / `LISTEN`
//! overrides), builds the LWW store, starts the anti-entropy loop and
//! serves the HTTP API on the configured listen address.

use driftkv_gossip::{AntiEntropy, AntiEntropyConfig};
use driftkv_net::{ApiState, HttpPeerClient};
use driftkv_store::LwwStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    driftkv_metrics::init_tracing();

    // First CLI arg is the YAML config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let vars: HashMap<String, String> = std::env::vars().collect();

    let config = match driftkv_config::load(std::path::Path::new(&config_path), &vars) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration ({}): {}", config_path, e);
            return Err(e.into());
        }
    };
    tracing::info!(
        node = %config.node_id,
        peers = ?config.peers,
        "starting replica on {}",
        config.listen
    );

    let store = Arc::new(LwwStore::new(config.node_id.clone()));
    let client = Arc::new(HttpPeerClient::new(config.gossip.send_timeout())?);

    let gossip_config = AntiEntropyConfig {
        sample_size: config.gossip.sample_size,
        max_delay: config.gossip.max_delay(),
        send_timeout: config.gossip.send_timeout(),
    };
    let anti_entropy = Arc::new(AntiEntropy::new(
        store.clone(),
        config.peers.clone(),
        client,
        gossip_config,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let gossip_handle = anti_entropy.spawn(shutdown_rx);

    // Spawn metrics HTTP server if configured
    if let Some(metrics_port) = config.metrics_port {
        let metrics_addr = std::net::SocketAddr::from(([0, 0, 0, 0], metrics_port));
        tokio::spawn(async move {
            if let Err(e) = driftkv_metrics::serve_metrics(metrics_addr).await {
                tracing::warn!("metrics server failed: {}", e);
            }
        });
    }

    let listener = TcpListener::bind(config.listen).await?;
    tracing::info!("serving HTTP on {}", listener.local_addr()?);

    let state = ApiState::new(store, config.peers.clone());
    driftkv_net::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("received Ctrl+C, shutting down");
    })
    .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = gossip_handle.await {
        tracing::warn!("anti-entropy task ended abnormally: {}", e);
    }

    Ok(())
}

//! HTTP networking layer for driftkv.
//!
//! Provides:
//! - `build_router`: the axum `Router` with the ingest (`POST /patch`),
//!   read (`POST /getKey`) and admin (`GET /health`, `GET /stats`) routes
//! - `HttpPeerClient`: implements `PeerClient` over reqwest
//! - `serve`: runs the router on a bound listener until shutdown

pub mod peer_client;
pub mod server;

pub use peer_client::HttpPeerClient;
pub use server::{build_router, ApiError, ApiState};

use std::future::Future;
use tokio::net::TcpListener;

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: ApiState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

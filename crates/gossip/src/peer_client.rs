//! Abstraction over pushing a batch to a peer's ingest endpoint.
//!
//! Concrete implementation lives in `driftkv-net::peer_client`.

use driftkv_common::{Patch, WireError};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("peer answered with status {0}")]
    Status(u16),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("batch not encodable: {0}")]
    Encode(#[from] WireError),
}

/// Outbound transport used by the anti-entropy loop.
#[async_trait::async_trait]
pub trait PeerClient: Send + Sync + 'static {
    /// Deliver `batch` to the peer at `peer` (`host:port`).
    async fn push(&self, peer: &str, batch: &[Patch]) -> Result<(), PeerError>;
}

//! HTTP client implementing `PeerClient`.
//!
//! `HttpPeerClient` posts JSON batches to a peer's `/patch` endpoint via
//! reqwest, reusing one connection pool for all peers.

use driftkv_common::{encode_batch, Patch};
use driftkv_gossip::{PeerClient, PeerError};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    /// Build a client whose requests are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, PeerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PeerError::Transport(format!("building HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Peers are plain `host:port`, optionally prefixed with `http://`.
    /// No TLS backend is built in, so any other scheme is refused up front.
    fn patch_url(peer: &str) -> Result<String, PeerError> {
        let base = peer.trim_end_matches('/');
        let host = base.strip_prefix("http://").unwrap_or(base);
        if host.contains("://") {
            return Err(PeerError::Transport(format!(
                "unsupported peer address {:?}: only http is available",
                peer
            )));
        }
        Ok(format!("http://{}/patch", host))
    }
}

#[async_trait::async_trait]
impl PeerClient for HttpPeerClient {
    async fn push(&self, peer: &str, batch: &[Patch]) -> Result<(), PeerError> {
        let body = encode_batch(batch)?;
        let response = self
            .client
            .post(Self::patch_url(peer)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| PeerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PeerError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_url() {
        assert_eq!(
            HttpPeerClient::patch_url("10.0.0.1:8080").unwrap(),
            "http://10.0.0.1:8080/patch"
        );
        assert_eq!(
            HttpPeerClient::patch_url("http://node-2:8080/").unwrap(),
            "http://node-2:8080/patch"
        );
    }

    #[test]
    fn test_patch_url_rejects_tls_scheme() {
        assert!(matches!(
            HttpPeerClient::patch_url("https://node-3"),
            Err(PeerError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_push_to_tls_peer_fails_before_sending() {
        let client = HttpPeerClient::new(Duration::from_secs(1)).unwrap();
        let err = client
            .push("https://node-3:8443", &[Patch::new("a", "x", 1)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("only http"), "got {}", err);
    }
}

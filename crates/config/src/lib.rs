//! Configuration schema and loader for driftkv nodes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Opaque node identifier, used only for logging and attribution.
    #[serde(default)]
    pub node_id: String,

    /// This node's HTTP listen address.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Static replica set (`host:port`).
    #[serde(default)]
    pub peers: Vec<String>,

    /// Anti-entropy settings.
    #[serde(default)]
    pub gossip: GossipConfig,

    /// Optional Prometheus metrics HTTP port.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipConfig {
    /// Maximum number of keys pushed per round.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Upper bound (exclusive) of the randomized pause between rounds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Deadline for one push to a peer.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            max_delay_ms: default_max_delay_ms(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl GossipConfig {
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

// --- Defaults ---

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
fn default_sample_size() -> usize {
    5
}
fn default_max_delay_ms() -> u64 {
    3000
}
fn default_send_timeout_ms() -> u64 {
    2000
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Environment variables that override file settings.
pub const ENV_NODE_ID: &str = "NODE_ID";
pub const ENV_REPLICAS: &str = "REPLICAS";
pub const ENV_LISTEN: &str = "LISTEN";

impl NodeConfig {
    /// A config with defaults everywhere; identity and peers must still be set.
    pub fn empty() -> Self {
        Self {
            node_id: String::new(),
            listen: default_listen(),
            peers: Vec::new(),
            gossip: GossipConfig::default(),
            metrics_port: None,
        }
    }

    /// Validate that configuration values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.trim().is_empty() {
            return Err(ConfigError::Invalid("node_id must be set".into()));
        }
        if self.peers.is_empty() {
            return Err(ConfigError::Invalid("peers must not be empty".into()));
        }
        if let Some(bad) = self.peers.iter().find(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "peers contains an empty address: {:?}",
                bad
            )));
        }
        if self.gossip.sample_size == 0 {
            return Err(ConfigError::Invalid("gossip.sample_size must be > 0".into()));
        }
        if self.gossip.max_delay_ms == 0 {
            return Err(ConfigError::Invalid("gossip.max_delay_ms must be > 0".into()));
        }
        if self.gossip.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "gossip.send_timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Apply `NODE_ID`, `REPLICAS` and `LISTEN` from the given variable set.
    ///
    /// `REPLICAS` is a comma-separated peer list and replaces `peers`.
    pub fn apply_overrides(&mut self, vars: &HashMap<String, String>) -> Result<(), ConfigError> {
        if let Some(id) = vars.get(ENV_NODE_ID).filter(|v| !v.is_empty()) {
            self.node_id = id.clone();
        }
        if let Some(replicas) = vars.get(ENV_REPLICAS).filter(|v| !v.is_empty()) {
            self.peers = replicas
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }
        if let Some(listen) = vars.get(ENV_LISTEN).filter(|v| !v.is_empty()) {
            self.listen = listen
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("{}={}: {}", ENV_LISTEN, listen, e)))?;
        }
        Ok(())
    }
}

/// Load a `NodeConfig` from a YAML file path.
pub fn load_from_file(path: &std::path::Path) -> Result<NodeConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: NodeConfig = serde_yaml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Load a `NodeConfig` from a YAML string.
pub fn load_from_str(yaml: &str) -> Result<NodeConfig, ConfigError> {
    let config: NodeConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

/// Load a node's configuration the way the binary does: optional YAML file,
/// then environment overrides, then validation.
///
/// A missing file is tolerated so that a node can be configured purely
/// from the environment.
pub fn load(
    path: &std::path::Path,
    vars: &HashMap<String, String>,
) -> Result<NodeConfig, ConfigError> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str(&contents)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => NodeConfig::empty(),
        Err(e) => return Err(e.into()),
    };
    config.apply_overrides(vars)?;
    config.validate()?;
    Ok(config)
}

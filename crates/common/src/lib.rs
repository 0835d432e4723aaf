//! driftkv-common: shared types for the driftkv project.
//!
//! Provides the logical `Timestamp`, the stored `Record`, the replicated
//! `Patch`, and the `Write` intent that the merge engine consumes. The
//! JSON wire shape (`WirePatch`) lives here too, so the server and the
//! peer client agree on it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value of the per-node scalar logical clock.
pub type Timestamp = u64;

/// Largest timestamp the JSON wire format can carry.
///
/// Stores never hold or mint a timestamp above this, so every stored
/// record stays encodable.
pub const MAX_TIMESTAMP: Timestamp = i64::MAX as Timestamp;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// The currently winning state for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub value: String,
    pub timestamp: Timestamp,
}

impl Record {
    pub fn new(value: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// A timestamped write, as disseminated between replicas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Patch {
    pub key: String,
    pub value: String,
    pub timestamp: Timestamp,
}

impl Patch {
    pub fn new(key: impl Into<String>, value: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            timestamp,
        }
    }

    /// Rebuild the patch that carries an already-stored record.
    pub fn from_record(key: impl Into<String>, record: &Record) -> Self {
        Self::new(key, record.value.clone(), record.timestamp)
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}@{}", self.key, self.value, self.timestamp)
    }
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// A write intent entering the merge engine.
///
/// `Local` writes get their timestamp from the receiving node's clock;
/// `Replicated` writes keep the timestamp they were stored with elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Local { key: String, value: String },
    Replicated(Patch),
}

impl Write {
    pub fn local(key: impl Into<String>, value: impl Into<String>) -> Self {
        Write::Local {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Write::Local { key, .. } => key,
            Write::Replicated(patch) => &patch.key,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Write::Local { value, .. } => value,
            Write::Replicated(patch) => &patch.value,
        }
    }

    /// The carried timestamp, or `None` for a local write.
    pub fn timestamp(&self) -> Option<Timestamp> {
        match self {
            Write::Local { .. } => None,
            Write::Replicated(patch) => Some(patch.timestamp),
        }
    }
}

impl From<Patch> for Write {
    fn from(patch: Patch) -> Self {
        Write::Replicated(patch)
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// JSON shape of one element of a `/patch` request body.
///
/// A negative `timestamp` marks a fresh local write whose clock value is
/// assigned by the receiving node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePatch {
    pub key: String,
    pub value: String,
    pub timestamp: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    #[error("timestamp {0} does not fit the wire format")]
    TimestampOverflow(Timestamp),
}

impl From<WirePatch> for Write {
    fn from(wire: WirePatch) -> Self {
        if wire.timestamp < 0 {
            Write::Local {
                key: wire.key,
                value: wire.value,
            }
        } else {
            Write::Replicated(Patch {
                key: wire.key,
                value: wire.value,
                timestamp: wire.timestamp as Timestamp,
            })
        }
    }
}

impl TryFrom<&Patch> for WirePatch {
    type Error = WireError;

    fn try_from(patch: &Patch) -> Result<Self, Self::Error> {
        let timestamp = i64::try_from(patch.timestamp)
            .map_err(|_| WireError::TimestampOverflow(patch.timestamp))?;
        Ok(Self {
            key: patch.key.clone(),
            value: patch.value.clone(),
            timestamp,
        })
    }
}

/// Encode a batch for the wire.
pub fn encode_batch(batch: &[Patch]) -> Result<Vec<WirePatch>, WireError> {
    batch.iter().map(WirePatch::try_from).collect()
}

/// Decode a wire batch into merge-engine writes, preserving order.
pub fn decode_batch(batch: Vec<WirePatch>) -> Vec<Write> {
    batch.into_iter().map(Write::from).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

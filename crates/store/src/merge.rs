//! Conflict resolution for a single LWW register.

use driftkv_common::{Record, Timestamp};

/// What happened to one incoming write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The key had no record.
    Inserted,
    /// The incoming timestamp was strictly newer.
    Replaced,
    /// Equal timestamps; the incoming value was strictly greater.
    TieBreakWon,
    /// Equal timestamps and equal values.
    Duplicate,
    /// The stored record is newer, or wins the tie-break.
    Stale,
}

impl MergeOutcome {
    /// Whether the write replaces (or creates) the stored record.
    pub fn is_accepted(self) -> bool {
        matches!(
            self,
            MergeOutcome::Inserted | MergeOutcome::Replaced | MergeOutcome::TieBreakWon
        )
    }
}

/// Decide whether `(value, timestamp)` wins against the stored record.
///
/// Higher timestamp wins; equal timestamps fall back to string order on
/// the value, so two replicas that minted the same timestamp for
/// different values still agree on the winner.
pub fn resolve(existing: Option<&Record>, value: &str, timestamp: Timestamp) -> MergeOutcome {
    let Some(current) = existing else {
        return MergeOutcome::Inserted;
    };

    match current.timestamp.cmp(&timestamp) {
        std::cmp::Ordering::Less => MergeOutcome::Replaced,
        std::cmp::Ordering::Greater => MergeOutcome::Stale,
        std::cmp::Ordering::Equal => match value.cmp(current.value.as_str()) {
            std::cmp::Ordering::Greater => MergeOutcome::TieBreakWon,
            std::cmp::Ordering::Equal => MergeOutcome::Duplicate,
            std::cmp::Ordering::Less => MergeOutcome::Stale,
        },
    }
}

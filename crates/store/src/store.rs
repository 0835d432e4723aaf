//! The record store: key -> record map plus the logical clock, behind one lock.

use crate::merge::{self, MergeOutcome};
use driftkv_common::{Patch, Record, Timestamp, Write, MAX_TIMESTAMP};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

/// Counts from one [`LwwStore::apply`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Writes that created or replaced a record.
    pub accepted: usize,
    /// Writes that left the store untouched (stale or duplicate).
    pub rejected: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<String, Record>,
    clock: Timestamp,
}

impl StoreState {
    fn apply_one(&mut self, write: Write) -> (Patch, MergeOutcome) {
        let (key, value, timestamp) = match write {
            Write::Local { key, value } => (key, value, self.clock),
            Write::Replicated(patch) => (patch.key, patch.value, patch.timestamp),
        };
        // Anything above the wire ceiling would make the record unencodable.
        let timestamp = timestamp.min(MAX_TIMESTAMP);

        let outcome = merge::resolve(self.records.get(&key), &value, timestamp);
        if outcome.is_accepted() {
            self.records
                .insert(key.clone(), Record::new(value.clone(), timestamp));
            self.clock = self.clock.saturating_add(1).min(MAX_TIMESTAMP);
        }
        // Rejected writes still fast-forward the clock.
        self.clock = self.clock.max(timestamp);

        (
            Patch {
                key,
                value,
                timestamp,
            },
            outcome,
        )
    }
}

/// A node's replica of the map.
///
/// Every read and write takes the same mutex, and [`apply`](Self::apply)
/// holds it for the whole batch, so a batch is atomic to other observers.
/// Nothing here awaits or performs I/O while the lock is held.
#[derive(Debug)]
pub struct LwwStore {
    node_id: String,
    state: Mutex<StoreState>,
}

impl LwwStore {
    /// Create an empty store with the clock at zero.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Merge a batch of writes, in order, under one critical section.
    pub fn apply<I>(&self, batch: I) -> ApplySummary
    where
        I: IntoIterator<Item = Write>,
    {
        let mut summary = ApplySummary::default();
        let (keys, clock) = {
            let mut state = self.state.lock();
            for write in batch {
                let (patch, outcome) = state.apply_one(write);
                if outcome.is_accepted() {
                    summary.accepted += 1;
                    tracing::debug!(
                        node = %self.node_id,
                        key = %patch.key,
                        timestamp = patch.timestamp,
                        ?outcome,
                        "node {} applied {}",
                        self.node_id,
                        patch
                    );
                } else {
                    summary.rejected += 1;
                    tracing::trace!(node = %self.node_id, %patch, ?outcome, "write rejected");
                }
            }
            (state.records.len(), state.clock)
        };

        let m = driftkv_metrics::metrics();
        m.patches_received
            .inc_by((summary.accepted + summary.rejected) as u64);
        m.patches_applied.inc_by(summary.accepted as u64);
        m.patches_stale.inc_by(summary.rejected as u64);
        m.store_keys.set(i64::try_from(keys).unwrap_or(i64::MAX));
        m.logical_clock.set(i64::try_from(clock).unwrap_or(i64::MAX));

        summary
    }

    /// Convenience for a single local write.
    pub fn write_local(&self, key: impl Into<String>, value: impl Into<String>) -> ApplySummary {
        self.apply([Write::local(key, value)])
    }

    /// Look up the current record for a key.
    pub fn get(&self, key: &str) -> Option<Record> {
        self.state.lock().records.get(key).cloned()
    }

    /// Current logical clock value.
    pub fn clock(&self) -> Timestamp {
        self.state.lock().clock
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records as patches, sorted by key.
    pub fn snapshot(&self) -> Vec<Patch> {
        self.state
            .lock()
            .records
            .iter()
            .map(|(k, rec)| Patch::from_record(k.as_str(), rec))
            .collect()
    }

    /// Sample up to `k` records for dissemination.
    ///
    /// `pick(n, k)` returns indices into the key-sorted list of `n` keys;
    /// out-of-range and repeated indices are ignored. Selection and the
    /// record reads happen in the same critical section, so every returned
    /// patch is the record as stored at one instant. The stored timestamps
    /// are carried verbatim.
    pub fn sample<F>(&self, k: usize, pick: F) -> Vec<Patch>
    where
        F: FnOnce(usize, usize) -> Vec<usize>,
    {
        let state = self.state.lock();
        let n = state.records.len();
        if k == 0 || n == 0 {
            return Vec::new();
        }
        if k >= n {
            return state
                .records
                .iter()
                .map(|(key, rec)| Patch::from_record(key.as_str(), rec))
                .collect();
        }

        let chosen: BTreeSet<usize> = pick(n, k).into_iter().filter(|&i| i < n).collect();
        let mut wanted = chosen.into_iter().take(k).peekable();

        // One ordered walk; stops at the last wanted index.
        let mut batch = Vec::with_capacity(k);
        for (i, (key, rec)) in state.records.iter().enumerate() {
            match wanted.peek() {
                None => break,
                Some(&w) if w == i => {
                    batch.push(Patch::from_record(key.as_str(), rec));
                    wanted.next();
                }
                Some(_) => {}
            }
        }
        batch
    }
}

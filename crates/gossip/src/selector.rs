//! Random choices made by the anti-entropy loop.
//!
//! Behind a trait so tests can script exactly which keys, which peer and
//! which pause a round uses.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

pub trait Selector: Send + 'static {
    /// Choose `k` distinct indices out of `0..n` (`k <= n`).
    fn pick_keys(&mut self, n: usize, k: usize) -> Vec<usize>;

    /// Choose one index out of `0..m` (`m > 0`).
    fn pick_peer(&mut self, m: usize) -> usize;

    /// Choose the pause before the next round, in `[0, max)`.
    fn pause(&mut self, max: Duration) -> Duration;
}

/// Uniform selection backed by a seedable RNG.
#[derive(Debug)]
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible selection, for simulations.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector for RandomSelector {
    fn pick_keys(&mut self, n: usize, k: usize) -> Vec<usize> {
        rand::seq::index::sample(&mut self.rng, n, k.min(n)).into_vec()
    }

    fn pick_peer(&mut self, m: usize) -> usize {
        self.rng.gen_range(0..m)
    }

    fn pause(&mut self, max: Duration) -> Duration {
        let max_nanos = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
        if max_nanos == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.rng.gen_range(0..max_nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pick_keys_distinct_and_in_range() {
        let mut sel = RandomSelector::seeded(7);
        for _ in 0..100 {
            let picked = sel.pick_keys(20, 5);
            assert_eq!(picked.len(), 5);
            let unique: HashSet<usize> = picked.iter().copied().collect();
            assert_eq!(unique.len(), 5, "indices must be distinct: {:?}", picked);
            assert!(picked.iter().all(|&i| i < 20));
        }
    }

    #[test]
    fn test_pick_keys_clamps_k() {
        let mut sel = RandomSelector::seeded(1);
        assert_eq!(sel.pick_keys(3, 10).len(), 3);
    }

    #[test]
    fn test_pick_peer_covers_all_peers() {
        let mut sel = RandomSelector::seeded(42);
        let seen: HashSet<usize> = (0..500).map(|_| sel.pick_peer(4)).collect();
        assert_eq!(seen, (0..4).collect());
    }

    #[test]
    fn test_pause_bounds() {
        let mut sel = RandomSelector::seeded(3);
        let max = Duration::from_secs(3);
        for _ in 0..200 {
            assert!(sel.pause(max) < max);
        }
        assert_eq!(sel.pause(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_sub_millisecond_pause_is_not_truncated() {
        let mut sel = RandomSelector::seeded(5);
        let max = Duration::from_micros(500);
        let pauses: Vec<Duration> = (0..50).map(|_| sel.pause(max)).collect();
        assert!(pauses.iter().all(|p| *p < max));
        assert!(pauses.iter().any(|p| !p.is_zero()));
    }

    #[test]
    fn test_huge_pause_bound_does_not_wrap() {
        let mut sel = RandomSelector::seeded(6);
        let max = Duration::from_secs(u64::MAX);
        assert!(sel.pause(max) < max);
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = RandomSelector::seeded(99);
        let mut b = RandomSelector::seeded(99);
        assert_eq!(a.pick_keys(50, 5), b.pick_keys(50, 5));
        assert_eq!(a.pick_peer(9), b.pick_peer(9));
    }
}

//! Anti-entropy for driftkv.
//!
//! Each node runs one background loop that, at randomized intervals,
//! samples a few records from its store and pushes them to one randomly
//! chosen peer. Delivery is best effort: the merge rule is idempotent and
//! commutative, so lost or repeated pushes only delay convergence.

pub mod anti_entropy;
pub mod chaos;
pub mod peer_client;
pub mod selector;

pub use anti_entropy::{AntiEntropy, AntiEntropyConfig, RoundOutcome};
pub use peer_client::{PeerClient, PeerError};
pub use selector::{RandomSelector, Selector};

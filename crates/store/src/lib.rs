//! In-memory LWW record store for driftkv.
//!
//! A map of independent last-writer-wins registers sharing one scalar
//! logical clock. Local writes and replicated batches both go through
//! [`LwwStore::apply`]; the anti-entropy loop reads through
//! [`LwwStore::sample`].

pub mod merge;
pub mod store;

pub use merge::MergeOutcome;
pub use store::{ApplySummary, LwwStore};

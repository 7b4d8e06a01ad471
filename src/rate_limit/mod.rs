//! Fixed-window admission control.
//!
//! The store tracks one counter per partition key. Callers decide what a
//! key means; the HTTP middleware partitions by route and client address.

mod store;

pub use store::{PartitionStore, Verdict};

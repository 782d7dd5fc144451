//! Coordination with the remote cache of derived installment data.
//!
//! This module provides:
//! - The cache key, metadata and per-key state types
//! - A `RemoteStore` seam with an HTTP implementation of the store endpoints
//! - A best-effort `CacheCoordinator` that never surfaces transport errors

mod coordinator;
mod store;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use coordinator::CacheCoordinator;
pub use store::{HttpStore, RemoteStore};
pub use types::{CacheKey, CacheState};

//! Ordered-list and counter storage used by producers and workers
//!
//! Everything dispatchbox persists goes through [`ListStore`]: queues and the
//! failure log are lists, statistics are counters. Two adapters ship with the
//! crate:
//!
//! - [`FjallStore`] - persistent, backed by a Fjall keyspace
//! - [`MemoryStore`] - in-process, for tests and embedding

mod disk;
mod memory;

pub use disk::FjallStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt value under key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage primitives over named ordered lists and counters
///
/// `pop_head` must be atomic: when several workers share one store, any
/// pushed value is returned by exactly one pop.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Append a value to the tail of the list, returning the new length
    async fn push_tail(&self, key: &str, value: String) -> Result<usize>;

    /// Remove and return the head of the list, `None` when empty
    async fn pop_head(&self, key: &str) -> Result<Option<String>>;

    /// Atomically add one to a counter, returning the new value
    async fn increment(&self, key: &str) -> Result<i64>;

    /// Current counter value (0 when never incremented)
    async fn counter(&self, key: &str) -> Result<i64>;

    async fn len(&self, key: &str) -> Result<usize>;

    /// Up to `limit` values starting at index `start`, head first
    async fn range(&self, key: &str, start: usize, limit: usize) -> Result<Vec<String>>;
}

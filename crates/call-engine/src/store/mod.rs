//! Shared state store adapter
//!
//! All cross-call state (queues, agents, waiting calls, rotation pointers)
//! lives in an external key/value store; this module is the only place that
//! talks to it. The [`StateStore`] trait captures the operations the
//! repository needs — hash, set, ordered list, string, counter and expiry —
//! so the backend can be swapped:
//!
//! - [`RedisStore`] is the production backend.
//! - [`MemoryStore`] backs tests and storeless development, the same way the
//!   engine's database layer offers an in-memory mode elsewhere in the stack.

pub mod keys;
pub mod memory;
pub mod redis;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Store failures, opaque to callers beyond their category.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Store command error: {0}")]
    Command(String),

    #[error("Stored value could not be decoded: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Typed operations over the shared key/value store.
///
/// Lists are FIFO: values are pushed at the tail and popped from the head.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Set all given fields on a hash key.
    async fn hash_set_all(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// Read all fields of a hash key; empty when the key is absent.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Add a member to a set.
    async fn set_add(&self, key: &str, member: &str) -> Result<()>;

    /// Remove a member from a set.
    async fn set_remove(&self, key: &str, member: &str) -> Result<()>;

    /// All members of a set; empty when the key is absent.
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Append a value at the tail of a list.
    async fn list_push_tail(&self, key: &str, value: &str) -> Result<()>;

    /// Pop the value at the head of a list.
    async fn list_pop_head(&self, key: &str) -> Result<Option<String>>;

    /// Remove every occurrence of `value` from a list; returns the count removed.
    async fn list_remove(&self, key: &str, value: &str) -> Result<usize>;

    /// All values of a list in order; empty when the key is absent.
    async fn list_range(&self, key: &str) -> Result<Vec<String>>;

    /// Read a string key.
    async fn string_get(&self, key: &str) -> Result<Option<String>>;

    /// Write a string key.
    async fn string_set(&self, key: &str, value: &str) -> Result<()>;

    /// Increment a counter key by one; returns the new value.
    async fn counter_incr(&self, key: &str) -> Result<i64>;

    /// Expire a key after the given number of seconds.
    async fn key_expire(&self, key: &str, seconds: usize) -> Result<()>;
}

//! Key-value store used as the cross-process mutual exclusion primitive.
//!
//! Every coordination decision (wallet locks, token nonces, batch progress)
//! goes through this trait so that several stateless server instances can
//! share one Redis.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;

use crate::error::StoreError;

pub use memory::MemoryLockStore;
pub use redis_store::RedisLockStore;

#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically create `key` with a TTL. Returns true iff this call created it.
    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, StoreError>;

    /// Unconditionally write `key`, with an optional TTL.
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove `key`. Returns true iff this call removed a live key, so
    /// concurrent deleters can tell which of them consumed it.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// All live keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

// src/storage/mod.rs

pub mod memory;
pub mod redis;

#[cfg(test)]
mod tests;

pub use memory::MemoryStorage;
pub use redis::RedisStorage;

use super::error::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Key/value store backing the authoritative tier of the cross-region cache
#[async_trait]
pub trait DurableStore: Send + Sync + Debug {
    // Retrieves a value by key; expired keys read as absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    // Stores a value with a key, expiring after `ttl`
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    // Checks that the store is reachable
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
impl<S: DurableStore + ?Sized> DurableStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        (**self).set(key, value, ttl).await
    }

    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }
}

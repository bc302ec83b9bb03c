// src/storage/memory.rs

// In-process durable tier, used when no Redis is configured and in tests.
// Unlike the cache's fast path, this store enforces TTLs.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task;
use tokio::time::{self, Instant};
use tracing::debug;

use crate::config::InMemoryConfig;
use crate::error::{RegionalError, Result, StorageError};
use crate::storage::DurableStore;

/// Entry in the in-memory storage
#[derive(Debug)]
struct MemoryEntry {
    value: Vec<u8>,
    expiry: Instant,
}

/// In-memory storage backend implementation
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    data: Arc<RwLock<HashMap<String, MemoryEntry>>>,
    config: InMemoryConfig,
}

impl MemoryStorage {
    /// Creates a new in-memory storage with the given configuration.
    ///
    /// With `use_background_task` set this must be called inside a tokio runtime.
    pub fn new(config: InMemoryConfig) -> Self {
        let data = Arc::new(RwLock::new(HashMap::with_capacity(
            config.max_entries.min(10_000),
        )));

        if config.use_background_task {
            // The task holds a weak handle so it ends once the last storage clone is dropped
            let weak = Arc::downgrade(&data);
            let interval = config.cleanup_interval;

            task::spawn(async move {
                let mut interval = time::interval(interval);
                loop {
                    interval.tick().await;
                    let Some(data) = weak.upgrade() else {
                        break;
                    };
                    Self::cleanup_expired_entries(&data).await;
                }
                debug!("Memory storage cleanup task stopped");
            });
        }

        Self { data, config }
    }

    /// Clean up expired entries
    async fn cleanup_expired_entries(data: &RwLock<HashMap<String, MemoryEntry>>) {
        let now = Instant::now();
        let mut data = data.write().await;
        data.retain(|_, entry| entry.expiry > now);
    }

    /// Number of entries currently held, expired or not
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DurableStore for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        {
            let data = self.data.read().await;
            match data.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expiry > Instant::now() => {
                    return Ok(Some(entry.value.clone()))
                }
                Some(_) => {}
            }
        }

        // Key is expired, drop read lock and acquire write lock to remove it
        let mut data = self.data.write().await;
        if data
            .get(key)
            .is_some_and(|entry| entry.expiry <= Instant::now())
        {
            data.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut data = self.data.write().await;

        // Apply max entries limit
        if data.len() >= self.config.max_entries && !data.contains_key(key) {
            return Err(RegionalError::Storage(StorageError::CapacityExceeded(
                "Maximum entries limit exceeded".to_string(),
            )));
        }

        data.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_vec(),
                expiry: Instant::now() + ttl,
            },
        );

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

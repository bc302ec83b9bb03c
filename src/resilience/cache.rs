use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache_op;
use crate::region::Region;
use crate::storage::DurableStore;

/// Results produced through a fallback region, keyed by origin region and operation name.
///
/// Reads check the in-process map first and then the durable store. The in-process map
/// never expires entries and does not survive restarts; the durable store enforces the
/// TTL. Every failure in here degrades to a miss or a logged warning.
///
/// Keys carry no request arguments: two calls sharing an operation name share an entry.
/// Callers must keep operation names unique per logical request.
#[derive(Debug)]
pub struct CrossRegionCache<S> {
    local: RwLock<HashMap<String, Vec<u8>>>,
    store: S,
    key_prefix: String,
}

impl<S: DurableStore> CrossRegionCache<S> {
    pub fn new(store: S, key_prefix: impl Into<String>) -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            store,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn key(&self, region: Region, operation: &str) -> String {
        format!("{}:cross-region:{}:{}", self.key_prefix, region.code(), operation)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn get<T: DeserializeOwned>(&self, region: Region, operation: &str) -> Option<T> {
        let key = self.key(region, operation);
        let bytes = self.get_raw(&key).await?;

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key = %key, "Error deserializing cached result: {}", e);
                None
            }
        }
    }

    async fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(bytes) = self.local.read().await.get(key) {
            cache_op!("get_local", key, true);
            return Some(bytes.clone());
        }

        match self.store.get(key).await {
            Ok(found) => {
                cache_op!("get_durable", key, found.is_some());
                found
            }
            Err(e) => {
                debug!(key = %key, "Error retrieving cached result: {}", e);
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, region: Region, operation: &str, value: &T, ttl: Duration) {
        let key = self.key(region, operation);
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, "Failed to serialize result for cross-region cache: {}", e);
                return;
            }
        };

        self.write_both(key, bytes, ttl).await;
    }

    /// Store an already JSON-encoded result
    pub(crate) async fn put_encoded(&self, region: Region, operation: &str, bytes: Vec<u8>, ttl: Duration) {
        self.write_both(self.key(region, operation), bytes, ttl).await;
    }

    async fn write_both(&self, key: String, bytes: Vec<u8>, ttl: Duration) {
        if let Err(e) = self.store.set(&key, &bytes, ttl).await {
            warn!(key = %key, "Failed to cache result for cross-region access: {}", e);
        }

        cache_op!("put", key.as_str(), false);
        self.local.write().await.insert(key, bytes);
    }

    /// Number of entries in the in-process tier
    pub async fn local_len(&self) -> usize {
        self.local.read().await.len()
    }
}

// src/storage/redis.rs

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RedisConfig;
use crate::error::{RegionalError, Result, StorageError};
use crate::storage::DurableStore;

#[derive(Clone)]
pub struct RedisStorage {
    connection: Arc<tokio::sync::Mutex<ConnectionManager>>,
    config: RedisConfig,
}

impl fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStorage")
            .field("url", &self.config.url)
            .finish()
    }
}

impl RedisStorage {
    /// Creates a new Redis storage with the given configuration
    pub async fn new(config: RedisConfig) -> Result<Self> {
        // Open the client - this doesn't actually connect to Redis yet
        let client = Client::open(config.url.as_str())
            .map_err(|e| RegionalError::Storage(StorageError::RedisConnection(e.to_string())))?;

        let connection_future = ConnectionManager::new(client);

        let connection_manager =
            match tokio::time::timeout(config.connection_timeout, connection_future).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(RegionalError::Storage(StorageError::RedisConnection(
                        format!(
                            "Connection to Redis at {} timed out after {:?}",
                            config.url, config.connection_timeout
                        ),
                    )));
                }
            };

        Ok(Self {
            connection: Arc::new(tokio::sync::Mutex::new(connection_manager)),
            config,
        })
    }
}

// SETEX only takes whole seconds; round sub-second TTLs up so they never mean "no expiry"
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 || secs == 0 {
        secs + 1
    } else {
        secs
    }
}

#[async_trait]
impl DurableStore for RedisStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection.lock().await;
        let result: Option<Vec<u8>> = redis::AsyncCommands::get(&mut *conn, key)
            .await
            .map_err(|e| RegionalError::Storage(StorageError::RedisCommand(e.to_string())))?;

        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.connection.lock().await;

        let _: () = redis::AsyncCommands::set_ex(&mut *conn, key, value, ttl_secs(ttl))
            .await
            .map_err(|e| RegionalError::Storage(StorageError::RedisCommand(e.to_string())))?;

        Ok(())
    }

    /// Ping Redis to check health with timeout
    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.lock().await;

        let ping_future = redis::AsyncCommands::ping::<String>(&mut *conn);

        let result = match tokio::time::timeout(self.config.connection_timeout, ping_future).await
        {
            Ok(inner_result) => inner_result.map_err(|e| {
                RegionalError::Storage(StorageError::RedisCommand(e.to_string()))
            })?,
            Err(_) => {
                return Err(RegionalError::Storage(StorageError::RedisCommand(format!(
                    "Redis PING operation timed out after {:?}",
                    self.config.connection_timeout
                ))));
            }
        };

        if result == "PONG" {
            Ok(())
        } else {
            Err(RegionalError::Storage(StorageError::RedisCommand(format!(
                "Unexpected response from Redis PING: {}",
                result
            ))))
        }
    }
}

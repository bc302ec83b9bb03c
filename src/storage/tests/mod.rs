// src/storage/tests/mod.rs


// Common utilities for storage tests
pub(crate) mod common {
    use std::time::Duration;
    use tokio::time;

    use crate::error::Result;
    use crate::storage::DurableStore;

    // Test basic storage operations that should work on any backend
    pub async fn test_basic_operations<S: DurableStore>(storage: &S) -> Result<()> {
        let key = "order:cross-region:us:test_basic_key";
        let value: &[u8] = b"test_value";

        storage.set(key, value, Duration::from_secs(60)).await?;

        let result = storage.get(key).await?;
        assert_eq!(result.as_deref(), Some(value));

        // Overwrite replaces the value
        storage.set(key, b"replaced", Duration::from_secs(60)).await?;
        let result = storage.get(key).await?;
        assert_eq!(result.as_deref(), Some(&b"replaced"[..]));

        // Missing keys read as absent
        assert!(storage.get("order:cross-region:us:missing").await?.is_none());

        storage.ping().await?;

        Ok(())
    }

    // Entries disappear once their TTL has passed
    pub async fn test_key_expiration<S: DurableStore>(
        storage: &S,
        ttl: Duration,
        wait: Duration,
    ) -> Result<()> {
        let key = "order:cross-region:eu:test_expiry_key";

        storage.set(key, b"expiring_value", ttl).await?;
        assert!(storage.get(key).await?.is_some());

        time::sleep(wait).await;

        assert!(storage.get(key).await?.is_none());

        Ok(())
    }
}

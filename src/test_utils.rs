// src/test_utils.rs

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{CircuitBreakerConfig, RegionalConfig};
use crate::error::{RegionalError, Result, StorageError};
use crate::region::Region;
use crate::resilience::{LoggingSink, RegionalExecutor, ReplicationSink, ReplicationTask};
use crate::routing;
use crate::storage::DurableStore;

/// Durable store double that can be told to fail every call
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    should_fail: Arc<AtomicBool>,
    operations: Arc<AtomicUsize>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failure(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.lock().unwrap().contains_key(key)
    }

    /// Write raw bytes, bypassing the failure switch
    pub fn insert_raw(&self, key: &str, value: &[u8]) {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
    }

    fn check(&self) -> Result<()> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(RegionalError::Storage(StorageError::RedisConnection(
                "Mock store failure".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for MockStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8], _ttl: Duration) -> Result<()> {
        self.check()?;
        self.insert_raw(key, value);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }
}

/// Sink that remembers every task it receives and can be made to fail
#[derive(Debug, Default)]
pub struct RecordingSink {
    tasks: Mutex<Vec<ReplicationTask>>,
    should_fail: AtomicBool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            should_fail: AtomicBool::new(true),
        }
    }

    pub fn tasks(&self) -> Vec<ReplicationTask> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplicationSink for RecordingSink {
    async fn replicate(&self, task: &ReplicationTask) -> Result<()> {
        self.tasks.lock().unwrap().push(task.clone());
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(RegionalError::Internal("sink rejected task".to_string()));
        }
        Ok(())
    }
}

/// Regional service double: per-region up/down switches and call counters
#[derive(Debug, Clone, Default)]
pub struct ScriptedService {
    down: Arc<Mutex<HashSet<Region>>>,
    calls: Arc<Mutex<HashMap<Region, usize>>>,
    routed: Arc<Mutex<Vec<Option<Region>>>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, region: Region, down: bool) {
        let mut set = self.down.lock().unwrap();
        if down {
            set.insert(region);
        } else {
            set.remove(&region);
        }
    }

    pub fn calls(&self, region: Region) -> usize {
        self.calls.lock().unwrap().get(&region).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Routing regions observed from inside the unit of work
    pub fn routed(&self) -> Vec<Option<Region>> {
        self.routed.lock().unwrap().clone()
    }

    /// Unit of work: returns a value naming the region that produced it
    pub async fn call(&self, region: Region) -> std::result::Result<String, String> {
        *self.calls.lock().unwrap().entry(region).or_insert(0) += 1;
        self.routed.lock().unwrap().push(routing::current_region());

        if self.down.lock().unwrap().contains(&region) {
            return Err(format!("{} service unavailable", region));
        }
        Ok(format!("order-from-{}", region))
    }
}

/// Config with small thresholds and short timings for tests
pub fn fast_config() -> RegionalConfig {
    let mut config = RegionalConfig::default();
    config.circuit_breaker = CircuitBreakerConfig {
        failure_threshold: 3,
        success_threshold: 2,
        open_timeout: Duration::from_millis(100),
    };
    config.replication.delay = Duration::from_millis(50);
    config
}

pub fn create_test_executor(
    config: &RegionalConfig,
    store: MockStore,
    sink: Arc<dyn ReplicationSink>,
) -> RegionalExecutor<MockStore> {
    RegionalExecutor::new(config, store, sink)
}

pub fn create_default_executor(store: MockStore) -> RegionalExecutor<MockStore> {
    create_test_executor(&fast_config(), store, Arc::new(LoggingSink))
}

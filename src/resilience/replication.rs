use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ReplicationConfig;
use crate::error::Result;
use crate::region::Region;
use crate::resilience::circuit_breaker::BreakerRegistry;

/// A fallback-produced result waiting to be pushed back to its primary region
#[derive(Debug, Clone)]
pub struct ReplicationTask {
    pub id: Uuid,
    pub primary: Region,
    pub served_by: Region,
    pub operation: String,
    /// JSON-encoded result
    pub payload: Vec<u8>,
    pub scheduled_at: DateTime<Utc>,
}

/// Destination for replicated results.
///
/// The actual write into the primary region belongs to the persistence layer; this is
/// the seam where it plugs in.
#[async_trait]
pub trait ReplicationSink: Send + Sync + Debug {
    async fn replicate(&self, task: &ReplicationTask) -> Result<()>;
}

/// Sink that only records the replication in the log
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl ReplicationSink for LoggingSink {
    async fn replicate(&self, task: &ReplicationTask) -> Result<()> {
        info!(
            task_id = %task.id,
            primary = %task.primary,
            served_by = %task.served_by,
            operation = %task.operation,
            bytes = task.payload.len(),
            "Replicating order data back to recovered primary region"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ReplicationStats {
    scheduled: AtomicU64,
    replicated: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

/// Counter values at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicationCounts {
    pub scheduled: u64,
    pub replicated: u64,
    /// Primary was still unavailable when the task came due
    pub skipped: u64,
    pub failed: u64,
}

impl ReplicationCounts {
    pub fn completed(&self) -> u64 {
        self.replicated + self.skipped + self.failed
    }
}

struct Pending {
    due: Instant,
    seq: u64,
    task: ReplicationTask,
}

// Min-heap by due time, FIFO among equal deadlines
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Pending {}

/// Deferred, at-most-once reconciliation of fallback results.
///
/// `schedule` only enqueues; a worker task holds the queue ordered by due time and, once
/// a task is due, checks the primary's breaker and hands the task to the sink. Nothing
/// that happens in the worker is reported back to the caller that scheduled the task.
#[derive(Debug)]
pub struct ReplicationScheduler {
    tx: mpsc::UnboundedSender<(Instant, ReplicationTask)>,
    delay: Duration,
    stats: Arc<ReplicationStats>,
    worker: JoinHandle<()>,
}

impl ReplicationScheduler {
    /// Start the worker; must be called inside a tokio runtime
    pub fn start(
        breakers: Arc<BreakerRegistry>,
        sink: Arc<dyn ReplicationSink>,
        config: &ReplicationConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(ReplicationStats::default());
        let worker = tokio::spawn(run_worker(rx, breakers, sink, Arc::clone(&stats)));

        Self {
            tx,
            delay: config.delay,
            stats,
            worker,
        }
    }

    /// Enqueue a replication of `payload` to `primary`. Never blocks.
    pub fn schedule(&self, primary: Region, served_by: Region, operation: &str, payload: Vec<u8>) -> Uuid {
        let task = ReplicationTask {
            id: Uuid::new_v4(),
            primary,
            served_by,
            operation: operation.to_string(),
            payload,
            scheduled_at: Utc::now(),
        };
        let id = task.id;
        let due = Instant::now() + self.delay;

        self.stats.scheduled.fetch_add(1, Ordering::SeqCst);
        if self.tx.send((due, task)).is_err() {
            self.stats.failed.fetch_add(1, Ordering::SeqCst);
            warn!(task_id = %id, primary = %primary, "Replication worker is not running; task dropped");
        } else {
            debug!(task_id = %id, primary = %primary, delay = ?self.delay, "Replication scheduled");
        }

        id
    }

    pub fn counts(&self) -> ReplicationCounts {
        ReplicationCounts {
            scheduled: self.stats.scheduled.load(Ordering::SeqCst),
            replicated: self.stats.replicated.load(Ordering::SeqCst),
            skipped: self.stats.skipped.load(Ordering::SeqCst),
            failed: self.stats.failed.load(Ordering::SeqCst),
        }
    }

    /// Stop the worker; tasks not yet due are dropped
    pub fn shutdown(&self) {
        self.worker.abort();
    }
}

impl Drop for ReplicationScheduler {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<(Instant, ReplicationTask)>,
    breakers: Arc<BreakerRegistry>,
    sink: Arc<dyn ReplicationSink>,
    stats: Arc<ReplicationStats>,
) {
    let mut queue: BinaryHeap<Pending> = BinaryHeap::new();
    let mut seq = 0u64;

    loop {
        let next_due = queue.peek().map(|p| p.due);

        tokio::select! {
            received = rx.recv() => match received {
                Some((due, task)) => {
                    seq += 1;
                    queue.push(Pending { due, seq, task });
                }
                None => break,
            },
            _ = time::sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                let now = Instant::now();
                while queue.peek().is_some_and(|p| p.due <= now) {
                    if let Some(pending) = queue.pop() {
                        // Each task runs on its own so a slow or panicking sink can't stall the queue
                        tokio::spawn(replicate_one(
                            pending.task,
                            Arc::clone(&breakers),
                            Arc::clone(&sink),
                            Arc::clone(&stats),
                        ));
                    }
                }
            }
        }
    }

    debug!(dropped = queue.len(), "Replication worker stopped");
}

async fn replicate_one(
    task: ReplicationTask,
    breakers: Arc<BreakerRegistry>,
    sink: Arc<dyn ReplicationSink>,
    stats: Arc<ReplicationStats>,
) {
    if !breakers.is_available(task.primary).await {
        stats.skipped.fetch_add(1, Ordering::SeqCst);
        warn!(
            task_id = %task.id,
            primary = %task.primary,
            operation = %task.operation,
            "Primary region still unavailable; skipping replication"
        );
        return;
    }

    match sink.replicate(&task).await {
        Ok(()) => {
            stats.replicated.fetch_add(1, Ordering::SeqCst);
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::SeqCst);
            warn!(
                task_id = %task.id,
                primary = %task.primary,
                "Failed to replicate order data to primary region: {}",
                e
            );
        }
    }
}

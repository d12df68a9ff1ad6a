//! Shared helpers for table view integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tableview_core::Message;
use tableview_log::{LogError, LogTransport, MemoryLog, PartitionHandle, ReaderOptions, Result};

/// Install a test-writer tracing subscriber (ignored if one is already set).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tableview_client=debug")
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds, panicking after ten (possibly virtual)
/// seconds.
pub async fn eventually<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// `MemoryLog` wrapper with scripted failures.
pub struct ScriptedTransport {
    pub log: Arc<MemoryLog>,
    fail_open: Mutex<HashSet<String>>,
    fail_replay: Mutex<HashSet<String>>,
    failing_listings: AtomicUsize,
    listings: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(log: Arc<MemoryLog>) -> Arc<Self> {
        Arc::new(Self {
            log,
            fail_open: Mutex::new(HashSet::new()),
            fail_replay: Mutex::new(HashSet::new()),
            failing_listings: AtomicUsize::new(0),
            listings: AtomicUsize::new(0),
        })
    }

    /// Opening `partition` fails until cleared.
    pub fn fail_open(&self, partition: &str) {
        self.fail_open.lock().insert(partition.to_string());
    }

    /// Reads on `partition` fail until cleared.
    pub fn fail_replay(&self, partition: &str) {
        self.fail_replay.lock().insert(partition.to_string());
    }

    /// The next `n` partition listings fail.
    pub fn fail_next_listings(&self, n: usize) {
        self.failing_listings.store(n, Ordering::SeqCst);
    }

    pub fn clear_failures(&self) {
        self.fail_open.lock().clear();
        self.fail_replay.lock().clear();
        self.failing_listings.store(0, Ordering::SeqCst);
    }

    pub fn listing_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogTransport for ScriptedTransport {
    async fn list_partitions(&self, topic: &str) -> Result<Vec<String>> {
        self.listings.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_listings
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LogError::Unavailable("scripted listing failure".into()));
        }

        self.log.list_partitions(topic).await
    }

    async fn open_reader(
        &self,
        partition: &str,
        options: ReaderOptions,
    ) -> Result<Box<dyn PartitionHandle>> {
        if self.fail_open.lock().contains(partition) {
            return Err(LogError::Unavailable(format!(
                "scripted open failure for {}",
                partition
            )));
        }

        let inner = self.log.open_reader(partition, options).await?;
        if self.fail_replay.lock().contains(partition) {
            return Ok(Box::new(FailingHandle { inner }));
        }
        Ok(inner)
    }
}

/// Handle that claims a message is available and then fails to read it.
struct FailingHandle {
    inner: Box<dyn PartitionHandle>,
}

#[async_trait]
impl PartitionHandle for FailingHandle {
    fn partition(&self) -> &str {
        self.inner.partition()
    }

    async fn has_message_available(&mut self) -> Result<bool> {
        Ok(true)
    }

    async fn read_next(&mut self) -> Result<Message> {
        Err(LogError::Unavailable(format!(
            "scripted read failure for {}",
            self.inner.partition()
        )))
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}

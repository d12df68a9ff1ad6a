//! In-Memory Compacted Log
//!
//! `MemoryLog` is a complete [`LogTransport`] that keeps every partition in
//! process memory. It models the parts of a real broker the table view relies
//! on:
//!
//! - **Partitioned topics**: `orders-partition-0`, `orders-partition-1`, ...
//! - **Non-partitioned topics**: a single partition named after the topic
//! - **Partition growth**: partition count can be raised, never lowered; a
//!   partition name is never handed out twice, even after deletion
//! - **Key routing**: keyed messages always land on the same partition
//! - **Compaction**: `compact()` freezes a horizon; compacted readers see only
//!   the latest message per key below it and everything above it
//! - **Tailing**: `read_next()` waits for new publishes via a watch channel
//!
//! ## Compaction Model
//!
//! ```text
//! offset:    0    1    2    3    4  | 5    6
//! key:       a    b    a    -    b  | a    c
//!                                   ^ horizon
//! compacted: .    .    a    .    b  | a    c
//! ```
//!
//! Keyless messages below the horizon are dropped, just like a broker's
//! compactor drops them.

use crate::error::{LogError, Result};
use crate::{LogTransport, PartitionHandle, ReaderOptions, StartPosition};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tableview_core::Message;
use tokio::sync::watch;
use tracing::debug;

/// Suffix between topic name and partition index, e.g. `orders-partition-3`.
pub const PARTITION_SUFFIX: &str = "-partition-";

/// Name of partition `index` of a partitioned topic.
pub fn partition_name(topic: &str, index: u32) -> String {
    format!("{}{}{}", topic, PARTITION_SUFFIX, index)
}

#[derive(Debug)]
struct TopicState {
    partitioned: bool,
    partitions: Vec<String>,
    /// Index the next created partition is named with.
    next_index: u32,
}

#[derive(Debug, Default)]
struct PartitionEntries {
    messages: Vec<Message>,
    /// Messages below this index have been compacted.
    compaction_horizon: usize,
    /// Indexes below the horizon that survive compaction.
    retained: Vec<usize>,
}

#[derive(Debug)]
struct PartitionLog {
    name: String,
    entries: RwLock<PartitionEntries>,
    /// Number of messages appended so far; bumped on every publish.
    watermark: watch::Sender<usize>,
}

impl PartitionLog {
    fn new(name: String) -> Self {
        let (watermark, _) = watch::channel(0);
        Self {
            name,
            entries: RwLock::new(PartitionEntries::default()),
            watermark,
        }
    }

    fn append(&self, key: Option<String>, payload: Bytes) -> u64 {
        let offset = {
            let mut entries = self.entries.write();
            let offset = entries.messages.len() as u64;
            entries.messages.push(Message::new(
                self.name.clone(),
                offset,
                current_timestamp_ms(),
                key,
                payload,
            ));
            offset
        };
        self.watermark.send_replace(offset as usize + 1);
        offset
    }

    fn compact(&self) {
        let mut entries = self.entries.write();
        let horizon = entries.messages.len();

        // Walk backwards so the first sighting of a key is its latest value
        let mut seen = HashSet::new();
        let mut retained = Vec::new();
        for (index, msg) in entries.messages.iter().enumerate().rev() {
            if let Some(key) = &msg.key {
                if seen.insert(key.clone()) {
                    retained.push(index);
                }
            }
        }
        retained.reverse();

        debug!(
            partition = %self.name,
            horizon,
            retained = retained.len(),
            "Compacted partition"
        );

        entries.compaction_horizon = horizon;
        entries.retained = retained;
    }
}

/// In-process compacted, partitioned log.
///
/// Cheap to share: wrap it in an `Arc` and hand clones to producers and to
/// any number of table views.
#[derive(Debug, Default)]
pub struct MemoryLog {
    topics: RwLock<HashMap<String, TopicState>>,
    partitions: RwLock<HashMap<String, Arc<PartitionLog>>>,
    open_readers: Arc<AtomicUsize>,
    round_robin: AtomicU64,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a non-partitioned topic.
    pub fn create_topic(&self, name: &str) -> Result<()> {
        self.insert_topic(name, false, vec![name.to_string()], 0)
    }

    /// Create a partitioned topic with `partitions` partitions.
    pub fn create_partitioned_topic(&self, name: &str, partitions: u32) -> Result<()> {
        if partitions == 0 {
            return Err(LogError::InvalidPartitionCount {
                topic: name.to_string(),
                current: 0,
                requested: 0,
            });
        }
        let names = (0..partitions).map(|i| partition_name(name, i)).collect();
        self.insert_topic(name, true, names, partitions)
    }

    fn insert_topic(
        &self,
        name: &str,
        partitioned: bool,
        names: Vec<String>,
        next_index: u32,
    ) -> Result<()> {
        let mut topics = self.topics.write();
        if topics.contains_key(name) {
            return Err(LogError::TopicAlreadyExists(name.to_string()));
        }

        let mut partitions = self.partitions.write();
        if let Some(taken) = names.iter().find(|p| partitions.contains_key(*p)) {
            return Err(LogError::PartitionAlreadyExists(taken.clone()));
        }
        for partition in &names {
            partitions.insert(partition.clone(), Arc::new(PartitionLog::new(partition.clone())));
        }
        topics.insert(
            name.to_string(),
            TopicState {
                partitioned,
                partitions: names,
                next_index,
            },
        );
        Ok(())
    }

    /// Raise the partition count of a partitioned topic.
    ///
    /// `partitions` is the new number of listed partitions. Existing partitions
    /// keep their data; new partitions start empty and are named after the
    /// highest index ever used, so deleted names are not reused.
    pub fn update_partitioned_topic(&self, name: &str, partitions: u32) -> Result<()> {
        let mut topics = self.topics.write();
        let topic = topics
            .get_mut(name)
            .ok_or_else(|| LogError::TopicNotFound(name.to_string()))?;

        let current = topic.partitions.len() as u32;
        if !topic.partitioned || partitions <= current {
            return Err(LogError::InvalidPartitionCount {
                topic: name.to_string(),
                current,
                requested: partitions,
            });
        }

        let added = partitions - current;
        let names: Vec<String> = (topic.next_index..topic.next_index + added)
            .map(|index| partition_name(name, index))
            .collect();

        let mut logs = self.partitions.write();
        if let Some(taken) = names.iter().find(|p| logs.contains_key(*p)) {
            return Err(LogError::PartitionAlreadyExists(taken.clone()));
        }
        for partition in names {
            logs.insert(partition.clone(), Arc::new(PartitionLog::new(partition.clone())));
            topic.partitions.push(partition);
        }
        topic.next_index += added;
        Ok(())
    }

    /// Remove a partition from its topic's listing.
    ///
    /// Readers already open on the partition keep working; new readers cannot
    /// be opened.
    pub fn delete_partition(&self, partition: &str) -> Result<()> {
        let mut topics = self.topics.write();
        let topic = topics
            .values_mut()
            .find(|t| t.partitions.iter().any(|p| p == partition))
            .ok_or_else(|| LogError::PartitionNotFound(partition.to_string()))?;
        topic.partitions.retain(|p| p != partition);
        self.partitions.write().remove(partition);
        Ok(())
    }

    /// Publish a message to a topic.
    ///
    /// Keyed messages are routed by key hash so a key always lands on the
    /// same partition; keyless messages are spread round-robin.
    ///
    /// # Returns
    ///
    /// The partition name and offset the message was written at.
    pub fn publish(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: impl Into<Bytes>,
    ) -> Result<(String, u64)> {
        let partition = {
            let topics = self.topics.read();
            let state = topics
                .get(topic)
                .ok_or_else(|| LogError::TopicNotFound(topic.to_string()))?;
            let count = state.partitions.len() as u64;
            if count == 0 {
                return Err(LogError::Unavailable(format!("topic '{}' has no partitions", topic)));
            }
            let index = match key {
                Some(k) => hash_key(k) % count,
                None => self.round_robin.fetch_add(1, Ordering::Relaxed) % count,
            };
            state.partitions[index as usize].clone()
        };

        let offset = self.publish_to(&partition, key, payload)?;
        Ok((partition, offset))
    }

    /// Publish a message directly to one partition.
    pub fn publish_to(
        &self,
        partition: &str,
        key: Option<&str>,
        payload: impl Into<Bytes>,
    ) -> Result<u64> {
        let log = self.partition_log(partition)?;
        Ok(log.append(key.map(str::to_string), payload.into()))
    }

    /// Compact every partition of a topic up to its current end.
    pub fn compact(&self, topic: &str) -> Result<()> {
        let names = {
            let topics = self.topics.read();
            topics
                .get(topic)
                .ok_or_else(|| LogError::TopicNotFound(topic.to_string()))?
                .partitions
                .clone()
        };
        for name in names {
            self.partition_log(&name)?.compact();
        }
        Ok(())
    }

    /// Number of partition handles currently open.
    pub fn open_reader_count(&self) -> usize {
        self.open_readers.load(Ordering::SeqCst)
    }

    fn partition_log(&self, partition: &str) -> Result<Arc<PartitionLog>> {
        self.partitions
            .read()
            .get(partition)
            .cloned()
            .ok_or_else(|| LogError::PartitionNotFound(partition.to_string()))
    }
}

#[async_trait]
impl LogTransport for MemoryLog {
    async fn list_partitions(&self, topic: &str) -> Result<Vec<String>> {
        self.topics
            .read()
            .get(topic)
            .map(|t| t.partitions.clone())
            .ok_or_else(|| LogError::TopicNotFound(topic.to_string()))
    }

    async fn open_reader(
        &self,
        partition: &str,
        options: ReaderOptions,
    ) -> Result<Box<dyn PartitionHandle>> {
        let log = self.partition_log(partition)?;
        let handle = MemoryPartitionHandle::open(log, options, Arc::clone(&self.open_readers));
        Ok(Box::new(handle))
    }
}

/// Reader over one [`MemoryLog`] partition.
pub struct MemoryPartitionHandle {
    log: Arc<PartitionLog>,
    /// Compacted messages captured when the reader was opened.
    backlog: VecDeque<Message>,
    /// Next raw index to read once the backlog is drained.
    next_index: usize,
    watermark: watch::Receiver<usize>,
    closed: bool,
    open_readers: Arc<AtomicUsize>,
}

impl MemoryPartitionHandle {
    fn open(log: Arc<PartitionLog>, options: ReaderOptions, open_readers: Arc<AtomicUsize>) -> Self {
        let watermark = log.watermark.subscribe();
        let (backlog, next_index) = {
            let entries = log.entries.read();
            match (options.start, options.read_compacted) {
                (StartPosition::Latest, _) => (VecDeque::new(), entries.messages.len()),
                (StartPosition::Earliest, false) => (VecDeque::new(), 0),
                (StartPosition::Earliest, true) => {
                    let backlog = entries
                        .retained
                        .iter()
                        .map(|&i| entries.messages[i].clone())
                        .collect();
                    (backlog, entries.compaction_horizon)
                }
            }
        };

        open_readers.fetch_add(1, Ordering::SeqCst);

        Self {
            log,
            backlog,
            next_index,
            watermark,
            closed: false,
            open_readers,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(LogError::Closed(self.log.name.clone()));
        }
        Ok(())
    }

    fn try_next(&mut self) -> Option<Message> {
        if let Some(msg) = self.backlog.pop_front() {
            return Some(msg);
        }
        let entries = self.log.entries.read();
        let msg = entries.messages.get(self.next_index).cloned()?;
        self.next_index += 1;
        Some(msg)
    }
}

#[async_trait]
impl PartitionHandle for MemoryPartitionHandle {
    fn partition(&self) -> &str {
        &self.log.name
    }

    async fn has_message_available(&mut self) -> Result<bool> {
        self.ensure_open()?;
        Ok(!self.backlog.is_empty() || self.next_index < self.log.entries.read().messages.len())
    }

    async fn read_next(&mut self) -> Result<Message> {
        loop {
            self.ensure_open()?;

            // Mark the current watermark as seen before looking, so a publish
            // racing with this check still wakes us up below.
            let _ = self.watermark.borrow_and_update();
            if let Some(msg) = self.try_next() {
                return Ok(msg);
            }

            if self.watermark.changed().await.is_err() {
                return Err(LogError::PartitionNotFound(self.log.name.clone()));
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.open_readers.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MemoryPartitionHandle {
    fn drop(&mut self) {
        if !self.closed {
            self.open_readers.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Hash a key to u64 (SipHash via DefaultHasher)
fn hash_key(key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Get current timestamp in milliseconds since epoch
fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn drain(handle: &mut Box<dyn PartitionHandle>) -> Vec<Message> {
        let mut out = Vec::new();
        while handle.has_message_available().await.unwrap() {
            out.push(handle.read_next().await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_non_partitioned_topic_lists_itself() {
        let log = MemoryLog::new();
        log.create_topic("orders").unwrap();

        assert_eq!(log.list_partitions("orders").await.unwrap(), vec!["orders"]);
    }

    #[tokio::test]
    async fn test_partitioned_topic_names() {
        let log = MemoryLog::new();
        log.create_partitioned_topic("orders", 3).unwrap();

        assert_eq!(
            log.list_partitions("orders").await.unwrap(),
            vec![
                "orders-partition-0",
                "orders-partition-1",
                "orders-partition-2"
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_topic() {
        let log = MemoryLog::new();
        assert!(matches!(
            log.list_partitions("missing").await,
            Err(LogError::TopicNotFound(_))
        ));
        assert!(matches!(
            log.publish("missing", Some("k"), "v"),
            Err(LogError::TopicNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_topic_rejected() {
        let log = MemoryLog::new();
        log.create_topic("orders").unwrap();
        assert!(matches!(
            log.create_partitioned_topic("orders", 2),
            Err(LogError::TopicAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_partition_growth_only() {
        let log = MemoryLog::new();
        log.create_partitioned_topic("orders", 2).unwrap();
        log.update_partitioned_topic("orders", 16).unwrap();
        assert_eq!(log.list_partitions("orders").await.unwrap().len(), 16);

        assert!(log.update_partitioned_topic("orders", 4).is_err());

        log.create_topic("plain").unwrap();
        assert!(log.update_partitioned_topic("plain", 2).is_err());
    }

    #[tokio::test]
    async fn test_key_routing_is_stable() {
        let log = MemoryLog::new();
        log.create_partitioned_topic("orders", 8).unwrap();

        let (first, _) = log.publish("orders", Some("user-42"), "a").unwrap();
        for _ in 0..10 {
            let (partition, _) = log.publish("orders", Some("user-42"), "b").unwrap();
            assert_eq!(partition, first);
        }
    }

    #[tokio::test]
    async fn test_offsets_are_per_partition() {
        let log = MemoryLog::new();
        log.create_partitioned_topic("orders", 2).unwrap();

        assert_eq!(log.publish_to("orders-partition-0", Some("a"), "1").unwrap(), 0);
        assert_eq!(log.publish_to("orders-partition-0", Some("a"), "2").unwrap(), 1);
        assert_eq!(log.publish_to("orders-partition-1", Some("a"), "3").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_compacted_reader_sees_latest_per_key() {
        let log = MemoryLog::new();
        log.create_topic("t").unwrap();
        log.publish("t", Some("a"), "a1").unwrap();
        log.publish("t", Some("b"), "b1").unwrap();
        log.publish("t", Some("a"), "a2").unwrap();
        log.publish("t", None, "heartbeat").unwrap();
        log.publish("t", Some("b"), "b2").unwrap();
        log.compact("t").unwrap();
        log.publish("t", Some("a"), "a3").unwrap();
        log.publish("t", Some("c"), "c1").unwrap();

        let mut compacted = log
            .open_reader("t", ReaderOptions::compacted_from_earliest())
            .await
            .unwrap();
        let payloads: Vec<Bytes> = drain(&mut compacted)
            .await
            .into_iter()
            .map(|m| m.payload)
            .collect();
        assert_eq!(payloads, vec!["a2", "b2", "a3", "c1"]);

        let mut full = log.open_reader("t", ReaderOptions::default()).await.unwrap();
        assert_eq!(drain(&mut full).await.len(), 7);
    }

    #[tokio::test]
    async fn test_latest_reader_skips_history() {
        let log = MemoryLog::new();
        log.create_topic("t").unwrap();
        log.publish("t", Some("a"), "old").unwrap();

        let mut reader = log
            .open_reader(
                "t",
                ReaderOptions {
                    start: StartPosition::Latest,
                    read_compacted: false,
                },
            )
            .await
            .unwrap();
        assert!(!reader.has_message_available().await.unwrap());

        log.publish("t", Some("a"), "new").unwrap();
        assert_eq!(reader.read_next().await.unwrap().payload, "new");
    }

    #[tokio::test]
    async fn test_read_next_waits_for_publish() {
        let log = Arc::new(MemoryLog::new());
        log.create_topic("t").unwrap();

        let mut reader = log
            .open_reader("t", ReaderOptions::compacted_from_earliest())
            .await
            .unwrap();

        let producer = Arc::clone(&log);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.publish("t", Some("k"), "live").unwrap();
        });

        let msg = tokio::time::timeout(Duration::from_secs(5), reader.read_next())
            .await
            .expect("read_next should wake up on publish")
            .unwrap();
        assert_eq!(msg.key.as_deref(), Some("k"));
        assert_eq!(msg.offset, 0);
    }

    #[tokio::test]
    async fn test_open_reader_count_and_close() {
        let log = MemoryLog::new();
        log.create_partitioned_topic("t", 2).unwrap();

        let mut a = log
            .open_reader("t-partition-0", ReaderOptions::default())
            .await
            .unwrap();
        let b = log
            .open_reader("t-partition-1", ReaderOptions::default())
            .await
            .unwrap();
        assert_eq!(log.open_reader_count(), 2);

        a.close().await.unwrap();
        a.close().await.unwrap();
        assert_eq!(log.open_reader_count(), 1);
        assert!(matches!(a.read_next().await, Err(LogError::Closed(_))));

        drop(b);
        assert_eq!(log.open_reader_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_partition() {
        let log = MemoryLog::new();
        log.create_partitioned_topic("t", 3).unwrap();
        log.delete_partition("t-partition-1").unwrap();

        assert_eq!(
            log.list_partitions("t").await.unwrap(),
            vec!["t-partition-0", "t-partition-2"]
        );
        assert!(matches!(
            log.open_reader("t-partition-1", ReaderOptions::default()).await,
            Err(LogError::PartitionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_growth_after_delete_never_reuses_names() {
        let log = MemoryLog::new();
        log.create_partitioned_topic("t", 3).unwrap();
        log.publish_to("t-partition-2", Some("k"), "kept").unwrap();
        let mut existing = log
            .open_reader("t-partition-2", ReaderOptions::default())
            .await
            .unwrap();

        log.delete_partition("t-partition-1").unwrap();
        log.update_partitioned_topic("t", 3).unwrap();

        assert_eq!(
            log.list_partitions("t").await.unwrap(),
            vec!["t-partition-0", "t-partition-2", "t-partition-3"]
        );
        assert_eq!(drain(&mut existing).await[0].payload, Bytes::from("kept"));

        log.publish_to("t-partition-2", Some("k"), "still here").unwrap();
        assert_eq!(
            existing.read_next().await.unwrap().payload,
            Bytes::from("still here")
        );
        assert!(matches!(
            log.open_reader("t-partition-1", ReaderOptions::default()).await,
            Err(LogError::PartitionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_topic_over_existing_partition_rejected() {
        let log = MemoryLog::new();
        log.create_partitioned_topic("t", 1).unwrap();
        log.publish_to("t-partition-0", Some("k"), "v").unwrap();

        assert!(matches!(
            log.create_topic("t-partition-0"),
            Err(LogError::PartitionAlreadyExists(_))
        ));
        assert!(log.list_partitions("t-partition-0").await.is_err());

        let mut handle = log
            .open_reader("t-partition-0", ReaderOptions::default())
            .await
            .unwrap();
        assert_eq!(drain(&mut handle).await.len(), 1);
    }
}

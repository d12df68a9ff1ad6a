//! Partition → reader registry shared by the reconciler and `close()`.

use crate::reader::{PartitionReader, ReaderStatus};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct ReaderSet {
    readers: RwLock<HashMap<String, PartitionReader>>,
}

impl ReaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, partition: &str) -> bool {
        self.readers.read().await.contains_key(partition)
    }

    pub async fn partitions(&self) -> HashSet<String> {
        self.readers.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.readers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.readers.read().await.is_empty()
    }

    /// Register a reader. A reader already registered for the same partition
    /// is returned so the caller can close it.
    pub async fn insert(&self, reader: PartitionReader) -> Option<PartitionReader> {
        let partition = reader.partition().to_string();
        self.readers.write().await.insert(partition, reader)
    }

    pub async fn remove(&self, partition: &str) -> Option<PartitionReader> {
        self.readers.write().await.remove(partition)
    }

    /// Take every reader out of the set.
    pub async fn drain(&self) -> Vec<PartitionReader> {
        self.readers.write().await.drain().map(|(_, r)| r).collect()
    }

    /// Status of every registered reader, ordered by partition name.
    pub async fn statuses(&self) -> BTreeMap<String, ReaderStatus> {
        self.readers
            .read()
            .await
            .iter()
            .map(|(partition, reader)| (partition.clone(), reader.status()))
            .collect()
    }
}

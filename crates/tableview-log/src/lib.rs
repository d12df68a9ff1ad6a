//! Log Transport
//!
//! This crate defines the seam between the table view and the compacted log it
//! materializes, plus an in-process log implementation.
//!
//! ## Purpose
//!
//! The table view never talks to a broker directly. It needs exactly three
//! capabilities from the log:
//! - **Discovery**: which partitions does a topic currently have?
//! - **Positioning**: open a reader at the earliest compacted offset of a partition
//! - **Streaming**: "is a message available right now?" and "give me the next one"
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │    TableView     │
//! └────────┬─────────┘
//!          │ list_partitions / open_reader
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │   LogTransport   │ ──► │ PartitionHandle  │ (one per partition)
//! └────────┬─────────┘     └──────────────────┘
//!          │ implemented by
//!          ▼
//! ┌──────────────────┐
//! │    MemoryLog     │ ◄── in-process, compaction-aware
//! └──────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```ignore
//! use tableview_log::{LogTransport, MemoryLog, ReaderOptions};
//!
//! let log = MemoryLog::new();
//! log.create_partitioned_topic("orders", 4)?;
//! log.publish("orders", Some("user-1"), Bytes::from("created"))?;
//!
//! for partition in log.list_partitions("orders").await? {
//!     let mut reader = log
//!         .open_reader(&partition, ReaderOptions::compacted_from_earliest())
//!         .await?;
//!     while reader.has_message_available().await? {
//!         let msg = reader.read_next().await?;
//!         println!("{:?} -> {:?}", msg.key, msg.payload);
//!     }
//!     reader.close().await?;
//! }
//! ```
//!
//! ## Thread Safety
//!
//! Transports must be `Send + Sync` and are shared as `Arc<dyn LogTransport>`.
//! Partition handles are owned by exactly one task at a time and only need `Send`.

pub mod error;
pub mod memory;

pub use error::{LogError, Result};
pub use memory::{MemoryLog, MemoryPartitionHandle};

use async_trait::async_trait;
use tableview_core::Message;

/// Where a freshly opened reader starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// First retained message of the partition.
    #[default]
    Earliest,
    /// Only messages published after the reader was opened.
    Latest,
}

/// Options for opening a partition reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReaderOptions {
    /// Start position within the partition.
    pub start: StartPosition,

    /// Read the compacted view of the already-compacted part of the log:
    /// only the latest message per key is delivered for that range.
    pub read_compacted: bool,
}

impl ReaderOptions {
    /// Options used by the table view: earliest position, compacted reads.
    pub fn compacted_from_earliest() -> Self {
        Self {
            start: StartPosition::Earliest,
            read_compacted: true,
        }
    }
}

/// Log transport trait - abstracts over different log backends.
///
/// ## Implementations
///
/// - **MemoryLog**: in-process compacted log (tests, embedding, demos)
///
/// ## Thread Safety
///
/// All implementations must be Send + Sync, allowing safe sharing across async
/// tasks via `Arc<dyn LogTransport>`.
#[async_trait]
pub trait LogTransport: Send + Sync {
    /// List the partitions of a topic.
    ///
    /// A non-partitioned topic reports a single partition named after the topic
    /// itself. A partitioned topic reports one name per partition, in partition
    /// order.
    ///
    /// # Errors
    ///
    /// - `TopicNotFound`: Topic doesn't exist
    /// - `Unavailable`: Transport could not answer
    async fn list_partitions(&self, topic: &str) -> Result<Vec<String>>;

    /// Open a reader on one partition.
    ///
    /// # Arguments
    ///
    /// * `partition` - Partition name as returned by `list_partitions`
    /// * `options` - Start position and compaction mode
    ///
    /// # Errors
    ///
    /// - `PartitionNotFound`: Partition doesn't exist
    /// - `Unavailable`: Transport could not open the reader
    async fn open_reader(
        &self,
        partition: &str,
        options: ReaderOptions,
    ) -> Result<Box<dyn PartitionHandle>>;
}

/// An open reader positioned inside one partition.
#[async_trait]
pub trait PartitionHandle: Send {
    /// Name of the partition this handle reads.
    fn partition(&self) -> &str;

    /// Whether a message can be read right now without waiting.
    async fn has_message_available(&mut self) -> Result<bool>;

    /// Read the next message, waiting until one is published.
    ///
    /// Cancel-safe: dropping the returned future before it completes does not
    /// lose a message.
    async fn read_next(&mut self) -> Result<Message>;

    /// Release the reader. Further reads fail with `LogError::Closed`.
    async fn close(&mut self) -> Result<()>;
}

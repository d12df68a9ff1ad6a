//! Message Data Structure
//!
//! This module defines `Message` - a single entry read from one partition of a
//! compacted topic.
//!
//! ## Structure
//! Each message contains:
//! - **partition**: Name of the partition the message was read from
//! - **offset**: Monotonically increasing position within that partition
//! - **timestamp**: Publish time (milliseconds since epoch)
//! - **key**: Optional key; compaction and the table view both require it
//! - **payload**: Raw value bytes, decoded by a [`Schema`](crate::Schema)
//!
//! ## Design Decisions
//! - Uses `bytes::Bytes` for the payload so handing a message from the log to
//!   the view never copies the value
//! - Keys are strings because the materialized map is keyed by string
//! - Keyless messages are legal on the wire (heartbeats, markers) but are
//!   never merged into a view
//!
//! ## Example
//! ```ignore
//! let msg = Message::new(
//!     "orders-partition-0",
//!     100,                              // offset
//!     1234567890000,                    // timestamp
//!     Some("user123".to_string()),      // key
//!     Bytes::from(r#"{"status": "shipped"}"#),
//! );
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single message read from a topic partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Partition this message belongs to
    pub partition: String,

    /// Offset of this message in the partition
    pub offset: u64,

    /// Timestamp in milliseconds since epoch
    pub timestamp: u64,

    /// Optional key
    pub key: Option<String>,

    /// Value (payload)
    pub payload: Bytes,
}

impl Message {
    pub fn new(
        partition: impl Into<String>,
        offset: u64,
        timestamp: u64,
        key: Option<String>,
        payload: Bytes,
    ) -> Self {
        Self {
            partition: partition.into(),
            offset,
            timestamp,
            key,
            payload,
        }
    }
}

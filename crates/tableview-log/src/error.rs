//! Log Error Types
//!
//! This module defines all error types that can occur while talking to a log
//! transport.
//!
//! ## Error Categories
//!
//! ### Topic Errors
//! - `TopicNotFound`: Requested topic doesn't exist
//! - `TopicAlreadyExists`: Trying to create a topic that already exists
//! - `InvalidPartitionCount`: Partition count can only grow on partitioned topics
//!
//! ### Partition Errors
//! - `PartitionNotFound`: Requested partition doesn't exist
//! - `PartitionAlreadyExists`: A new partition would replace an existing one
//!
//! ### Reader Errors
//! - `Closed`: Operation on a partition handle that has been closed
//! - `Unavailable`: Transport could not serve the request (network, broker down)
//!
//! ## Usage
//!
//! All transport operations return `Result<T>` which is aliased to
//! `Result<T, LogError>`.
//!
//! ```ignore
//! match log.list_partitions("orders").await {
//!     Ok(partitions) => println!("{} partitions", partitions.len()),
//!     Err(LogError::TopicNotFound(name)) => println!("Topic {} missing", name),
//!     Err(e) => return Err(e),
//! }
//! ```

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LogError>;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("Topic already exists: {0}")]
    TopicAlreadyExists(String),

    #[error("Partition not found: {0}")]
    PartitionNotFound(String),

    #[error("Partition already exists: {0}")]
    PartitionAlreadyExists(String),

    #[error("Invalid partition count for {topic}: current {current}, requested {requested}")]
    InvalidPartitionCount {
        topic: String,
        current: u32,
        requested: u32,
    },

    #[error("Reader closed: {0}")]
    Closed(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

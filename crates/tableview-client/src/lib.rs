//! TableView Client - Materialized Key-Value View
//!
//! This crate keeps an in-memory map of the latest value for every key of a
//! compacted, partitioned topic. It replays each partition's compacted history,
//! tails new messages, and follows the topic as partitions are added or removed.
//!
//! # Examples
//!
//! ## Reading
//!
//! ```ignore
//! use tableview_client::TableView;
//! use tableview_core::StringSchema;
//!
//! let view = TableView::builder(transport, Arc::new(StringSchema))
//!     .topic("user-profiles")
//!     .create()
//!     .await?;
//!
//! if let Some(profile) = view.get("user-42") {
//!     println!("{}", profile);
//! }
//! ```
//!
//! ## Listening
//!
//! ```ignore
//! // Called once per existing entry, then once per update
//! view.for_each_and_listen(|key, value| {
//!     println!("{} = {}", key, value);
//! });
//!
//! view.close().await?;
//! ```
//!
//! # Components
//!
//! - [`MaterializedMap`]: latest-value map plus update listeners
//! - [`PartitionReader`]: replay-then-tail reader for one partition
//! - [`ReaderSet`]: readers currently open, by partition
//! - reconciler: periodic partition discovery (internal)
//! - [`TableView`]: the public facade, built with [`TableViewBuilder`]

pub mod builder;
pub mod config;
pub mod error;
pub mod map;
pub mod reader;
pub mod reader_set;
mod reconciler;
pub mod table_view;

pub use builder::TableViewBuilder;
pub use config::TableViewConfig;
pub use error::{ClientError, Result};
pub use map::MaterializedMap;
pub use reader::{PartitionReader, ReaderState, ReaderStatus};
pub use reader_set::ReaderSet;
pub use table_view::TableView;

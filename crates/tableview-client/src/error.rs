//! Error types for table view operations.
//!
//! ## Error Handling Strategy
//!
//! - **Configuration errors**: `ConfigError` - rejected before anything is opened
//! - **Start errors**: `ReaderOpen`, `Read`, `Decode` - fail the reconciliation
//!   round they happen in; in the initial round they fail `create()`
//! - **Transport errors**: `Log` - partition discovery failed
//!
//! Read operations on a view (`get`, `len`, ...) never return errors. Errors
//! raised by listeners and by the live tail of a partition are logged and
//! counted, never propagated to callers.
//!
//! ## Examples
//!
//! ```ignore
//! use tableview_client::{ClientError, TableViewBuilder};
//!
//! match builder.topic("orders").create().await {
//!     Ok(view) => println!("{} keys", view.len()),
//!     Err(ClientError::ReaderOpen { partition, source }) => {
//!         eprintln!("Could not open {}: {}", partition, source);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

/// Convenience type alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error type for table view operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid table view configuration.
    ///
    /// ## Causes
    /// - Topic name missing or blank
    /// - Partition refresh interval below one second
    /// - Unknown or mistyped key passed to `load_conf`
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A partition reader could not be opened.
    ///
    /// Fatal to the reconciliation round; during `create()` the whole view
    /// fails and every reader opened so far is closed again.
    #[error("Failed to open reader for partition '{partition}': {source}")]
    ReaderOpen {
        partition: String,
        #[source]
        source: tableview_log::LogError,
    },

    /// Reading from a partition failed while replaying its history.
    #[error("Failed to read from partition '{partition}': {source}")]
    Read {
        partition: String,
        #[source]
        source: tableview_log::LogError,
    },

    /// A message payload could not be decoded by the view's schema.
    #[error("Failed to decode message at {partition}@{offset}: {source}")]
    Decode {
        partition: String,
        offset: u64,
        #[source]
        source: tableview_core::Error,
    },

    /// Log transport operation failed (partition discovery).
    #[error("Log error: {0}")]
    Log(#[from] tableview_log::LogError),
}

//! Error Types for the table view core
//!
//! ## Error Categories
//!
//! ### Schema Errors
//! - `InvalidLength`: Fixed-width payload has the wrong size
//!
//! ### Wrapped Errors
//! - `Json`: serde_json failure inside [`JsonSchema`](crate::JsonSchema)
//! - `Utf8`: payload is not valid UTF-8 for [`StringSchema`](crate::StringSchema)
//!
//! ## Usage
//! Everything in this crate returns `Result<T>`, aliased to `Result<T, Error>`,
//! so schema failures propagate with `?`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid payload length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;
